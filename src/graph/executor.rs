//! 单轮执行器
//!
//! 从 AnalyzeInput 出发按 transition 走完一条路径直到 Terminal，每个节点至多执行一次。
//! 专家、路由、翻译的失败都在节点内降级，只有 EmptyTurn / GraphCycle 会返回错误。

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::{
    AgentId, HistoryEntry, ImageType, SessionState, TraceStep, TriageError, TurnInput,
};
use crate::gates::{normalize_confidence, parse_reply, ValidationGate};
use crate::graph::context::EngineContext;
use crate::graph::node::{transition, Node};
use crate::router::{
    image_shortcut, resolve_route, Route, RouteReason, RouteRequest, DEFAULT_SAFE_AGENT,
};
use crate::specialists::SpecialistInput;

const DEFAULT_BLOCKED_MESSAGE: &str = "I can't help with that request.";

/// 专家失败时的替代回答（带专家标识）
pub fn degraded_message(agent: AgentId) -> String {
    format!(
        "[{agent}] Sorry, I couldn't complete this request right now. Please try again later or consult a healthcare professional."
    )
}

pub struct GraphExecutor {
    ctx: Arc<EngineContext>,
}

impl GraphExecutor {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// 执行一轮并返回更新后的状态（历史已追加本轮的两条记录）
    pub async fn execute(
        &self,
        mut state: SessionState,
        input: TurnInput,
    ) -> Result<SessionState, TriageError> {
        if input.is_empty() {
            return Err(TriageError::EmptyTurn);
        }
        state.begin_turn(input);

        let mut visited = HashSet::new();
        let mut node = Node::AnalyzeInput;
        loop {
            if !visited.insert(node) {
                return Err(TriageError::GraphCycle(node.to_string()));
            }
            tracing::debug!("Entering node {}", node);
            self.run_node(node, &mut state).await;
            if node == Node::Terminal {
                break;
            }
            node = transition(node, &state, &self.ctx.confidence);
        }

        state.commit_turn();
        Ok(state)
    }

    async fn run_node(&self, node: Node, state: &mut SessionState) {
        match node {
            Node::AnalyzeInput => self.analyze_input(state).await,
            Node::RouteToAgent => self.route(state).await,
            Node::Specialist(agent) => self.run_specialist(agent, state).await,
            Node::Fallback => {
                state.fallback_hops += 1;
                let agent = self.ctx.confidence.fallback_agent();
                tracing::info!(
                    "Retrieval inadequate (confidence {:.2}, insufficient_info={}), falling back to {}",
                    state.retrieval_confidence.unwrap_or(0.0),
                    state.insufficient_info,
                    agent
                );
                self.run_specialist(agent, state).await;
            }
            Node::HumanValidation => {
                tracing::info!(
                    "Output of {:?} awaits human validation",
                    state.last_agent()
                );
                ValidationGate::request(state);
            }
            Node::ValidationReply => {
                if let Some(reply) = state.validation_reply {
                    tracing::info!("Human validation reply: {:?}", reply);
                    ValidationGate::resolve(state, reply);
                }
            }
            Node::SafetyOutput => self.check_output(state).await,
            Node::Outbound => self.outbound(state).await,
            Node::CheckBypass | Node::ConfidenceCheck | Node::ValidationCheck | Node::Terminal => {}
        }
    }

    async fn analyze_input(&self, state: &mut SessionState) {
        let original = state.original_text().to_string();
        let (lang, working) = self.ctx.language.ingress(&original).await;
        state.language = lang;
        state.working_text = working;

        if !state.working_text.is_empty() {
            let verdict = self.ctx.safety.check_input(&state.working_text).await;
            if !verdict.allowed {
                tracing::info!("Input blocked by guardrails");
                state.bypass_routing = true;
                state.agent_trace = vec![TraceStep::InputGuardrails];
                state.output = Some(
                    verdict
                        .message
                        .unwrap_or_else(|| DEFAULT_BLOCKED_MESSAGE.to_string()),
                );
                return;
            }
        }

        if state.pending_validation.is_some() {
            let reply = parse_reply(&state.working_text).or_else(|| parse_reply(&original));
            match reply {
                Some(reply) => {
                    state.validation_reply = Some(reply);
                    return;
                }
                None => {
                    tracing::info!("Turn is not a validation reply, discarding pending validation");
                    state.pending_validation = None;
                }
            }
        }

        let rewritten = self.ctx.language.rewrite(&state.working_text).await;
        if rewritten != state.working_text {
            tracing::debug!("Query rewritten: {}", rewritten);
            state.working_text = rewritten;
        }

        if let Some(image_ref) = state.image_ref().map(str::to_string) {
            let image_type = match self.ctx.classifier.classify(&image_ref).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("Image classification failed for {}: {}", image_ref, e);
                    ImageType::Other
                }
            };
            tracing::debug!("Image {} classified as {:?}", image_ref, image_type);
            state.image_type = Some(image_type);
        }
    }

    async fn route(&self, state: &mut SessionState) {
        let text = state.working_text.clone();
        let route = match image_shortcut(&text, state.has_image, state.image_type) {
            Some(route) => route,
            None => {
                let history = state.recent_history(self.ctx.settings.history_window);
                let request = RouteRequest {
                    text: &text,
                    has_image: state.has_image,
                    image_type: state.image_type,
                    recent_history: &history,
                };
                match self.ctx.router.decide(&request).await {
                    Ok(decision) => {
                        tracing::debug!(
                            "Router chose {} ({:.2}): {}",
                            decision.agent,
                            decision.confidence,
                            decision.reasoning
                        );
                        resolve_route(
                            &decision,
                            state.has_image,
                            self.ctx.settings.confidence_threshold,
                        )
                    }
                    Err(e) => {
                        tracing::warn!("Router failed, using {}: {}", DEFAULT_SAFE_AGENT, e);
                        Route {
                            agent: DEFAULT_SAFE_AGENT,
                            reason: RouteReason::RouterFailed,
                        }
                    }
                }
            }
        };

        tracing::info!("Selected agent {} ({:?})", route.agent, route.reason);
        state.routed_agent = Some(route.agent);
    }

    async fn run_specialist(&self, agent: AgentId, state: &mut SessionState) {
        let history: Vec<HistoryEntry> = state.history.iter().cloned().collect();
        let text = state.working_text.clone();
        let image_ref = state.image_ref().map(str::to_string);
        let input = SpecialistInput {
            text: &text,
            image_ref: image_ref.as_deref(),
            image_type: state.image_type,
        };

        let result = match self.ctx.specialists.get(agent) {
            Some(specialist) => specialist.run(&input, &history).await,
            None => Err(TriageError::specialist(agent, "not registered")),
        };
        state.agent_trace.push(TraceStep::Agent(agent));

        match result {
            Ok(out) => {
                if agent == AgentId::Rag {
                    state.retrieval_confidence =
                        Some(normalize_confidence(out.confidence.unwrap_or(0.0)));
                    state.insufficient_info = out.insufficient_info;
                }
                // 图像专家自行决定（缺图或无法判读时不复核），其余专家按配置
                state.needs_validation = out.needs_validation
                    || (!agent.is_image_specialist() && self.ctx.validation.requires(agent));
                state.result_image = out.result_image;
                state.output = Some(out.text);
            }
            Err(e) => {
                tracing::warn!("Specialist degraded: {}", e);
                if agent == AgentId::Rag {
                    state.retrieval_confidence = Some(0.0);
                    state.insufficient_info = true;
                }
                state.needs_validation = false;
                state.result_image = None;
                state.output = Some(degraded_message(agent));
            }
        }
    }

    async fn check_output(&self, state: &mut SessionState) {
        if state.bypass_routing {
            return;
        }
        let candidate = state.output.clone().unwrap_or_default();
        let original = state.working_text.clone();
        let sanitized = self.ctx.safety.check_output(&candidate, &original).await;
        if sanitized != candidate {
            tracing::info!("Output modified by guardrails");
        }
        state.output = Some(sanitized);
    }

    async fn outbound(&self, state: &mut SessionState) {
        let text = state.output.clone().unwrap_or_default();
        let translated = self.ctx.language.egress(&text, &state.language).await;
        state.canonical_output = Some(text);
        state.output = Some(translated);
    }
}
