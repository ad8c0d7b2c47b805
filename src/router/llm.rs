//! LLM 路由：让模型输出 {agent, reasoning, confidence} JSON

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{RouteRequest, Router};
use crate::core::{AgentId, Decision, TriageError};
use crate::llm::{render_history, LlmClient, Message};

const ROUTER_PROMPT: &str = r#"You are the triage step of a medical assistant. Pick the single agent that should answer the user's turn.

Agents:
- CONVERSATION_AGENT: greetings, small talk, non-medical questions, follow-ups about earlier results.
- RAG_AGENT: medical knowledge questions answerable from the curated medical literature.
- WEB_SEARCH_PROCESSOR_AGENT: recent medical developments, outbreaks, time-sensitive information.
- BRAIN_TUMOR_AGENT: analysis of brain MRI images.
- CHEST_XRAY_AGENT: analysis of chest X-ray images.
- SKIN_LESION_AGENT: analysis of skin lesion images.

Rules:
- Never choose an image agent when no image was uploaded.
- When an image is uploaded, prefer the image agent that matches the image type.

Answer with JSON only:
{"agent": "AGENT_NAME", "reasoning": "why", "confidence": 0.0-1.0}"#;

#[derive(Deserialize)]
struct RawDecision {
    agent: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    confidence: f32,
}

/// 从模型回复中取出 JSON（容忍前后说明文字与代码块）
pub fn parse_decision(raw: &str) -> Result<Decision, TriageError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &raw[s..=e],
        _ => return Err(TriageError::Router(format!("no JSON object in reply: {raw}"))),
    };

    let parsed: RawDecision =
        serde_json::from_str(json).map_err(|e| TriageError::Router(e.to_string()))?;
    let agent = parsed
        .agent
        .parse::<AgentId>()
        .map_err(TriageError::Router)?;

    Ok(Decision {
        agent,
        reasoning: parsed.reasoning,
        confidence: parsed.confidence.clamp(0.0, 1.0),
    })
}

/// 基于 LLM 的路由器
pub struct LlmRouter {
    llm: Arc<dyn LlmClient>,
}

impl LlmRouter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Router for LlmRouter {
    async fn decide(&self, request: &RouteRequest<'_>) -> Result<Decision, TriageError> {
        let image_type = match (request.has_image, request.image_type) {
            (true, Some(t)) => t.label(),
            (true, None) => "unknown",
            (false, _) => "None",
        };
        let prompt = format!(
            "User query: {}\n\nRecent conversation:\n{}\n\nHas image: {}\nImage type: {}",
            request.text,
            render_history(request.recent_history),
            request.has_image,
            image_type,
        );

        let messages = vec![Message::system(ROUTER_PROMPT), Message::user(prompt)];
        let reply = self
            .llm
            .complete(&messages)
            .await
            .map_err(TriageError::Llm)?;
        parse_decision(&reply)
    }
}
