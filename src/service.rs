//! 对外服务：提交一轮对话 / 提交人工复核结果
//!
//! 每次调用在线程锁内完成 load → execute → save；持久化失败会让整次调用失败。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{SessionState, TraceStep, TriageError, TurnInput, ValidationReply};
use crate::graph::GraphExecutor;
use crate::session::{SessionStore, ThreadLocks};

/// 提交一轮
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    pub text: Option<String>,
    pub image_ref: Option<String>,
    pub thread_id: Option<String>,
}

impl TurnRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}

/// 复核结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationDecision {
    Yes,
    No,
}

/// 提交人工复核
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub decision: ValidationDecision,
    #[serde(default)]
    pub comments: Option<String>,
    pub thread_id: String,
}

impl ValidationRequest {
    /// 转成一轮普通输入："yes" / "no"，可附带 " Comments: ..."
    pub fn to_turn_text(&self) -> String {
        let word = match self.decision {
            ValidationDecision::Yes => "yes",
            ValidationDecision::No => "no",
        };
        match self.comments.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => format!("{word} Comments: {c}"),
            _ => word.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Success,
    AwaitingValidation,
    Validated,
    Rejected,
    Blocked,
    /// 复核回复到达时没有待复核的输出
    NoPendingValidation,
}

pub const NOTHING_TO_VALIDATE: &str =
    "There is no analysis awaiting validation in this conversation.";

/// 一轮的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub status: TurnStatus,
    pub response_text: String,
    pub agent_trace: Vec<String>,
    pub result_image_ref: Option<String>,
    pub thread_id: String,
}

fn status_of(state: &SessionState) -> TurnStatus {
    if state.bypass_routing {
        return TurnStatus::Blocked;
    }
    match state.validation_reply {
        Some(ValidationReply::Yes) => return TurnStatus::Validated,
        Some(ValidationReply::No) => return TurnStatus::Rejected,
        None => {}
    }
    if state.agent_trace.last() == Some(&TraceStep::HumanValidation) && state.pending_validation.is_some() {
        TurnStatus::AwaitingValidation
    } else {
        TurnStatus::Success
    }
}

pub struct TriageService {
    executor: GraphExecutor,
    store: Arc<dyn SessionStore>,
    locks: ThreadLocks,
}

impl TriageService {
    pub fn new(executor: GraphExecutor, store: Arc<dyn SessionStore>) -> Self {
        Self {
            executor,
            store,
            locks: ThreadLocks::new(),
        }
    }

    pub async fn submit_turn(&self, request: TurnRequest) -> Result<TurnResponse, TriageError> {
        let input = TurnInput {
            text: request.text,
            image_ref: request.image_ref,
        };
        if input.is_empty() {
            return Err(TriageError::EmptyTurn);
        }
        let thread_id = request
            .thread_id
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let _guard = self.locks.acquire(&thread_id).await;
        let state = self.store.load(&thread_id).await?;
        self.run_turn(thread_id, state, input).await
    }

    /// 复核回复；会话里没有待复核的输出时不进入执行图
    pub async fn submit_validation(
        &self,
        request: ValidationRequest,
    ) -> Result<TurnResponse, TriageError> {
        let text = request.to_turn_text();
        let thread_id = request.thread_id;

        let _guard = self.locks.acquire(&thread_id).await;
        let state = self.store.load(&thread_id).await?;
        if state.pending_validation.is_none() {
            tracing::info!("Thread {} has nothing awaiting validation", thread_id);
            return Ok(TurnResponse {
                status: TurnStatus::NoPendingValidation,
                response_text: NOTHING_TO_VALIDATE.to_string(),
                agent_trace: Vec::new(),
                result_image_ref: None,
                thread_id,
            });
        }
        self.run_turn(thread_id, state, TurnInput::text(text)).await
    }

    /// 调用方必须已持有该线程的锁
    async fn run_turn(
        &self,
        thread_id: String,
        state: SessionState,
        input: TurnInput,
    ) -> Result<TurnResponse, TriageError> {
        let state = self.executor.execute(state, input).await?;

        let response = TurnResponse {
            status: status_of(&state),
            response_text: state.output.clone().unwrap_or_default(),
            agent_trace: state.trace_labels(),
            result_image_ref: state.result_image.clone(),
            thread_id: thread_id.clone(),
        };
        self.store.save(&thread_id, state).await?;

        tracing::info!(
            "Thread {} turn finished: {:?} via {:?}",
            thread_id,
            response.status,
            response.agent_trace
        );
        Ok(response)
    }

    /// 读取会话快照（只读）
    pub async fn session(&self, thread_id: &str) -> Result<SessionState, TriageError> {
        let _guard = self.locks.acquire(thread_id).await;
        self.store.load(thread_id).await
    }
}
