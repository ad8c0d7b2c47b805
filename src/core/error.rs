//! 引擎错误类型
//!
//! 只有 Persistence / GraphCycle / EmptyTurn 会越过 GraphExecutor 边界；
//! 专家、路由、翻译相关错误都在节点内部降级处理。

use thiserror::Error;

use crate::core::state::AgentId;

/// 编排过程中可能出现的错误
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("{agent} failed: {message}")]
    Specialist { agent: AgentId, message: String },

    #[error("Router error: {0}")]
    Router(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("LLM error: {0}")]
    Llm(String),

    /// 会话状态无法读写，整轮失败
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Turn has neither text nor image")]
    EmptyTurn,

    #[error("Graph revisited node {0}")]
    GraphCycle(String),
}

impl TriageError {
    pub fn specialist(agent: AgentId, message: impl Into<String>) -> Self {
        Self::Specialist {
            agent,
            message: message.into(),
        }
    }

    /// 是否必须中止整轮（其余错误由节点就地降级）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::GraphCycle(_) | Self::EmptyTurn | Self::Config(_)
        )
    }
}

impl From<rusqlite::Error> for TriageError {
    fn from(err: rusqlite::Error) -> Self {
        TriageError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for TriageError {
    fn from(err: serde_json::Error) -> Self {
        TriageError::Persistence(format!("state serialization: {err}"))
    }
}

impl From<config::ConfigError> for TriageError {
    fn from(err: config::ConfigError) -> Self {
        TriageError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialist_error_display_carries_agent() {
        let err = TriageError::specialist(AgentId::ChestXray, "model not loaded");
        assert_eq!(err.to_string(), "CHEST_XRAY_AGENT failed: model not loaded");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(TriageError::Persistence("disk full".into()).is_fatal());
        assert!(TriageError::GraphCycle("Fallback".into()).is_fatal());
        assert!(!TriageError::Translation("timeout".into()).is_fatal());
        assert!(!TriageError::Router("bad json".into()).is_fatal());
    }
}
