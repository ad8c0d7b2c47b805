//! LLM 客户端抽象
//!
//! 路由、翻译、闸门和对话专家都只依赖 LlmClient::complete（非流式）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{HistoryEntry, Role};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: ChatRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&HistoryEntry> for Message {
    fn from(entry: &HistoryEntry) -> Self {
        match entry.role {
            Role::User => Message::user(entry.text.clone()),
            Role::Assistant => Message::assistant(entry.text.clone()),
        }
    }
}

/// 把历史渲染成 "User: ... / Assistant: ..." 文本块，供单条 prompt 使用
pub fn render_history(history: &[HistoryEntry]) -> String {
    history
        .iter()
        .map(|entry| match entry.role {
            Role::User => format!("User: {}", entry.text),
            Role::Assistant => format!("Assistant: {}", entry.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
