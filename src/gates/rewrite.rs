//! 查询改写：在翻译之后、路由之前把用户问题改写成清晰简单的英文
//!
//! 改写失败或返回空文本时沿用改写前的文本。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::TriageError;
use crate::llm::{LlmClient, Message};

#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite(&self, text: &str) -> Result<String, TriageError>;
}

const REWRITE_PROMPT: &str = "Rewrite the user's query in clear, simple English while keeping its original meaning and intent. \
Do not answer it and do not add information. Output the rewritten query only.";

/// 基于 LLM 的改写
pub struct LlmQueryRewriter {
    llm: Arc<dyn LlmClient>,
}

impl LlmQueryRewriter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

/// 模型有时会把提示里的标签一并输出
fn strip_label(raw: &str) -> &str {
    let trimmed = raw.trim();
    for label in ["rewritten query:", "rewritten:"] {
        let matched = trimmed
            .get(..label.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(label));
        if matched {
            return trimmed[label.len()..].trim();
        }
    }
    trimmed
}

#[async_trait]
impl QueryRewriter for LlmQueryRewriter {
    async fn rewrite(&self, text: &str) -> Result<String, TriageError> {
        let messages = [
            Message::system(REWRITE_PROMPT),
            Message::user(format!("Original query: {text}")),
        ];
        let raw = self.llm.complete(&messages).await.map_err(TriageError::Llm)?;
        Ok(strip_label(&raw).to_string())
    }
}

/// 原样返回（离线运行或关闭改写时）
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRewriter;

#[async_trait]
impl QueryRewriter for PassthroughRewriter {
    async fn rewrite(&self, text: &str) -> Result<String, TriageError> {
        Ok(text.to_string())
    }
}
