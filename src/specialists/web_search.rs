//! Web 搜索专家：拉取搜索结果后由 LLM 归纳成回答
//!
//! 也作为检索专家的回退目标；无论本身结果好坏都不会再次改路由。

use std::sync::Arc;

use async_trait::async_trait;

use super::{Specialist, SpecialistInput, SpecialistOutput};
use crate::core::{AgentId, HistoryEntry, TriageError};
use crate::llm::{render_history, LlmClient, Message};

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// 搜索服务（Tavily、PubMed 等）
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, TriageError>;
}

#[async_trait]
impl<T: SearchProvider + ?Sized> SearchProvider for Arc<T> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, TriageError> {
        (**self).search(query, limit).await
    }
}

const WEB_PROMPT: &str = "Summarize the search results below into a concise, accurate answer to the user's medical question. \
Mention when information may be time-sensitive and cite result numbers like [1]. \
Recommend consulting a healthcare professional where appropriate.";

pub struct WebSearchSpecialist<P: SearchProvider> {
    provider: P,
    llm: Arc<dyn LlmClient>,
    context_limit: usize,
}

impl<P: SearchProvider> WebSearchSpecialist<P> {
    pub fn new(provider: P, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            provider,
            llm,
            context_limit: 20,
        }
    }

    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }
}

#[async_trait]
impl<P: SearchProvider> Specialist for WebSearchSpecialist<P> {
    fn id(&self) -> AgentId {
        AgentId::WebSearch
    }

    async fn run(
        &self,
        input: &SpecialistInput<'_>,
        history: &[HistoryEntry],
    ) -> Result<SpecialistOutput, TriageError> {
        let hits = self
            .provider
            .search(input.text, self.context_limit)
            .await
            .map_err(|e| TriageError::specialist(AgentId::WebSearch, e.to_string()))?;

        if hits.is_empty() {
            return Ok(SpecialistOutput::text(
                "I couldn't find relevant information online for this question. Please consult a healthcare professional.",
            ));
        }

        let results = hits
            .iter()
            .enumerate()
            .map(|(i, h)| format!("[{}] {} ({})\n{}", i + 1, h.title, h.url, h.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Search results:\n{results}\n\nConversation so far:\n{}\n\nQuestion: {}",
            render_history(history),
            input.text
        );

        let summary = self
            .llm
            .complete(&[Message::system(WEB_PROMPT), Message::user(prompt)])
            .await
            .map_err(|e| TriageError::specialist(AgentId::WebSearch, e))?;
        Ok(SpecialistOutput::text(summary.trim()))
    }
}

/// 固定结果的搜索服务（离线运行与测试用）
#[derive(Debug, Clone, Default)]
pub struct StaticSearchProvider {
    hits: Vec<SearchHit>,
}

impl StaticSearchProvider {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>, TriageError> {
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}
