//! 检索专家（RAG）
//!
//! 后端返回带分数的片段；置信度取最高分。模型回答里出现“信息不足”类短语时
//! 置 insufficient_info，交给置信度闸门决定是否回退到 Web 搜索。

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{Specialist, SpecialistInput, SpecialistOutput};
use crate::core::{AgentId, HistoryEntry, TriageError};
use crate::llm::{render_history, LlmClient, Message};

/// 检索到的片段
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub text: String,
    pub source: String,
    /// 0.0 ~ 1.0
    pub score: f32,
}

/// 检索后端（向量库、全文索引等）
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Passage>, TriageError>;
}

#[async_trait]
impl<T: RetrievalBackend + ?Sized> RetrievalBackend for Arc<T> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Passage>, TriageError> {
        (**self).search(query, limit).await
    }
}

const INSUFFICIENT_PHRASES: [&str; 5] = [
    "don't have enough information",
    "not enough information",
    "insufficient information",
    "cannot answer",
    "unable to answer",
];

/// 回答是否自认信息不足
pub fn reports_insufficient_info(answer: &str) -> bool {
    let lower = answer.to_lowercase().replace('’', "'");
    INSUFFICIENT_PHRASES.iter().any(|p| lower.contains(p))
}

const RAG_PROMPT: &str = "You answer medical questions using only the provided context. \
If the context does not contain the answer, reply exactly: \"I don't have enough information to answer this question based on the provided context.\" \
Do not invent facts or citations.";

pub struct RetrievalSpecialist<B: RetrievalBackend> {
    backend: B,
    llm: Arc<dyn LlmClient>,
    context_limit: usize,
    include_sources: bool,
}

impl<B: RetrievalBackend> RetrievalSpecialist<B> {
    pub fn new(backend: B, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            backend,
            llm,
            context_limit: 20,
            include_sources: true,
        }
    }

    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    pub fn with_sources(mut self, include: bool) -> Self {
        self.include_sources = include;
        self
    }

    fn failed(e: impl ToString) -> TriageError {
        TriageError::specialist(AgentId::Rag, e.to_string())
    }
}

#[async_trait]
impl<B: RetrievalBackend> Specialist for RetrievalSpecialist<B> {
    fn id(&self) -> AgentId {
        AgentId::Rag
    }

    async fn run(
        &self,
        input: &SpecialistInput<'_>,
        history: &[HistoryEntry],
    ) -> Result<SpecialistOutput, TriageError> {
        let passages = self
            .backend
            .search(input.text, self.context_limit)
            .await
            .map_err(Self::failed)?;

        if passages.is_empty() {
            tracing::info!("Retrieval returned no passages");
            return Ok(SpecialistOutput {
                text: "I don't have enough information to answer this question based on the provided context.".into(),
                confidence: Some(0.0),
                insufficient_info: true,
                ..Default::default()
            });
        }

        let confidence = passages
            .iter()
            .map(|p| p.score)
            .fold(0.0_f32, f32::max)
            .clamp(0.0, 1.0);

        let context = passages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{}] {}", i + 1, p.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Context:\n{context}\n\nConversation so far:\n{}\n\nQuestion: {}",
            render_history(history),
            input.text
        );
        let answer = self
            .llm
            .complete(&[Message::system(RAG_PROMPT), Message::user(prompt)])
            .await
            .map_err(Self::failed)?;
        let answer = answer.trim().to_string();
        let insufficient_info = reports_insufficient_info(&answer);

        let mut text = answer;
        if self.include_sources && !insufficient_info {
            let mut seen = HashSet::new();
            let sources: Vec<&str> = passages
                .iter()
                .map(|p| p.source.as_str())
                .filter(|s| !s.is_empty() && seen.insert(*s))
                .collect();
            if !sources.is_empty() {
                text.push_str("\n\nSources:");
                for s in sources {
                    text.push_str(&format!("\n- {s}"));
                }
            }
        }

        tracing::debug!(
            "Retrieval confidence {:.2}, insufficient_info={}",
            confidence,
            insufficient_info
        );
        Ok(SpecialistOutput {
            text,
            confidence: Some(confidence),
            insufficient_info,
            ..Default::default()
        })
    }
}

/// 内存语料：按查询词覆盖率打分（离线运行与测试用）
#[derive(Clone, Default)]
pub struct InMemoryCorpus {
    docs: Arc<RwLock<Vec<(Passage, HashSet<String>)>>>,
}

fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 2)
        .collect()
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, source: impl Into<String>, text: impl Into<String>) {
        let text = text.into();
        let tokens = tokenize_lower(&text);
        if let Ok(mut docs) = self.docs.write() {
            docs.push((
                Passage {
                    text,
                    source: source.into(),
                    score: 0.0,
                },
                tokens,
            ));
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RetrievalBackend for InMemoryCorpus {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Passage>, TriageError> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self
            .docs
            .read()
            .map_err(|_| TriageError::specialist(AgentId::Rag, "corpus lock poisoned"))?;

        let mut scored: Vec<Passage> = docs
            .iter()
            .filter_map(|(passage, tokens)| {
                let hits = query_tokens.intersection(tokens).count();
                (hits > 0).then(|| Passage {
                    score: hits as f32 / query_tokens.len() as f32,
                    ..passage.clone()
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }
}
