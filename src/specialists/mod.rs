//! 专家层：统一的 Specialist::run 接口与注册表
//!
//! 所有专家（对话、检索、Web 搜索、三类图像诊断）实现同一个 trait，
//! 由 SpecialistRegistry 按 AgentId 注册与查找；执行器只认这个接口。

pub mod conversation;
pub mod image;
pub mod retrieval;
pub mod web_search;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AgentId, HistoryEntry, ImageType, TriageError};

pub use conversation::ConversationSpecialist;
pub use image::{
    FilenameImageClassifier, ImageAnalyzer, ImageDiagnosisSpecialist, ImageFinding,
    UnavailableAnalyzer,
};
pub use retrieval::{InMemoryCorpus, Passage, RetrievalBackend, RetrievalSpecialist};
pub use web_search::{SearchHit, SearchProvider, StaticSearchProvider, WebSearchSpecialist};

/// 专家输入（工作语言文本 + 可选图像）
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecialistInput<'a> {
    pub text: &'a str,
    pub image_ref: Option<&'a str>,
    pub image_type: Option<ImageType>,
}

/// 专家输出
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecialistOutput {
    pub text: String,
    /// 只有检索专家给出
    pub confidence: Option<f32>,
    pub insufficient_info: bool,
    pub needs_validation: bool,
    pub result_image: Option<String>,
}

impl SpecialistOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// 专家 trait：id + 异步执行
#[async_trait]
pub trait Specialist: Send + Sync {
    fn id(&self) -> AgentId;

    async fn run(
        &self,
        input: &SpecialistInput<'_>,
        history: &[HistoryEntry],
    ) -> Result<SpecialistOutput, TriageError>;
}

/// 图像类型分类器（外部协作者）
#[async_trait]
pub trait ImageTypeClassifier: Send + Sync {
    async fn classify(&self, image_ref: &str) -> Result<ImageType, TriageError>;
}

/// 专家注册表
#[derive(Default, Clone)]
pub struct SpecialistRegistry {
    specialists: HashMap<AgentId, Arc<dyn Specialist>>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, specialist: impl Specialist + 'static) {
        self.register_arc(Arc::new(specialist));
    }

    pub fn register_arc(&mut self, specialist: Arc<dyn Specialist>) {
        let id = specialist.id();
        if self.specialists.insert(id, specialist).is_some() {
            tracing::warn!("Specialist {} registered twice, keeping the latest", id);
        }
    }

    pub fn get(&self, id: AgentId) -> Option<Arc<dyn Specialist>> {
        self.specialists.get(&id).cloned()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.specialists.contains_key(&id)
    }

    /// 已注册的专家（按 AgentId::ALL 顺序）
    pub fn ids(&self) -> Vec<AgentId> {
        AgentId::ALL
            .iter()
            .copied()
            .filter(|id| self.specialists.contains_key(id))
            .collect()
    }
}
