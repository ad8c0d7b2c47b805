//! 引擎上下文：启动时构造一次，执行器与各闸门共享

use std::sync::Arc;

use crate::config::AppConfig;
use crate::gates::{ConfidenceGate, LanguageBoundary, SafetyGate, ValidationPolicy};
use crate::router::Router;
use crate::specialists::{ImageTypeClassifier, SpecialistRegistry};

/// 执行器用到的数值参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// 路由置信度低于该值时改用检索专家
    pub confidence_threshold: f32,
    /// 传给 Router 的历史条数
    pub history_window: usize,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            confidence_threshold: config.routing.confidence_threshold,
            history_window: config.routing.history_window,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 所有协作者的集合
pub struct EngineContext {
    pub settings: EngineSettings,
    pub language: LanguageBoundary,
    pub safety: Arc<dyn SafetyGate>,
    pub router: Arc<dyn Router>,
    pub classifier: Arc<dyn ImageTypeClassifier>,
    pub specialists: SpecialistRegistry,
    pub confidence: ConfidenceGate,
    pub validation: ValidationPolicy,
}
