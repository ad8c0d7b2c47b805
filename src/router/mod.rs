//! 路由层：决定本轮由哪个专家处理
//!
//! Router 给出 Decision；执行器再用 resolve_route 施加图像约束与置信度阈值。
//! 置信度不足时固定替换为检索专家，这不是错误。

pub mod llm;
pub mod rules;

use async_trait::async_trait;

use crate::core::{AgentId, Decision, HistoryEntry, ImageType, TriageError};

pub use llm::{parse_decision, LlmRouter};
pub use rules::RuleRouter;

/// 路由输入
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub text: &'a str,
    pub has_image: bool,
    pub image_type: Option<ImageType>,
    pub recent_history: &'a [HistoryEntry],
}

/// 路由器（外部协作者）
#[async_trait]
pub trait Router: Send + Sync {
    async fn decide(&self, request: &RouteRequest<'_>) -> Result<Decision, TriageError>;
}

/// 选中专家的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReason {
    /// 只有图像没有文本，直接按图像类型选择
    ImageOnly,
    Accepted,
    LowConfidence,
    /// 没有图像却选了图像专家
    ImageGuard,
    RouterFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub agent: AgentId,
    pub reason: RouteReason,
}

/// 默认安全选择
pub const DEFAULT_SAFE_AGENT: AgentId = AgentId::Rag;

/// 只有图像时的直达路由；图像类型无对应专家时返回 None
pub fn image_shortcut(text: &str, has_image: bool, image_type: Option<ImageType>) -> Option<Route> {
    if !has_image || !text.trim().is_empty() {
        return None;
    }
    image_type
        .and_then(|t| t.specialist())
        .map(|agent| Route {
            agent,
            reason: RouteReason::ImageOnly,
        })
}

/// 对 Router 的决策施加约束
pub fn resolve_route(decision: &Decision, has_image: bool, threshold: f32) -> Route {
    if !has_image && decision.agent.is_image_specialist() {
        return Route {
            agent: DEFAULT_SAFE_AGENT,
            reason: RouteReason::ImageGuard,
        };
    }
    if !decision.confidence.is_finite() || decision.confidence < threshold {
        return Route {
            agent: DEFAULT_SAFE_AGENT,
            reason: RouteReason::LowConfidence,
        };
    }
    Route {
        agent: decision.agent,
        reason: RouteReason::Accepted,
    }
}
