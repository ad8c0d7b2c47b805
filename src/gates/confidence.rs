//! 置信度闸门：检索专家置信度不足或自报信息不足时，回退到 Web 搜索一次
//!
//! 跳数由 hop 计数显式限制，与图的连线方式无关。

use crate::core::{AgentId, SessionState};

/// 收敛到 [0,1]；NaN 与无穷视为 0
pub fn normalize_confidence(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// 回退决策
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceGate {
    min_confidence: f32,
    max_hops: u8,
}

impl ConfidenceGate {
    pub fn new(min_confidence: f32) -> Self {
        Self {
            min_confidence,
            max_hops: 1,
        }
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// 检索结果是否不达标（未运行检索专家时为 false）
    pub fn retrieval_inadequate(&self, state: &SessionState) -> bool {
        if !state.has_agent(AgentId::Rag) {
            return false;
        }
        let confidence = normalize_confidence(state.retrieval_confidence.unwrap_or(0.0));
        confidence < self.min_confidence || state.insufficient_info
    }

    /// 需要且还允许回退
    pub fn should_fallback(&self, state: &SessionState) -> bool {
        self.retrieval_inadequate(state) && state.fallback_hops < self.max_hops
    }

    pub fn fallback_agent(&self) -> AgentId {
        AgentId::WebSearch
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::new(0.40)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TraceStep;

    fn after_rag(confidence: f32, insufficient: bool) -> SessionState {
        let mut state = SessionState::new();
        state.agent_trace.push(TraceStep::Agent(AgentId::Rag));
        state.retrieval_confidence = Some(confidence);
        state.insufficient_info = insufficient;
        state
    }

    #[test]
    fn test_low_confidence_triggers_fallback() {
        let gate = ConfidenceGate::new(0.40);
        assert!(gate.should_fallback(&after_rag(0.30, false)));
        assert!(!gate.should_fallback(&after_rag(0.40, false)));
        assert!(!gate.should_fallback(&after_rag(0.92, false)));
    }

    #[test]
    fn test_insufficient_info_triggers_fallback_despite_confidence() {
        let gate = ConfidenceGate::new(0.40);
        assert!(gate.should_fallback(&after_rag(0.95, true)));
    }

    #[test]
    fn test_hop_budget_is_single() {
        let gate = ConfidenceGate::new(0.40);
        let mut state = after_rag(0.10, true);
        state.fallback_hops = 1;
        assert!(gate.retrieval_inadequate(&state));
        assert!(!gate.should_fallback(&state));
    }

    #[test]
    fn test_non_finite_confidence_is_inadequate() {
        let gate = ConfidenceGate::new(0.40);
        assert!(gate.should_fallback(&after_rag(f32::NAN, false)));
        assert!(gate.should_fallback(&after_rag(f32::NEG_INFINITY, false)));
        assert!(gate.should_fallback(&after_rag(f32::INFINITY, false)));
    }

    #[test]
    fn test_normalize_confidence() {
        assert_eq!(normalize_confidence(f32::NAN), 0.0);
        assert_eq!(normalize_confidence(f32::INFINITY), 0.0);
        assert_eq!(normalize_confidence(1.7), 1.0);
        assert_eq!(normalize_confidence(-0.2), 0.0);
        assert_eq!(normalize_confidence(0.55), 0.55);
    }

    #[test]
    fn test_no_fallback_without_retrieval() {
        let gate = ConfidenceGate::new(0.40);
        let mut state = SessionState::new();
        state.agent_trace.push(TraceStep::Agent(AgentId::Conversation));
        assert!(!gate.should_fallback(&state));
    }
}
