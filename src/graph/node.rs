//! 编排图的节点与转移函数
//!
//! 转移只读 SessionState，不做任何外部调用；外部调用都发生在节点动作里。

use std::fmt;

use crate::core::{AgentId, SessionState};
use crate::gates::ConfidenceGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    AnalyzeInput,
    CheckBypass,
    RouteToAgent,
    Specialist(AgentId),
    ConfidenceCheck,
    /// 检索不达标时的单次 Web 搜索
    Fallback,
    ValidationCheck,
    HumanValidation,
    /// 上一轮挂起的人工复核在本轮得到回复
    ValidationReply,
    SafetyOutput,
    Outbound,
    Terminal,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Specialist(agent) => write!(f, "Specialist({agent})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// 下一个节点
pub fn transition(node: Node, state: &SessionState, gate: &ConfidenceGate) -> Node {
    match node {
        Node::AnalyzeInput => Node::CheckBypass,
        Node::CheckBypass => {
            if state.bypass_routing {
                Node::SafetyOutput
            } else if state.validation_reply.is_some() {
                Node::ValidationReply
            } else {
                Node::RouteToAgent
            }
        }
        Node::RouteToAgent => Node::Specialist(state.routed_agent.unwrap_or(AgentId::Rag)),
        Node::Specialist(AgentId::Rag) => Node::ConfidenceCheck,
        Node::Specialist(_) => Node::ValidationCheck,
        Node::ConfidenceCheck => {
            if gate.should_fallback(state) {
                Node::Fallback
            } else {
                Node::ValidationCheck
            }
        }
        Node::Fallback => Node::ValidationCheck,
        Node::ValidationCheck => {
            if state.needs_validation {
                Node::HumanValidation
            } else {
                Node::SafetyOutput
            }
        }
        Node::HumanValidation | Node::ValidationReply => Node::SafetyOutput,
        Node::SafetyOutput => Node::Outbound,
        Node::Outbound | Node::Terminal => Node::Terminal,
    }
}
