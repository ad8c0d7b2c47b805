//! 人工复核闸门
//!
//! 高风险专家的输出先附上复核请求并挂起；下一轮以 yes/no 开头的输入被解释为复核回复。

use std::collections::HashMap;

use crate::config::ValidationSection;
use crate::core::{AgentId, PendingValidation, SessionState, TraceStep, ValidationReply};

pub const VALIDATION_REQUEST: &str = "**Human Validation Required:**\n- If you're a healthcare professional: please review the output above and reply **Yes** or **No**. If No, add your comments.\n- If you're a patient: simply reply Yes to confirm.";

pub const CAUTION_MESSAGE: &str = "The previous medical analysis requires further review. A healthcare professional has flagged potential inaccuracies.";

pub const CONFIRMATION_PREFIX: &str = "**Output confirmed by human validator:**";

/// 解析复核回复：只看第一个词，大小写与标点不敏感
pub fn parse_reply(text: &str) -> Option<ValidationReply> {
    let first = text
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    match first.as_str() {
        "yes" => Some(ValidationReply::Yes),
        "no" => Some(ValidationReply::No),
        _ => None,
    }
}

/// 各专家是否需要复核（外部配置）
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    required: HashMap<AgentId, bool>,
}

impl ValidationPolicy {
    pub fn from_config(section: &ValidationSection) -> Self {
        let mut required: HashMap<AgentId, bool> = AgentId::ALL
            .iter()
            .map(|a| (*a, a.is_image_specialist()))
            .collect();
        for (name, flag) in &section.require_validation {
            match name.parse::<AgentId>() {
                Ok(agent) => {
                    required.insert(agent, *flag);
                }
                Err(e) => tracing::warn!("Ignoring validation setting: {}", e),
            }
        }
        Self { required }
    }

    pub fn requires(&self, agent: AgentId) -> bool {
        self.required
            .get(&agent)
            .copied()
            .unwrap_or_else(|| agent.is_image_specialist())
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::from_config(&ValidationSection::default())
    }
}

/// 复核闸门的两个动作：发起请求、处理回复
pub struct ValidationGate;

impl ValidationGate {
    /// 挂起当前输出并在其后追加复核请求
    pub fn request(state: &mut SessionState) {
        let content = state.output.clone().unwrap_or_default();
        if let Some(agent) = state.last_agent() {
            state.pending_validation = Some(PendingValidation {
                agent,
                content: content.clone(),
            });
        }
        state.output = Some(format!("{content}\n\n{VALIDATION_REQUEST}"));
        state.agent_trace.push(TraceStep::HumanValidation);
    }

    /// 处理复核回复；原专家不会被再次调用
    pub fn resolve(state: &mut SessionState, reply: ValidationReply) {
        let pending = state.pending_validation.take();
        state.output = Some(match (reply, pending) {
            (ValidationReply::No, _) => CAUTION_MESSAGE.to_string(),
            (ValidationReply::Yes, Some(p)) => format!("{CONFIRMATION_PREFIX}\n\n{}", p.content),
            (ValidationReply::Yes, None) => CONFIRMATION_PREFIX.to_string(),
        });
        state.needs_validation = false;
        state.agent_trace.push(TraceStep::HumanValidation);
    }
}
