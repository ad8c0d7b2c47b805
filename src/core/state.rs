//! 会话状态与单轮数据模型
//!
//! SessionState 由 SessionStore 持有，只在一轮执行期间被 GraphExecutor 修改；
//! 带 `#[serde(skip)]` 的字段只在单轮内有效，不会落盘。

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 专家标识（固定枚举集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentId {
    #[serde(rename = "CONVERSATION_AGENT")]
    Conversation,
    #[serde(rename = "RAG_AGENT")]
    Rag,
    #[serde(rename = "WEB_SEARCH_PROCESSOR_AGENT")]
    WebSearch,
    #[serde(rename = "BRAIN_TUMOR_AGENT")]
    BrainTumor,
    #[serde(rename = "CHEST_XRAY_AGENT")]
    ChestXray,
    #[serde(rename = "SKIN_LESION_AGENT")]
    SkinLesion,
}

impl AgentId {
    pub const ALL: [AgentId; 6] = [
        AgentId::Conversation,
        AgentId::Rag,
        AgentId::WebSearch,
        AgentId::BrainTumor,
        AgentId::ChestXray,
        AgentId::SkinLesion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Conversation => "CONVERSATION_AGENT",
            AgentId::Rag => "RAG_AGENT",
            AgentId::WebSearch => "WEB_SEARCH_PROCESSOR_AGENT",
            AgentId::BrainTumor => "BRAIN_TUMOR_AGENT",
            AgentId::ChestXray => "CHEST_XRAY_AGENT",
            AgentId::SkinLesion => "SKIN_LESION_AGENT",
        }
    }

    /// 图像诊断类专家
    pub fn is_image_specialist(&self) -> bool {
        matches!(
            self,
            AgentId::BrainTumor | AgentId::ChestXray | AgentId::SkinLesion
        )
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "CONVERSATION_AGENT" | "CONVERSATION" => Ok(AgentId::Conversation),
            "RAG_AGENT" | "RAG" => Ok(AgentId::Rag),
            "WEB_SEARCH_PROCESSOR_AGENT" | "WEB_SEARCH_AGENT" | "WEB_SEARCH" => {
                Ok(AgentId::WebSearch)
            }
            "BRAIN_TUMOR_AGENT" => Ok(AgentId::BrainTumor),
            "CHEST_XRAY_AGENT" | "CHEST_X_RAY_AGENT" => Ok(AgentId::ChestXray),
            "SKIN_LESION_AGENT" => Ok(AgentId::SkinLesion),
            other => Err(format!("unknown agent '{other}'")),
        }
    }
}

/// 上传图像的类型（由外部分类器给出）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageType {
    BrainMri,
    ChestXray,
    SkinLesion,
    Other,
}

impl ImageType {
    /// 与图像类型一一对应的专家；Other 没有对应专家
    pub fn specialist(&self) -> Option<AgentId> {
        match self {
            ImageType::BrainMri => Some(AgentId::BrainTumor),
            ImageType::ChestXray => Some(AgentId::ChestXray),
            ImageType::SkinLesion => Some(AgentId::SkinLesion),
            ImageType::Other => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageType::BrainMri => "brain MRI",
            ImageType::ChestXray => "chest X-ray",
            ImageType::SkinLesion => "skin lesion",
            ImageType::Other => "unrecognized image",
        }
    }
}

/// agentTrace 中的一步：专家或标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceStep {
    Agent(AgentId),
    InputGuardrails,
    HumanValidation,
}

impl fmt::Display for TraceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceStep::Agent(agent) => f.write_str(agent.as_str()),
            TraceStep::InputGuardrails => f.write_str("INPUT_GUARDRAILS"),
            TraceStep::HumanValidation => f.write_str("HUMAN_VALIDATION"),
        }
    }
}

/// 历史消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 单条历史记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// 本轮输入：文本和/或图像引用
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnInput {
    pub text: Option<String>,
    pub image_ref: Option<String>,
}

impl TurnInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image_ref: None,
        }
    }

    pub fn image(image_ref: impl Into<String>, text: Option<String>) -> Self {
        Self {
            text,
            image_ref: Some(image_ref.into()),
        }
    }

    /// 去空白后的文本，空串视为无文本
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.trimmed_text().is_none() && self.image_ref.is_none()
    }
}

/// Router 的决策（即用即弃）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub agent: AgentId,
    pub reasoning: String,
    pub confidence: f32,
}

/// 等待人工确认的专家输出
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingValidation {
    pub agent: AgentId,
    pub content: String,
}

/// 对验证请求的回复
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationReply {
    Yes,
    No,
}

/// 每个会话线程一份的状态
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub history: VecDeque<HistoryEntry>,
    pub current_input: Option<TurnInput>,
    pub has_image: bool,
    pub image_type: Option<ImageType>,
    pub agent_trace: Vec<TraceStep>,
    pub needs_validation: bool,
    pub retrieval_confidence: Option<f32>,
    pub bypass_routing: bool,
    pub insufficient_info: bool,
    pub language: String,
    pub output: Option<String>,
    /// 上一轮留下的待确认输出，跨轮保留
    pub pending_validation: Option<PendingValidation>,
    pub result_image: Option<String>,

    /// 规范语言下的本轮文本
    #[serde(skip)]
    pub working_text: String,
    #[serde(skip)]
    pub routed_agent: Option<AgentId>,
    #[serde(skip)]
    pub validation_reply: Option<ValidationReply>,
    #[serde(skip)]
    pub fallback_hops: u8,
    /// 出站翻译前的输出，写入历史用
    #[serde(skip)]
    pub canonical_output: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始新一轮：清空所有单轮字段，保留历史与待确认输出
    pub fn begin_turn(&mut self, input: TurnInput) {
        self.has_image = input.image_ref.is_some();
        self.working_text = input.trimmed_text().unwrap_or_default().to_string();
        self.current_input = Some(input);
        self.image_type = None;
        self.agent_trace.clear();
        self.needs_validation = false;
        self.retrieval_confidence = None;
        self.bypass_routing = false;
        self.insufficient_info = false;
        self.output = None;
        self.result_image = None;
        self.routed_agent = None;
        self.validation_reply = None;
        self.fallback_hops = 0;
        self.canonical_output = None;
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.current_input
            .as_ref()
            .and_then(|i| i.image_ref.as_deref())
    }

    /// 用户原始输入文本（未翻译）
    pub fn original_text(&self) -> &str {
        self.current_input
            .as_ref()
            .and_then(|i| i.trimmed_text())
            .unwrap_or_default()
    }

    pub fn has_agent(&self, agent: AgentId) -> bool {
        self.agent_trace.contains(&TraceStep::Agent(agent))
    }

    /// 最近执行的专家
    pub fn last_agent(&self) -> Option<AgentId> {
        self.agent_trace.iter().rev().find_map(|step| match step {
            TraceStep::Agent(agent) => Some(*agent),
            _ => None,
        })
    }

    pub fn trace_labels(&self) -> Vec<String> {
        self.agent_trace.iter().map(ToString::to_string).collect()
    }

    /// 最近 k 条历史（按插入顺序）
    pub fn recent_history(&self, k: usize) -> Vec<HistoryEntry> {
        let skip = self.history.len().saturating_sub(k);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// 本轮收尾：写入 user/assistant 两条历史，并使 current_input 失效
    pub fn commit_turn(&mut self) {
        let user_text = match (self.working_text.is_empty(), self.has_image) {
            (false, true) => format!("{} [image uploaded for diagnosis]", self.working_text),
            (false, false) => self.working_text.clone(),
            (true, _) => "[image uploaded for diagnosis]".to_string(),
        };
        self.history.push_back(HistoryEntry::user(user_text));

        let reply = self
            .canonical_output
            .clone()
            .or_else(|| self.output.clone())
            .unwrap_or_default();
        self.history.push_back(HistoryEntry::assistant(reply));
        self.current_input = None;
    }

    /// 只保留最近 max 条，丢弃最旧的
    pub fn truncate_history(&mut self, max: usize) {
        while self.history.len() > max {
            self.history.pop_front();
        }
    }
}
