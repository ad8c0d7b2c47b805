//! 对话专家：寒暄、非医学问题、对前面结果的追问

use std::sync::Arc;

use async_trait::async_trait;

use super::{Specialist, SpecialistInput, SpecialistOutput};
use crate::core::{AgentId, HistoryEntry, TriageError};
use crate::llm::{LlmClient, Message};

const CONVERSATION_PROMPT: &str = "You are a friendly medical assistant. Answer general questions and small talk directly. \
For medical questions, give accurate, cautious information and recommend consulting a healthcare professional for diagnosis or treatment. \
If the user asks about an earlier analysis in this conversation, refer to it explicitly.";

pub struct ConversationSpecialist {
    llm: Arc<dyn LlmClient>,
    context_limit: usize,
}

impl ConversationSpecialist {
    pub fn new(llm: Arc<dyn LlmClient>, context_limit: usize) -> Self {
        Self { llm, context_limit }
    }
}

#[async_trait]
impl Specialist for ConversationSpecialist {
    fn id(&self) -> AgentId {
        AgentId::Conversation
    }

    async fn run(
        &self,
        input: &SpecialistInput<'_>,
        history: &[HistoryEntry],
    ) -> Result<SpecialistOutput, TriageError> {
        let skip = history.len().saturating_sub(self.context_limit);
        let mut messages = vec![Message::system(CONVERSATION_PROMPT)];
        messages.extend(history.iter().skip(skip).map(Message::from));
        let mut text = input.text.to_string();
        if input.image_ref.is_some() {
            text.push_str("\n\n(The user also uploaded an image that could not be classified.)");
        }
        messages.push(Message::user(text));

        let reply = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| TriageError::specialist(AgentId::Conversation, e))?;
        Ok(SpecialistOutput::text(reply.trim()))
    }
}
