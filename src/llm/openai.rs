//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（base_url 可配）。每次请求受 `[llm.timeouts].request` 约束，
//! 超时与空回复都按失败返回，由调用方（路由 / 闸门 / 专家）各自降级。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::LlmSection;
use crate::llm::{ChatRole, LlmClient, Message};

/// 进程内累计的 token 用量
#[derive(Debug, Default)]
pub struct TokenUsage {
    prompt: AtomicU64,
    completion: AtomicU64,
}

impl TokenUsage {
    pub fn record(&self, prompt: u64, completion: u64) {
        self.prompt.fetch_add(prompt, Ordering::Relaxed);
        self.completion.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt, completion, total)
    pub fn snapshot(&self) -> (u64, u64, u64) {
        let prompt = self.prompt.load(Ordering::Relaxed);
        let completion = self.completion.load(Ordering::Relaxed);
        (prompt, completion, prompt + completion)
    }
}

fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.content.clone();
    Ok(match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    })
}

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
    usage: TokenUsage,
}

impl OpenAiClient {
    /// api_key 为空时回退到 OPENAI_API_KEY 环境变量
    pub fn from_config(section: &LlmSection) -> Self {
        let mut config = OpenAIConfig::new();
        if let Some(url) = &section.base_url {
            config = config.with_api_base(url);
        }
        if let Some(key) = section
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        {
            config = config.with_api_key(key);
        }

        tracing::info!(
            "LLM backend: {} model={} timeout={}s",
            section.provider,
            section.model,
            section.timeouts.request
        );
        Self {
            client: Client::with_config(config),
            model: section.model.clone(),
            timeout: Duration::from_secs(section.timeouts.request.max(1)),
            usage: TokenUsage::default(),
        }
    }

    pub fn usage(&self) -> &TokenUsage {
        &self.usage
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.snapshot()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .map_err(|e| e.to_string())?;

        let response = match tokio::time::timeout(self.timeout, self.client.chat().create(request)).await {
            Ok(result) => result.map_err(|e| e.to_string())?,
            Err(_) => return Err(format!("LLM request timed out after {}s", self.timeout.as_secs())),
        };

        if let Some(usage) = &response.usage {
            self.usage
                .record(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| "LLM returned an empty completion".to_string())
    }
}
