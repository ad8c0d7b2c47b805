//! 规则路由（不调用 LLM），用于离线运行

use async_trait::async_trait;

use super::{RouteRequest, Router};
use crate::core::{AgentId, Decision, TriageError};

/// 关键词规则路由器
#[derive(Debug, Default, Clone)]
pub struct RuleRouter;

impl RuleRouter {
    pub fn new() -> Self {
        Self
    }

    fn classify(&self, request: &RouteRequest<'_>) -> (AgentId, f32, &'static str) {
        if request.has_image {
            if let Some(agent) = request.image_type.and_then(|t| t.specialist()) {
                return (agent, 0.95, "image uploaded");
            }
            return (AgentId::Conversation, 0.9, "unrecognized image");
        }

        let text = request.text.to_lowercase();

        let recency = [
            "latest", "recent", "news", "current", "today", "this week", "outbreak", "new study",
        ];
        if recency.iter().any(|k| text.contains(k)) {
            return (AgentId::WebSearch, 0.9, "time-sensitive");
        }

        let greetings = ["hi", "hello", "hey", "thanks", "thank you", "good morning", "bye"];
        let first = text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_matches(|c: char| !c.is_alphanumeric());
        if greetings.contains(&first) || greetings.contains(&text.trim()) {
            return (AgentId::Conversation, 0.95, "greeting");
        }

        let knowledge = [
            "what is", "what are", "symptom", "treatment", "cause", "diagnos", "disease",
            "tumor", "tumour", "covid", "cancer", "lesion", "therapy",
        ];
        if knowledge.iter().any(|k| text.contains(k)) {
            return (AgentId::Rag, 0.9, "medical knowledge");
        }

        (AgentId::Conversation, 0.6, "no rule matched")
    }
}

#[async_trait]
impl Router for RuleRouter {
    async fn decide(&self, request: &RouteRequest<'_>) -> Result<Decision, TriageError> {
        let (agent, confidence, why) = self.classify(request);
        Ok(Decision {
            agent,
            reasoning: why.to_string(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ImageType;

    fn req(text: &str) -> RouteRequest<'_> {
        RouteRequest {
            text,
            has_image: false,
            image_type: None,
            recent_history: &[],
        }
    }

    #[tokio::test]
    async fn test_rules() {
        let router = RuleRouter::new();
        assert_eq!(router.decide(&req("Hello!")).await.unwrap().agent, AgentId::Conversation);
        assert_eq!(
            router.decide(&req("latest measles outbreak in Hanoi")).await.unwrap().agent,
            AgentId::WebSearch
        );
        assert_eq!(
            router.decide(&req("What are the symptoms of glioma?")).await.unwrap().agent,
            AgentId::Rag
        );
        let fallback = router.decide(&req("tell me a joke")).await.unwrap();
        assert!(fallback.confidence < 0.85);
    }

    #[tokio::test]
    async fn test_image_rule_uses_type() {
        let router = RuleRouter::new();
        let request = RouteRequest {
            text: "what do you see?",
            has_image: true,
            image_type: Some(ImageType::BrainMri),
            recent_history: &[],
        };
        assert_eq!(router.decide(&request).await.unwrap().agent, AgentId::BrainTumor);
    }
}
