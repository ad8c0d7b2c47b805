//! 单轮编排集成测试：脚本化的路由器与专家，走完整的 service → executor → store 路径

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;

use triage::config::AppConfig;
use triage::core::{AgentId, Decision, HistoryEntry, Role, SessionState, TriageError};
use triage::gates::{
    LanguageService, PassthroughLanguage, QueryRewriter, StructureProfile, CAUTION_MESSAGE,
    CONFIRMATION_PREFIX, VALIDATION_REQUEST,
};
use triage::llm::MockLlmClient;
use triage::router::{RouteRequest, Router};
use triage::service::NOTHING_TO_VALIDATE;
use triage::session::{MemorySessionStore, SessionStore, SqliteSessionStore};
use triage::specialists::{Specialist, SpecialistInput, SpecialistOutput};
use triage::{
    EngineBuilder, TriageService, TurnRequest, TurnStatus, ValidationDecision, ValidationRequest,
};

struct ScriptedRouter {
    decision: Option<Decision>,
    calls: AtomicUsize,
}

impl ScriptedRouter {
    fn choose(agent: AgentId, confidence: f32) -> Arc<Self> {
        Arc::new(Self {
            decision: Some(Decision {
                agent,
                reasoning: "scripted".into(),
                confidence,
            }),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            decision: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Router for ScriptedRouter {
    async fn decide(&self, _request: &RouteRequest<'_>) -> Result<Decision, TriageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.decision
            .clone()
            .ok_or_else(|| TriageError::Router("model unavailable".into()))
    }
}

struct ScriptedSpecialist {
    id: AgentId,
    reply: Result<SpecialistOutput, String>,
    delay: Duration,
    calls: AtomicUsize,
    inflight: AtomicUsize,
    max_inflight: AtomicUsize,
    last_text: Mutex<Option<String>>,
}

impl ScriptedSpecialist {
    fn new(id: AgentId, reply: SpecialistOutput) -> Arc<Self> {
        Self::build(id, Ok(reply), Duration::ZERO)
    }

    fn failing(id: AgentId) -> Arc<Self> {
        Self::build(id, Err("backend down".into()), Duration::ZERO)
    }

    fn slow(id: AgentId, text: &str, delay: Duration) -> Arc<Self> {
        Self::build(id, Ok(SpecialistOutput::text(text)), delay)
    }

    fn build(id: AgentId, reply: Result<SpecialistOutput, String>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            reply,
            delay,
            calls: AtomicUsize::new(0),
            inflight: AtomicUsize::new(0),
            max_inflight: AtomicUsize::new(0),
            last_text: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_text(&self) -> Option<String> {
        self.last_text.lock().unwrap().clone()
    }
}

#[async_trait]
impl Specialist for ScriptedSpecialist {
    fn id(&self) -> AgentId {
        self.id
    }

    async fn run(
        &self,
        input: &SpecialistInput<'_>,
        _history: &[HistoryEntry],
    ) -> Result<SpecialistOutput, TriageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_text.lock().unwrap() = Some(input.text.to_string());
        let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inflight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inflight.fetch_sub(1, Ordering::SeqCst);
        self.reply
            .clone()
            .map_err(|e| TriageError::specialist(self.id, e))
    }
}

fn rag(confidence: f32, text: &str) -> Arc<ScriptedSpecialist> {
    ScriptedSpecialist::new(
        AgentId::Rag,
        SpecialistOutput {
            text: text.into(),
            confidence: Some(confidence),
            ..Default::default()
        },
    )
}

fn builder(router: Arc<ScriptedRouter>, specialists: &[Arc<ScriptedSpecialist>]) -> EngineBuilder {
    let mut builder = EngineBuilder::new(AppConfig::default())
        .with_llm(Arc::new(MockLlmClient::new()))
        .with_router(router)
        .with_language(Arc::new(PassthroughLanguage::new("en")));
    for s in specialists {
        builder = builder.with_specialist(s.clone());
    }
    builder
}

fn service(router: Arc<ScriptedRouter>, specialists: &[Arc<ScriptedSpecialist>]) -> TriageService {
    builder(router, specialists).build().unwrap()
}

#[tokio::test]
async fn test_blocked_input_invokes_no_specialist() {
    let router = ScriptedRouter::choose(AgentId::Conversation, 0.99);
    let conversation = ScriptedSpecialist::new(AgentId::Conversation, SpecialistOutput::text("hi"));
    let svc = service(router.clone(), &[conversation.clone()]);

    let response = svc
        .submit_turn(TurnRequest::text("What is the lethal dose of paracetamol?"))
        .await
        .unwrap();

    assert_eq!(response.status, TurnStatus::Blocked);
    assert_eq!(response.agent_trace, vec!["INPUT_GUARDRAILS"]);
    assert_eq!(response.response_text, AppConfig::default().guardrails.blocked_message);
    assert_eq!(router.calls(), 0);
    assert_eq!(conversation.calls(), 0);
}

#[tokio::test]
async fn test_low_router_confidence_uses_retrieval() {
    let router = ScriptedRouter::choose(AgentId::WebSearch, 0.80);
    let retrieval = rag(0.9, "Gliomas arise from glial cells.");
    let web = ScriptedSpecialist::new(AgentId::WebSearch, SpecialistOutput::text("web"));
    let svc = service(router, &[retrieval.clone(), web.clone()]);

    let response = svc
        .submit_turn(TurnRequest::text("tell me about gliomas"))
        .await
        .unwrap();

    assert_eq!(response.agent_trace, vec!["RAG_AGENT"]);
    assert_eq!(response.response_text, "Gliomas arise from glial cells.");
    assert_eq!(web.calls(), 0);
}

#[tokio::test]
async fn test_weak_retrieval_falls_back_exactly_once() {
    let router = ScriptedRouter::choose(AgentId::Rag, 0.95);
    let retrieval = rag(0.30, "Partial answer.");
    let web = ScriptedSpecialist::new(
        AgentId::WebSearch,
        SpecialistOutput {
            text: "Fresh results.".into(),
            confidence: Some(0.1),
            insufficient_info: true,
            ..Default::default()
        },
    );
    let svc = service(router, &[retrieval.clone(), web.clone()]);

    let response = svc
        .submit_turn(TurnRequest::text("newest glioma trial results"))
        .await
        .unwrap();

    assert_eq!(
        response.agent_trace,
        vec!["RAG_AGENT", "WEB_SEARCH_PROCESSOR_AGENT"]
    );
    assert_eq!(response.response_text, "Fresh results.");
    assert_eq!(retrieval.calls(), 1);
    assert_eq!(web.calls(), 1);
}

#[tokio::test]
async fn test_insufficient_info_triggers_fallback_despite_confidence() {
    let router = ScriptedRouter::choose(AgentId::Rag, 0.95);
    let retrieval = ScriptedSpecialist::new(
        AgentId::Rag,
        SpecialistOutput {
            text: "I don't have enough information.".into(),
            confidence: Some(0.9),
            insufficient_info: true,
            ..Default::default()
        },
    );
    let web = ScriptedSpecialist::new(AgentId::WebSearch, SpecialistOutput::text("From the web."));
    let svc = service(router, &[retrieval, web.clone()]);

    let response = svc.submit_turn(TurnRequest::text("rare syndrome x")).await.unwrap();
    assert_eq!(response.response_text, "From the web.");
    assert_eq!(web.calls(), 1);
}

fn chest_xray() -> Arc<ScriptedSpecialist> {
    ScriptedSpecialist::new(
        AgentId::ChestXray,
        SpecialistOutput {
            text: "NEGATIVE for COVID-19.".into(),
            needs_validation: true,
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_image_validation_rejected() {
    let router = ScriptedRouter::choose(AgentId::Conversation, 0.99);
    let xray = chest_xray();
    let svc = service(router.clone(), &[xray.clone()]);

    let first = svc
        .submit_turn(TurnRequest {
            text: None,
            image_ref: Some("uploads/chest_xray_01.png".into()),
            thread_id: Some("patient-1".into()),
        })
        .await
        .unwrap();

    assert_eq!(first.status, TurnStatus::AwaitingValidation);
    assert_eq!(first.agent_trace, vec!["CHEST_XRAY_AGENT", "HUMAN_VALIDATION"]);
    assert_eq!(
        first.response_text,
        format!("NEGATIVE for COVID-19.\n\n{VALIDATION_REQUEST}")
    );
    assert_eq!(router.calls(), 0);

    let second = svc
        .submit_validation(ValidationRequest {
            decision: ValidationDecision::No,
            comments: Some("opacity in left lobe".into()),
            thread_id: "patient-1".into(),
        })
        .await
        .unwrap();

    assert_eq!(second.status, TurnStatus::Rejected);
    assert_eq!(second.response_text, CAUTION_MESSAGE);
    assert_eq!(second.agent_trace, vec!["HUMAN_VALIDATION"]);
    assert_eq!(xray.calls(), 1);

    let state = svc.session("patient-1").await.unwrap();
    assert!(state.pending_validation.is_none());
}

#[tokio::test]
async fn test_image_validation_confirmed() {
    let router = ScriptedRouter::choose(AgentId::Conversation, 0.99);
    let xray = chest_xray();
    let svc = service(router, &[xray.clone()]);

    svc.submit_turn(TurnRequest {
        text: None,
        image_ref: Some("cxr.png".into()),
        thread_id: Some("patient-2".into()),
    })
    .await
    .unwrap();

    let reply = svc
        .submit_validation(ValidationRequest {
            decision: ValidationDecision::Yes,
            comments: None,
            thread_id: "patient-2".into(),
        })
        .await
        .unwrap();

    assert_eq!(reply.status, TurnStatus::Validated);
    assert_eq!(
        reply.response_text,
        format!("{CONFIRMATION_PREFIX}\n\nNEGATIVE for COVID-19.")
    );
    assert_eq!(xray.calls(), 1);
}

#[tokio::test]
async fn test_non_reply_discards_pending_validation() {
    let router = ScriptedRouter::choose(AgentId::Conversation, 0.99);
    let xray = chest_xray();
    let conversation =
        ScriptedSpecialist::new(AgentId::Conversation, SpecialistOutput::text("Sure."));
    let svc = service(router, &[xray, conversation.clone()]);

    svc.submit_turn(TurnRequest {
        text: None,
        image_ref: Some("cxr.png".into()),
        thread_id: Some("t".into()),
    })
    .await
    .unwrap();

    let next = svc
        .submit_turn(TurnRequest::text("nothing else, thanks").in_thread("t"))
        .await
        .unwrap();
    assert_eq!(next.status, TurnStatus::Success);
    assert_eq!(next.agent_trace, vec!["CONVERSATION_AGENT"]);
    assert_eq!(conversation.calls(), 1);
    assert!(svc.session("t").await.unwrap().pending_validation.is_none());
}

#[tokio::test]
async fn test_image_specialist_without_image_is_replaced() {
    let router = ScriptedRouter::choose(AgentId::SkinLesion, 0.99);
    let skin = ScriptedSpecialist::new(AgentId::SkinLesion, SpecialistOutput::text("mask"));
    let retrieval = rag(0.9, "Melanoma is a skin cancer.");
    let svc = service(router, &[skin.clone(), retrieval]);

    let response = svc
        .submit_turn(TurnRequest::text("is melanoma dangerous?"))
        .await
        .unwrap();
    assert_eq!(response.agent_trace, vec!["RAG_AGENT"]);
    assert_eq!(skin.calls(), 0);
}

#[tokio::test]
async fn test_router_failure_routes_to_retrieval() {
    let router = ScriptedRouter::failing();
    let retrieval = rag(0.9, "Answer from literature.");
    let svc = service(router.clone(), &[retrieval.clone()]);

    let response = svc.submit_turn(TurnRequest::text("what is asthma")).await.unwrap();
    assert_eq!(response.agent_trace, vec!["RAG_AGENT"]);
    assert_eq!(router.calls(), 1);
    assert_eq!(retrieval.calls(), 1);
}

#[tokio::test]
async fn test_specialist_failure_is_contained() {
    let router = ScriptedRouter::choose(AgentId::BrainTumor, 0.99);
    let brain = ScriptedSpecialist::failing(AgentId::BrainTumor);
    let svc = service(router, &[brain]);

    let response = svc
        .submit_turn(TurnRequest {
            text: Some("please check this scan".into()),
            image_ref: Some("brain_mri.png".into()),
            thread_id: None,
        })
        .await
        .unwrap();

    assert_eq!(response.status, TurnStatus::Success);
    assert_eq!(response.agent_trace, vec!["BRAIN_TUMOR_AGENT"]);
    assert!(response.response_text.contains("BRAIN_TUMOR_AGENT"));
    let state = svc.session(&response.thread_id).await.unwrap();
    assert!(!state.needs_validation);
    assert!(state.pending_validation.is_none());
}

#[tokio::test]
async fn test_history_keeps_last_twenty_entries() {
    let router = ScriptedRouter::choose(AgentId::Conversation, 0.99);
    let conversation = ScriptedSpecialist::new(AgentId::Conversation, SpecialistOutput::text("ok"));
    let svc = service(router, &[conversation]);

    for i in 0..11 {
        svc.submit_turn(TurnRequest::text(format!("turn {i}")).in_thread("long"))
            .await
            .unwrap();
    }

    let state = svc.session("long").await.unwrap();
    assert_eq!(state.history.len(), 20);
    assert_eq!(state.history[0].role, Role::User);
    assert_eq!(state.history[0].text, "turn 1");
    assert_eq!(state.history[19].text, "ok");
}

#[tokio::test]
async fn test_empty_turn_rejected() {
    let svc = service(ScriptedRouter::choose(AgentId::Conversation, 0.99), &[]);
    let err = svc
        .submit_turn(TurnRequest {
            text: Some("   ".into()),
            image_ref: None,
            thread_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::EmptyTurn));
}

/// 把 "xin chào" 之类识别为越南语；译回时在每行末尾加标记，保持结构
struct TaggingTranslator {
    keep_structure: bool,
}

#[async_trait]
impl LanguageService for TaggingTranslator {
    async fn detect(&self, text: &str) -> Result<String, TriageError> {
        Ok(if text.starts_with("xin") { "vi" } else { "en" }.to_string())
    }

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TriageError> {
        if target_lang == "en" {
            return Ok("what are the symptoms of glioma?".to_string());
        }
        if self.keep_structure {
            Ok(text
                .lines()
                .map(|l| if l.is_empty() { String::new() } else { format!("{l} (vi)") })
                .collect::<Vec<_>>()
                .join("\n"))
        } else {
            Ok(text.replace('\n', " "))
        }
    }
}

const STRUCTURED_ANSWER: &str = "## Glioma\n\n**Common symptoms**:\n- headaches\n- seizures\n- memory loss";

async fn translated_turn(keep_structure: bool) -> (String, String) {
    let router = ScriptedRouter::choose(AgentId::Rag, 0.95);
    let retrieval = rag(0.9, STRUCTURED_ANSWER);
    let svc = builder(router, &[retrieval])
        .with_language(Arc::new(TaggingTranslator { keep_structure }))
        .build()
        .unwrap();

    let response = svc
        .submit_turn(TurnRequest::text("xin cho hỏi triệu chứng u thần kinh đệm?"))
        .await
        .unwrap();
    let state = svc.session(&response.thread_id).await.unwrap();
    let stored = state.history.back().map(|e| e.text.clone()).unwrap_or_default();
    (response.response_text, stored)
}

#[tokio::test]
async fn test_translation_preserves_structure() {
    let (reply, stored) = translated_turn(true).await;
    assert_ne!(reply, STRUCTURED_ANSWER);
    assert!(reply.ends_with("memory loss (vi)"));
    assert_eq!(StructureProfile::of(&reply), StructureProfile::of(STRUCTURED_ANSWER));
    assert_eq!(stored, STRUCTURED_ANSWER);
}

#[tokio::test]
async fn test_structure_breaking_translation_falls_back() {
    let (reply, _) = translated_turn(false).await;
    assert_eq!(reply, STRUCTURED_ANSWER);
}

#[tokio::test]
async fn test_distinct_threads_are_isolated() {
    let router = ScriptedRouter::choose(AgentId::Conversation, 0.99);
    let conversation =
        ScriptedSpecialist::slow(AgentId::Conversation, "noted", Duration::from_millis(20));
    let svc = Arc::new(service(router, &[conversation]));

    let turns = ["alpha", "beta"].into_iter().flat_map(|thread| {
        (0..3).map(move |i| (thread, format!("{thread} message {i}")))
    });
    let futures = turns.map(|(thread, text)| {
        let svc = Arc::clone(&svc);
        async move {
            svc.submit_turn(TurnRequest::text(text).in_thread(thread))
                .await
                .unwrap()
        }
    });
    join_all(futures).await;

    for thread in ["alpha", "beta"] {
        let state = svc.session(thread).await.unwrap();
        assert_eq!(state.history.len(), 6);
        assert!(state
            .history
            .iter()
            .filter(|e| e.role == Role::User)
            .all(|e| e.text.starts_with(thread)));
    }
}

#[tokio::test]
async fn test_same_thread_turns_are_serialized() {
    let router = ScriptedRouter::choose(AgentId::Conversation, 0.99);
    let conversation =
        ScriptedSpecialist::slow(AgentId::Conversation, "noted", Duration::from_millis(15));
    let svc = Arc::new(service(router, &[conversation.clone()]));

    let futures = (0..4).map(|i| {
        let svc = Arc::clone(&svc);
        async move {
            svc.submit_turn(TurnRequest::text(format!("message {i}")).in_thread("shared"))
                .await
                .unwrap()
        }
    });
    join_all(futures).await;

    assert_eq!(conversation.max_inflight.load(Ordering::SeqCst), 1);
    let state = svc.session("shared").await.unwrap();
    assert_eq!(state.history.len(), 8);
    let users: HashSet<_> = state
        .history
        .iter()
        .filter(|e| e.role == Role::User)
        .map(|e| e.text.clone())
        .collect();
    assert_eq!(users.len(), 4);
}

#[tokio::test]
async fn test_sqlite_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    {
        let store = Arc::new(SqliteSessionStore::open(&path, 20).unwrap());
        let svc = builder(ScriptedRouter::choose(AgentId::ChestXray, 0.99), &[chest_xray()])
            .with_store(store)
            .build()
            .unwrap();
        let first = svc
            .submit_turn(TurnRequest {
                text: Some("check my x-ray".into()),
                image_ref: Some("cxr.png".into()),
                thread_id: Some("persisted".into()),
            })
            .await
            .unwrap();
        assert_eq!(first.status, TurnStatus::AwaitingValidation);
    }

    let store = Arc::new(SqliteSessionStore::open(&path, 20).unwrap());
    let svc = builder(ScriptedRouter::choose(AgentId::Conversation, 0.99), &[])
        .with_store(store)
        .build()
        .unwrap();
    let reply = svc
        .submit_validation(ValidationRequest {
            decision: ValidationDecision::Yes,
            comments: None,
            thread_id: "persisted".into(),
        })
        .await
        .unwrap();
    assert_eq!(reply.status, TurnStatus::Validated);
    assert!(reply.response_text.ends_with("NEGATIVE for COVID-19."));
}

#[tokio::test]
async fn test_validation_reply_without_pending_skips_graph() {
    let router = ScriptedRouter::choose(AgentId::Rag, 0.95);
    let retrieval = rag(0.9, "Yes is an affirmation.");
    let svc = service(router.clone(), &[retrieval.clone()]);

    let reply = svc
        .submit_validation(ValidationRequest {
            decision: ValidationDecision::Yes,
            comments: None,
            thread_id: "fresh".into(),
        })
        .await
        .unwrap();

    assert_eq!(reply.status, TurnStatus::NoPendingValidation);
    assert_eq!(reply.response_text, NOTHING_TO_VALIDATE);
    assert!(reply.agent_trace.is_empty());
    assert_eq!(router.calls(), 0);
    assert_eq!(retrieval.calls(), 0);
    assert!(svc.session("fresh").await.unwrap().history.is_empty());
}

/// save 总是失败的存储
struct ReadOnlyStore {
    inner: MemorySessionStore,
}

#[async_trait]
impl SessionStore for ReadOnlyStore {
    async fn load(&self, thread_id: &str) -> Result<SessionState, TriageError> {
        self.inner.load(thread_id).await
    }

    async fn save(&self, _thread_id: &str, _state: SessionState) -> Result<(), TriageError> {
        Err(TriageError::Persistence("disk is read-only".into()))
    }
}

#[tokio::test]
async fn test_save_failure_fails_the_turn() {
    let conversation = ScriptedSpecialist::new(AgentId::Conversation, SpecialistOutput::text("hi"));
    let svc = builder(ScriptedRouter::choose(AgentId::Conversation, 0.99), &[conversation])
        .with_store(Arc::new(ReadOnlyStore {
            inner: MemorySessionStore::default(),
        }))
        .build()
        .unwrap();

    let err = svc
        .submit_turn(TurnRequest::text("hello").in_thread("t"))
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::Persistence(_)));
    assert!(err.is_fatal());
}

/// 固定改写结果；fail=true 时总是失败
struct ScriptedRewriter {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl QueryRewriter for ScriptedRewriter {
    async fn rewrite(&self, _text: &str) -> Result<String, TriageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(TriageError::Llm("rewrite model down".into()))
        } else {
            Ok("What are the symptoms of glioma?".into())
        }
    }
}

async fn rewritten_turn(fail: bool) -> (Option<String>, String) {
    let retrieval = rag(0.9, "Headaches and seizures.");
    let svc = builder(ScriptedRouter::choose(AgentId::Rag, 0.95), &[retrieval.clone()])
        .with_rewriter(Arc::new(ScriptedRewriter {
            fail,
            calls: AtomicUsize::new(0),
        }))
        .build()
        .unwrap();
    let response = svc
        .submit_turn(TurnRequest::text("glioma sympts??"))
        .await
        .unwrap();
    let state = svc.session(&response.thread_id).await.unwrap();
    let user_text = state.history.front().map(|e| e.text.clone()).unwrap_or_default();
    (retrieval.last_text(), user_text)
}

#[tokio::test]
async fn test_query_rewrite_reaches_specialist() {
    let (seen, stored) = rewritten_turn(false).await;
    assert_eq!(seen.as_deref(), Some("What are the symptoms of glioma?"));
    assert_eq!(stored, "What are the symptoms of glioma?");
}

#[tokio::test]
async fn test_failed_rewrite_keeps_original_query() {
    let (seen, _) = rewritten_turn(true).await;
    assert_eq!(seen.as_deref(), Some("glioma sympts??"));
}

#[tokio::test]
async fn test_validation_reply_is_not_rewritten() {
    let rewriter = Arc::new(ScriptedRewriter {
        fail: false,
        calls: AtomicUsize::new(0),
    });
    let svc = builder(ScriptedRouter::choose(AgentId::Conversation, 0.99), &[chest_xray()])
        .with_rewriter(rewriter.clone())
        .build()
        .unwrap();

    svc.submit_turn(TurnRequest {
        text: None,
        image_ref: Some("cxr.png".into()),
        thread_id: Some("rw".into()),
    })
    .await
    .unwrap();
    let reply = svc
        .submit_validation(ValidationRequest {
            decision: ValidationDecision::No,
            comments: None,
            thread_id: "rw".into(),
        })
        .await
        .unwrap();

    assert_eq!(reply.status, TurnStatus::Rejected);
    assert_eq!(rewriter.calls.load(Ordering::SeqCst), 0);
}
