//! 引擎构建器：从 AppConfig 组装所有协作者
//!
//! 配置了 API key 时使用 LLM 路由、翻译与安全判定；否则使用规则路由、直通翻译、
//! 关键词闸门和 Mock LLM，便于离线运行。检索语料、搜索服务和图像模型由调用方注入。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{AgentId, TriageError};
use crate::gates::{
    ConfidenceGate, KeywordGuardrails, LanguageBoundary, LanguageService, LlmGuardrails,
    LlmLanguageService, LlmQueryRewriter, PassthroughLanguage, PassthroughRewriter,
    QueryRewriter, SafetyGate, ValidationPolicy,
};
use crate::graph::{EngineContext, EngineSettings, GraphExecutor};
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::router::{LlmRouter, Router, RuleRouter};
use crate::service::TriageService;
use crate::session::{MemorySessionStore, SessionStore, SqliteSessionStore};
use crate::specialists::{
    ConversationSpecialist, FilenameImageClassifier, ImageAnalyzer, ImageDiagnosisSpecialist,
    ImageTypeClassifier, InMemoryCorpus, RetrievalSpecialist, SearchProvider, Specialist,
    SpecialistRegistry, StaticSearchProvider, UnavailableAnalyzer, WebSearchSpecialist,
};

/// 引擎构建器
pub struct EngineBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    router: Option<Arc<dyn Router>>,
    language: Option<Arc<dyn LanguageService>>,
    rewriter: Option<Arc<dyn QueryRewriter>>,
    safety: Option<Arc<dyn SafetyGate>>,
    classifier: Arc<dyn ImageTypeClassifier>,
    analyzer: Arc<dyn ImageAnalyzer>,
    corpus: InMemoryCorpus,
    search: Arc<dyn SearchProvider>,
    extra_specialists: Vec<Arc<dyn Specialist>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl EngineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            router: None,
            language: None,
            rewriter: None,
            safety: None,
            classifier: Arc::new(FilenameImageClassifier),
            analyzer: Arc::new(UnavailableAnalyzer),
            corpus: InMemoryCorpus::new(),
            search: Arc::new(StaticSearchProvider::default()),
            extra_specialists: Vec::new(),
            store: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_language(mut self, language: Arc<dyn LanguageService>) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub fn with_safety(mut self, safety: Arc<dyn SafetyGate>) -> Self {
        self.safety = Some(safety);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ImageTypeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_image_analyzer(mut self, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_corpus(mut self, corpus: InMemoryCorpus) -> Self {
        self.corpus = corpus;
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = search;
        self
    }

    /// 覆盖同 id 的默认专家
    pub fn with_specialist(mut self, specialist: Arc<dyn Specialist>) -> Self {
        self.extra_specialists.push(specialist);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn has_api_key(&self) -> bool {
        self.config.llm.api_key.is_some() || std::env::var("OPENAI_API_KEY").is_ok()
    }

    /// 构建 LLM 客户端：有 key 用 OpenAI 兼容后端，否则 Mock
    pub fn build_llm(&self) -> Arc<dyn LlmClient> {
        if let Some(llm) = &self.llm {
            return Arc::clone(llm);
        }
        if self.has_api_key() {
            Arc::new(OpenAiClient::from_config(&self.config.llm))
        } else {
            tracing::warn!("No API key configured, using mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }

    fn build_router(&self, llm: &Arc<dyn LlmClient>) -> Arc<dyn Router> {
        match &self.router {
            Some(router) => Arc::clone(router),
            None if self.has_api_key() => Arc::new(LlmRouter::new(Arc::clone(llm))),
            None => Arc::new(RuleRouter::new()),
        }
    }

    fn build_language(&self, llm: &Arc<dyn LlmClient>) -> LanguageBoundary {
        let section = &self.config.language;
        let service: Arc<dyn LanguageService> = match &self.language {
            Some(service) => Arc::clone(service),
            None if self.has_api_key() => Arc::new(LlmLanguageService::new(Arc::clone(llm))),
            None => Arc::new(PassthroughLanguage::new(section.canonical.clone())),
        };
        let rewriter: Arc<dyn QueryRewriter> = match &self.rewriter {
            Some(rewriter) => Arc::clone(rewriter),
            None if section.rewrite_query && self.has_api_key() => {
                Arc::new(LlmQueryRewriter::new(Arc::clone(llm)))
            }
            None => Arc::new(PassthroughRewriter),
        };
        LanguageBoundary::new(service, section.canonical.clone(), section.default.clone())
            .with_rewriter(rewriter)
    }

    fn build_safety(&self, llm: &Arc<dyn LlmClient>) -> Result<Arc<dyn SafetyGate>, TriageError> {
        if let Some(safety) = &self.safety {
            return Ok(Arc::clone(safety));
        }
        let keywords = KeywordGuardrails::from_config(&self.config.guardrails)?;
        if self.config.guardrails.use_llm && self.has_api_key() {
            Ok(Arc::new(LlmGuardrails::new(Arc::clone(llm), keywords)))
        } else {
            Ok(Arc::new(keywords))
        }
    }

    /// 注册全部专家；图像专家的复核开关取自 [validation] 配置
    pub fn build_registry(
        &self,
        llm: &Arc<dyn LlmClient>,
        policy: &ValidationPolicy,
    ) -> SpecialistRegistry {
        let mut registry = SpecialistRegistry::new();
        registry.register(ConversationSpecialist::new(
            Arc::clone(llm),
            self.config.session.max_history,
        ));
        registry.register(
            RetrievalSpecialist::new(self.corpus.clone(), Arc::clone(llm))
                .with_context_limit(self.config.retrieval.context_limit)
                .with_sources(self.config.retrieval.include_sources),
        );
        registry.register(
            WebSearchSpecialist::new(Arc::clone(&self.search), Arc::clone(llm))
                .with_context_limit(self.config.web_search.context_limit),
        );
        for agent in [AgentId::BrainTumor, AgentId::ChestXray, AgentId::SkinLesion] {
            registry.register(
                ImageDiagnosisSpecialist::new(agent, Arc::clone(&self.analyzer))
                    .with_validation(policy.requires(agent)),
            );
        }
        for specialist in &self.extra_specialists {
            registry.register_arc(Arc::clone(specialist));
        }
        registry
    }

    pub fn build_context(&self) -> Result<EngineContext, TriageError> {
        let llm = self.build_llm();
        let policy = ValidationPolicy::from_config(&self.config.validation);
        Ok(EngineContext {
            settings: EngineSettings::from_config(&self.config),
            language: self.build_language(&llm),
            safety: self.build_safety(&llm)?,
            router: self.build_router(&llm),
            classifier: Arc::clone(&self.classifier),
            specialists: self.build_registry(&llm, &policy),
            confidence: ConfidenceGate::new(self.config.retrieval.min_confidence),
            validation: policy,
        })
    }

    /// 会话存储：配置了 db_path 用 SQLite，否则内存
    pub fn build_store(&self) -> Result<Arc<dyn SessionStore>, TriageError> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        let max_history = self.config.session.max_history;
        match &self.config.session.db_path {
            Some(path) => {
                tracing::info!("Using SQLite session store: {:?}", path);
                Ok(Arc::new(SqliteSessionStore::open(path, max_history)?))
            }
            None => {
                tracing::info!("Using in-memory session store");
                Ok(Arc::new(MemorySessionStore::new(max_history)))
            }
        }
    }

    pub fn build(self) -> Result<TriageService, TriageError> {
        let executor = GraphExecutor::new(Arc::new(self.build_context()?));
        let store = self.build_store()?;
        Ok(TriageService::new(executor, store))
    }
}
