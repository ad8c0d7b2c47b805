//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TRIAGE__*` 覆盖（双下划线表示嵌套，如 `TRIAGE__ROUTING__CONFIDENCE_THRESHOLD=0.9`）。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentId;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub routing: RoutingSection,
    pub retrieval: RetrievalSection,
    pub web_search: WebSearchSection,
    pub language: LanguageSection,
    pub session: SessionSection,
    pub validation: ValidationSection,
    pub guardrails: GuardrailsSection,
    pub cleanup: CleanupSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：OpenAI 兼容后端
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [routing] 段：路由置信度阈值与参考的历史条数
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSection {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            history_window: default_history_window(),
        }
    }
}

fn default_confidence_threshold() -> f32 {
    0.85
}

fn default_history_window() -> usize {
    6
}

/// [retrieval] 段：低于 min_confidence 时回退到 Web 搜索
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSection {
    #[serde(default = "default_min_retrieval_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    #[serde(default = "default_true")]
    pub include_sources: bool,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            min_confidence: default_min_retrieval_confidence(),
            context_limit: default_context_limit(),
            include_sources: true,
        }
    }
}

fn default_min_retrieval_confidence() -> f32 {
    0.40
}

fn default_context_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

/// [web_search] 段
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchSection {
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

impl Default for WebSearchSection {
    fn default() -> Self {
        Self {
            context_limit: default_context_limit(),
        }
    }
}

/// [language] 段：工作语言与无文本时的默认语言
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageSection {
    #[serde(default = "default_language")]
    pub canonical: String,
    #[serde(default = "default_language")]
    pub default: String,
    /// 翻译后是否用 LLM 把问题改写成清晰的英文（离线时不生效）
    #[serde(default)]
    pub rewrite_query: bool,
}

impl Default for LanguageSection {
    fn default() -> Self {
        Self {
            canonical: default_language(),
            default: default_language(),
            rewrite_query: false,
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// [session] 段：历史保留条数；db_path 设置时使用 SQLite 存储
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    pub db_path: Option<PathBuf>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            db_path: None,
        }
    }
}

fn default_max_history() -> usize {
    20
}

/// [validation] 段：各专家是否需要人工确认（键为专家标识）
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationSection {
    #[serde(default = "default_require_validation")]
    pub require_validation: HashMap<String, bool>,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            require_validation: default_require_validation(),
        }
    }
}

fn default_require_validation() -> HashMap<String, bool> {
    AgentId::ALL
        .iter()
        .map(|agent| (agent.as_str().to_string(), agent.is_image_specialist()))
        .collect()
}

/// [guardrails] 段：输入拦截规则
#[derive(Debug, Clone, Deserialize)]
pub struct GuardrailsSection {
    #[serde(default = "default_blocked_patterns")]
    pub blocked_patterns: Vec<String>,
    #[serde(default = "default_blocked_message")]
    pub blocked_message: String,
    /// 是否在关键词规则之后再调用 LLM 判定
    #[serde(default)]
    pub use_llm: bool,
}

impl Default for GuardrailsSection {
    fn default() -> Self {
        Self {
            blocked_patterns: default_blocked_patterns(),
            blocked_message: default_blocked_message(),
            use_llm: false,
        }
    }
}

fn default_blocked_patterns() -> Vec<String> {
    vec![
        r"\b(make|build|synthesi[sz]e)\b.*\b(bomb|explosive|nerve agent)\b".into(),
        r"\b(kill|hurt|harm)\s+(myself|yourself|someone)\b".into(),
        r"\bignore (all|previous|your) instructions\b".into(),
        r"\b(lethal|fatal) dose\b".into(),
    ]
}

fn default_blocked_message() -> String {
    "I can't help with that request. If you are in danger or thinking about harming yourself, please contact local emergency services right away.".to_string()
}

/// [cleanup] 段：临时产物清理
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cleanup_pattern")]
    pub pattern: String,
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
}

impl Default for CleanupSection {
    fn default() -> Self {
        Self {
            enabled: false,
            pattern: default_cleanup_pattern(),
            interval_secs: default_cleanup_interval(),
        }
    }
}

fn default_cleanup_pattern() -> String {
    "uploads/speech/*.mp3".to_string()
}

fn default_cleanup_interval() -> u64 {
    300
}

/// 从 config 目录加载配置，环境变量 TRIAGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TRIAGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TRIAGE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
