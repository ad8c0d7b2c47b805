//! 语言边界：入站检测 + 翻译到工作语言，出站翻译回用户语言
//!
//! 入站与出站翻译都必须一一保留结构（换行、列表、强调、标题）；结构不一致或翻译失败时返回原文。
//! 翻译之后可选地做一次查询改写（见 rewrite 模块）。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use super::rewrite::{PassthroughRewriter, QueryRewriter};
use crate::core::TriageError;
use crate::llm::{LlmClient, Message};

/// 语言服务（外部协作者）
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// 返回 ISO 639-1 语言码
    async fn detect(&self, text: &str) -> Result<String, TriageError>;

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TriageError>;
}

/// 把 "EN-us"、"'vi'\n" 之类的回复规整为两位小写语言码
pub fn normalize_lang_code(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .trim_matches(|c: char| c == '\'' || c == '"' || c == '`' || c == '.')
        .to_lowercase();
    let code = cleaned
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    if (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_string())
    } else {
        None
    }
}

/// 文本的结构特征计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StructureProfile {
    pub line_breaks: usize,
    pub list_items: usize,
    pub emphasis: usize,
    pub headings: usize,
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*(?:[-*+•]|\d+[.)])[ \t]+\S").expect("valid regex"))
}

fn emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*[^*\n]+\*\*|__[^_\n]+__").expect("valid regex"))
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+\S").expect("valid regex"))
}

impl StructureProfile {
    pub fn of(text: &str) -> Self {
        let trimmed = text.trim_end_matches('\n');
        Self {
            line_breaks: trimmed.matches('\n').count(),
            list_items: list_item_re().find_iter(text).count(),
            emphasis: emphasis_re().find_iter(text).count(),
            headings: heading_re().find_iter(text).count(),
        }
    }
}

/// 语言边界：持有语言服务、工作语言与默认语言
pub struct LanguageBoundary {
    service: Arc<dyn LanguageService>,
    canonical: String,
    default_lang: String,
    rewriter: Arc<dyn QueryRewriter>,
}

impl LanguageBoundary {
    pub fn new(
        service: Arc<dyn LanguageService>,
        canonical: impl Into<String>,
        default_lang: impl Into<String>,
    ) -> Self {
        Self {
            service,
            canonical: canonical.into(),
            default_lang: default_lang.into(),
            rewriter: Arc::new(PassthroughRewriter),
        }
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    /// 改写工作语言文本；失败或返回空文本时原样返回
    pub async fn rewrite(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }
        match self.rewriter.rewrite(text).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => rewritten,
            Ok(_) => {
                tracing::warn!("Query rewrite returned empty text, keeping original");
                text.to_string()
            }
            Err(e) => {
                tracing::warn!("Query rewrite failed, keeping original: {}", e);
                text.to_string()
            }
        }
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// 入站：检测一次语言；非工作语言则翻译。返回 (语言码, 工作语言文本)
    pub async fn ingress(&self, text: &str) -> (String, String) {
        if text.trim().is_empty() {
            return (self.default_lang.clone(), String::new());
        }

        let lang = match self.service.detect(text).await {
            Ok(raw) => normalize_lang_code(&raw).unwrap_or_else(|| {
                tracing::warn!("Unusable language code '{}', assuming {}", raw, self.canonical);
                self.canonical.clone()
            }),
            Err(e) => {
                tracing::warn!("Language detection failed: {}", e);
                self.canonical.clone()
            }
        };

        if lang == self.canonical {
            return (lang, text.to_string());
        }

        match self.service.translate(text, &self.canonical).await {
            Ok(translated) if translated.trim().is_empty() => {
                tracing::warn!("Inbound translation returned empty text, keeping original");
                (lang, text.to_string())
            }
            Ok(translated) => {
                let before = StructureProfile::of(text);
                let after = StructureProfile::of(&translated);
                if before == after {
                    (lang, translated)
                } else {
                    tracing::warn!(
                        "Inbound translation from {} changed structure ({:?} -> {:?}), keeping original",
                        lang,
                        before,
                        after
                    );
                    (lang, text.to_string())
                }
            }
            Err(e) => {
                tracing::warn!("Inbound translation failed, keeping original: {}", e);
                (lang, text.to_string())
            }
        }
    }

    /// 出站：翻译回 lang；失败或结构被破坏时返回原文
    pub async fn egress(&self, text: &str, lang: &str) -> String {
        if lang.is_empty() || lang == self.canonical || text.trim().is_empty() {
            return text.to_string();
        }

        match self.service.translate(text, lang).await {
            Ok(translated) => {
                let before = StructureProfile::of(text);
                let after = StructureProfile::of(&translated);
                if before == after {
                    translated
                } else {
                    tracing::warn!(
                        "Translation to {} changed structure ({:?} -> {:?}), sending untranslated",
                        lang,
                        before,
                        after
                    );
                    text.to_string()
                }
            }
            Err(e) => {
                tracing::warn!("Outbound translation to {} failed: {}", lang, e);
                text.to_string()
            }
        }
    }
}

/// 基于 LLM 的语言服务
pub struct LlmLanguageService {
    llm: Arc<dyn LlmClient>,
}

impl LlmLanguageService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "vi" => "Vietnamese",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "zh" => "Chinese",
        "ja" => "Japanese",
        other => other,
    }
}

#[async_trait]
impl LanguageService for LlmLanguageService {
    async fn detect(&self, text: &str) -> Result<String, TriageError> {
        let messages = vec![
            Message::system(
                "Identify the language of the user's text. Reply with the ISO 639-1 code only, e.g. en, vi, fr.",
            ),
            Message::user(text.to_string()),
        ];
        self.llm.complete(&messages).await.map_err(TriageError::Llm)
    }

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TriageError> {
        let target = language_name(target_lang);
        let system = format!(
            "Translate the user's text into {target}. Keep the layout identical: the same line \
             breaks and paragraphs, the same bullet and numbered list markers, the same bold or \
             italic markers, the same headings and symbols. Keep medical terms that have no \
             common translation in English. Output the translation only."
        );
        let messages = vec![Message::system(system), Message::user(text.to_string())];
        self.llm
            .complete(&messages)
            .await
            .map_err(TriageError::Translation)
    }
}

/// 不做检测和翻译：所有文本都视为工作语言
#[derive(Debug, Clone)]
pub struct PassthroughLanguage {
    lang: String,
}

impl PassthroughLanguage {
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }
}

#[async_trait]
impl LanguageService for PassthroughLanguage {
    async fn detect(&self, _text: &str) -> Result<String, TriageError> {
        Ok(self.lang.clone())
    }

    async fn translate(&self, text: &str, _target_lang: &str) -> Result<String, TriageError> {
        Ok(text.to_string())
    }
}
