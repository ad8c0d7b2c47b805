//! 闸门层：语言边界、安全、置信度回退、人工复核

pub mod confidence;
pub mod language;
pub mod rewrite;
pub mod safety;
pub mod validation;

pub use confidence::{normalize_confidence, ConfidenceGate};
pub use language::{
    normalize_lang_code, LanguageBoundary, LanguageService, LlmLanguageService,
    PassthroughLanguage, StructureProfile,
};
pub use rewrite::{LlmQueryRewriter, PassthroughRewriter, QueryRewriter};
pub use safety::{InputVerdict, KeywordGuardrails, LlmGuardrails, SafetyGate, WITHHELD_NOTICE};
pub use validation::{
    parse_reply, ValidationGate, ValidationPolicy, CAUTION_MESSAGE, CONFIRMATION_PREFIX,
    VALIDATION_REQUEST,
};
