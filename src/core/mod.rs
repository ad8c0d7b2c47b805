//! 核心层：错误类型、会话状态模型、引擎构建器、后台清理

pub mod builder;
pub mod cleanup;
pub mod error;
pub mod state;

pub use builder::EngineBuilder;
pub use cleanup::ArtifactReaper;
pub use error::TriageError;
pub use state::{
    AgentId, Decision, HistoryEntry, ImageType, PendingValidation, Role, SessionState,
    TraceStep, TurnInput, ValidationReply,
};
