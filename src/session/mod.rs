//! 会话存储：按 thread id 持久化 SessionState
//!
//! 同一线程的轮次由 ThreadLocks 串行化；不同线程互不影响。
//! save 时截断历史，只保留最近 max_history 条。

pub mod locks;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::core::{SessionState, TriageError};

pub use locks::ThreadLocks;
pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 读取会话；不存在时返回默认状态
    async fn load(&self, thread_id: &str) -> Result<SessionState, TriageError>;

    /// 写回会话（实现负责截断历史）
    async fn save(&self, thread_id: &str, state: SessionState) -> Result<(), TriageError>;
}
