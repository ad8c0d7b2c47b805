//! SQLite 会话存储
//!
//! 单个 rusqlite 连接放在 Mutex 里；同步调用包在 spawn_blocking 中，不阻塞运行时。
//! 状态以 JSON 存储，单轮字段（serde skip）不落盘。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::SessionStore;
use crate::core::{SessionState, TriageError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS sessions (
    thread_id  TEXT PRIMARY KEY,
    state      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
    max_history: usize,
}

impl SqliteSessionStore {
    /// 打开（或创建）数据库文件
    pub fn open(path: impl AsRef<Path>, max_history: usize) -> Result<Self, TriageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| TriageError::Persistence(format!("create {}: {e}", parent.display())))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!("Session database opened at {}", path.display());
        Ok(Self::from_connection(conn, max_history))
    }

    /// 内存数据库（测试用）
    pub fn in_memory(max_history: usize) -> Result<Self, TriageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn, max_history))
    }

    fn from_connection(conn: Connection, max_history: usize) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            max_history,
        }
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, TriageError>
    where
        F: FnOnce(&Connection) -> Result<T, TriageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| TriageError::Persistence(format!("connection lock poisoned: {e}")))?;
            f(&guard)
        })
        .await
        .map_err(|e| TriageError::Persistence(format!("blocking task failed: {e}")))?
    }

    /// 最近一次写入时间
    pub async fn updated_at(&self, thread_id: &str) -> Result<Option<DateTime<Utc>>, TriageError> {
        let id = thread_id.to_string();
        self.with_conn(move |conn| {
            let ts = conn
                .query_row(
                    "SELECT updated_at FROM sessions WHERE thread_id = ?1",
                    params![id],
                    |row| row.get::<_, DateTime<Utc>>(0),
                )
                .optional()?;
            Ok(ts)
        })
        .await
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, thread_id: &str) -> Result<SessionState, TriageError> {
        let id = thread_id.to_string();
        let raw: Option<String> = self
            .with_conn(move |conn| {
                let raw = conn
                    .query_row(
                        "SELECT state FROM sessions WHERE thread_id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(raw)
            })
            .await?;

        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(SessionState::default()),
        }
    }

    async fn save(&self, thread_id: &str, mut state: SessionState) -> Result<(), TriageError> {
        state.truncate_history(self.max_history);
        let json = serde_json::to_string(&state)?;
        let id = thread_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (thread_id, state, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(thread_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
                params![id, json, Utc::now()],
            )?;
            Ok(())
        })
        .await
    }
}
