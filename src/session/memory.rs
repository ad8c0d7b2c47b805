//! 内存会话存储

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::core::{SessionState, TriageError};

pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
    max_history: usize,
}

impl MemorySessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(20)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, thread_id: &str) -> Result<SessionState, TriageError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, thread_id: &str, mut state: SessionState) -> Result<(), TriageError> {
        state.truncate_history(self.max_history);
        self.sessions
            .write()
            .await
            .insert(thread_id.to_string(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HistoryEntry;

    #[tokio::test]
    async fn test_load_missing_is_default() {
        let store = MemorySessionStore::default();
        let state = store.load("nobody").await.unwrap();
        assert!(state.history.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_save_truncates_history() {
        let store = MemorySessionStore::new(4);
        let mut state = SessionState::new();
        for i in 0..6 {
            state.history.push_back(HistoryEntry::user(format!("m{i}")));
        }
        store.save("t1", state).await.unwrap();

        let back = store.load("t1").await.unwrap();
        assert_eq!(back.history.len(), 4);
        assert_eq!(back.history[0].text, "m2");
        assert!(store.load("t2").await.unwrap().history.is_empty());
    }
}
