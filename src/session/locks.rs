//! 每个 thread id 一把异步锁，覆盖 load → execute → save 整个周期

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// 锁表超过该大小时顺带清理空闲条目
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct ThreadLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取该线程的锁；同线程的后续调用会等待当前持有者释放
    pub async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            if map.len() > PRUNE_THRESHOLD {
                map.retain(|_, l| Arc::strong_count(l) > 1);
            }
            Arc::clone(map.entry(thread_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// 当前登记的线程数
    pub fn len(&self) -> usize {
        self.locks.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_thread_waits_other_thread_does_not() {
        let locks = Arc::new(ThreadLocks::new());
        let guard = locks.acquire("a").await;

        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire("b")).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire("a")).await;
        assert!(same.is_err());

        drop(guard);
        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire("a")).await;
        assert!(same.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
