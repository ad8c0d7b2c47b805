//! 临时产物清理
//!
//! 固定间隔删除匹配 glob 的生成文件（如语音合成的 mp3）。与单轮执行不共享任何状态。

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::CleanupSection;

/// 周期性清理任务
#[derive(Debug, Clone)]
pub struct ArtifactReaper {
    pattern: String,
    interval: Duration,
}

impl ArtifactReaper {
    pub fn new(pattern: impl Into<String>, interval: Duration) -> Self {
        Self {
            pattern: pattern.into(),
            interval,
        }
    }

    pub fn from_config(section: &CleanupSection) -> Self {
        Self::new(
            section.pattern.clone(),
            Duration::from_secs(section.interval_secs.max(1)),
        )
    }

    /// 执行一次清理，返回删除的文件数
    pub fn sweep(&self) -> usize {
        let paths = match glob::glob(&self.pattern) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!("Invalid cleanup pattern '{}': {}", self.pattern, e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
                },
                Ok(_) => {}
                Err(e) => tracing::warn!("Unreadable cleanup entry: {}", e),
            }
        }
        removed
    }

    /// 在后台按间隔运行，token 取消后退出
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("Artifact reaper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = self.sweep();
                        if removed > 0 {
                            tracing::info!("Cleaned up {} generated artifacts", removed);
                        }
                    }
                }
            }
        })
    }
}
