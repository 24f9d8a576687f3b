//! 过期租约清理任务
//!
//! 按固定间隔调用 [`DevicePool::sweep_expired`]，锁只在清理期间持有。

use super::device_pool::DevicePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// 过期清理任务句柄，drop 时任务随之停止
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// 启动清理任务
    pub fn spawn(pool: Arc<DevicePool>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // 第一次 tick 立即完成，跳过
            ticker.tick().await;

            info!("过期清理任务已启动，间隔 {:?}", interval);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("过期清理任务已停止");
                        break;
                    }
                    _ = ticker.tick() => {
                        let cleared = pool.sweep_expired().await;
                        if cleared > 0 {
                            info!("清理了 {} 个过期租约", cleared);
                        } else {
                            debug!("没有过期租约需要清理");
                        }
                    }
                }
            }
        });

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// 停止清理任务并等待其退出
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("过期清理任务异常退出: {:?}", e);
            }
        }
    }

    /// 任务是否仍在运行
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_sweeper_clears_expired_leases() {
        let pool = Arc::new(DevicePool::new("iphone", 2).unwrap());
        pool.reserve("alice", "iphone", ChronoDuration::milliseconds(20)).await.unwrap();
        pool.reserve("bob", "iphone", ChronoDuration::hours(1)).await.unwrap();

        let sweeper = ExpirySweeper::spawn(Arc::clone(&pool), Duration::from_millis(50));
        assert!(sweeper.is_running());

        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = pool.snapshot().await;
        assert!(snapshot[0].device.reserved_by.is_none());
        assert_eq!(snapshot[1].device.reserved_by.as_deref(), Some("bob"));

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_shutdown() {
        let pool = Arc::new(DevicePool::new("iphone", 1).unwrap());
        let sweeper = ExpirySweeper::spawn(Arc::clone(&pool), Duration::from_secs(60));

        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown())
            .await
            .expect("清理任务应在超时前退出");
    }
}
