//! 可用设备数量指标
//!
//! 消费设备池事件更新 `devices_available`。事件在写锁内发出并携带变更后的数量，
//! 因此主动释放、过期清理与并发预约都按实际顺序反映到指标上。

use crate::metrics::PoolMetrics;
use crate::pool::DevicePool;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 指标更新任务句柄，drop 时任务随之停止
pub(crate) struct AvailabilityGauge {
    handle: JoinHandle<()>,
}

impl AvailabilityGauge {
    /// 启动指标更新任务，需要在 tokio 运行时内调用
    pub(crate) fn spawn(pool: Arc<DevicePool>, metrics: Arc<dyn PoolMetrics>) -> Self {
        // 先订阅再读取初始值，之后的变更不会遗漏
        let mut events = pool.subscribe_events();

        let handle = tokio::spawn(async move {
            metrics.set_available(pool.available_count(None).await);

            loop {
                match events.recv().await {
                    Ok(event) => metrics.set_available(event.available()),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("设备池事件积压，跳过 {} 条，重新统计可用数量", skipped);
                        metrics.set_available(pool.available_count(None).await);
                    }
                    Err(RecvError::Closed) => {
                        debug!("设备池事件通道已关闭");
                        break;
                    }
                }
            }
        });

        Self { handle }
    }
}

impl Drop for AvailabilityGauge {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
