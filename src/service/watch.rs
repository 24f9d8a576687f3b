//! 设备状态订阅
//!
//! 每个订阅者一个任务：按固定间隔读取设备池快照，逐台推送状态。
//! 订阅被取消或对端断开时正常结束；发送失败时以错误结束，不重试。

use super::types::DeviceStatusMessage;
use crate::error::{AppError, Result};
use crate::metrics::PoolMetrics;
use crate::pool::DevicePool;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 订阅推送目标
#[async_trait]
pub trait WatchSink: Send + Sync {
    /// 发送一条状态消息
    async fn send(&self, message: DeviceStatusMessage) -> Result<()>;

    /// 对端断开时完成
    async fn closed(&self);
}

#[async_trait]
impl WatchSink for mpsc::Sender<DeviceStatusMessage> {
    async fn send(&self, message: DeviceStatusMessage) -> Result<()> {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|e| AppError::StreamSend(e.to_string()))
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await
    }
}

/// 订阅正常结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchClosed {
    /// 订阅被取消
    Cancelled,
    /// 订阅者断开
    Disconnected,
}

enum WatchEvent {
    Closed(WatchClosed),
    Tick,
}

/// 订阅句柄
///
/// drop 句柄等同于取消订阅。
pub struct WatchSubscription {
    id: Uuid,
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<WatchClosed>>,
}

impl WatchSubscription {
    /// 启动订阅任务
    pub(crate) fn spawn<S>(
        pool: Arc<DevicePool>,
        sink: S,
        interval: Duration,
        metrics: Arc<dyn PoolMetrics>,
    ) -> Self
    where
        S: WatchSink + 'static,
    {
        let id = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            metrics.watch_opened();
            info!(subscription_id = %id, "订阅已建立");

            let result = run_watch(id, pool, sink, interval, cancel_rx).await;

            match &result {
                Ok(reason) => info!(subscription_id = %id, ?reason, "订阅已结束"),
                Err(e) => warn!(subscription_id = %id, error = %e, "订阅因发送失败结束"),
            }
            metrics.watch_closed();
            result
        });

        Self { id, cancel_tx, handle }
    }

    /// 订阅 ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 取消订阅
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// 等待订阅结束并返回结束原因
    pub async fn join(self) -> Result<WatchClosed> {
        let Self { cancel_tx, handle, .. } = self;
        let result = handle
            .await
            .map_err(|e| AppError::Unknown(format!("订阅任务异常退出: {}", e)))?;
        drop(cancel_tx);
        result
    }
}

async fn run_watch<S: WatchSink>(
    id: Uuid,
    pool: Arc<DevicePool>,
    sink: S,
    interval: Duration,
    mut cancel_rx: watch::Receiver<bool>,
) -> Result<WatchClosed> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick: u64 = 0;

    loop {
        // 句柄被 drop 时 changed() 返回 Err，同样视为取消
        let event = tokio::select! {
            biased;
            _ = cancel_rx.changed() => WatchEvent::Closed(WatchClosed::Cancelled),
            _ = sink.closed() => WatchEvent::Closed(WatchClosed::Disconnected),
            _ = ticker.tick() => WatchEvent::Tick,
        };

        if let WatchEvent::Closed(reason) = event {
            return Ok(reason);
        }

        // 快照返回后锁已释放，发送期间不持锁
        let batch = pool.snapshot().await;
        let sent = tokio::select! {
            biased;
            _ = cancel_rx.changed() => return Ok(WatchClosed::Cancelled),
            sent = send_batch(&sink, batch.into_iter().map(DeviceStatusMessage::from)) => sent,
        };
        sent?;

        tick += 1;
        debug!(subscription_id = %id, tick, "已推送设备状态");
    }
}

async fn send_batch<S, I>(sink: &S, messages: I) -> Result<()>
where
    S: WatchSink,
    I: IntoIterator<Item = DeviceStatusMessage>,
{
    for message in messages {
        sink.send(message).await?;
    }
    Ok(())
}
