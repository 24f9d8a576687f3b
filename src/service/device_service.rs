//! 设备服务
//!
//! 将设备池操作映射为请求/响应消息和状态订阅，本身不包含预约逻辑。

use super::types::{
    DeviceStatusMessage, ReleaseRequest, ReleaseResponse, ReserveRequest, ReserveResponse,
    STATUS_NOT_FOUND, STATUS_NO_DEVICES, STATUS_RELEASED, STATUS_RESERVED,
};
use super::gauge::AvailabilityGauge;
use super::watch::{WatchSink, WatchSubscription};
use crate::config::ServiceConfig;
use crate::metrics::{PoolMetrics, ReservationOutcome};
use crate::pool::DevicePool;
use std::sync::Arc;
use tracing::info;

/// 设备服务
pub struct DeviceService {
    pool: Arc<DevicePool>,
    metrics: Arc<dyn PoolMetrics>,
    config: ServiceConfig,
    _gauge: AvailabilityGauge,
}

impl DeviceService {
    /// 创建新的设备服务
    ///
    /// 会启动可用设备数量的指标更新任务，需要在 tokio 运行时内调用。
    pub fn new(pool: Arc<DevicePool>, metrics: Arc<dyn PoolMetrics>, config: ServiceConfig) -> Self {
        let gauge = AvailabilityGauge::spawn(Arc::clone(&pool), Arc::clone(&metrics));
        Self {
            pool,
            metrics,
            config,
            _gauge: gauge,
        }
    }

    /// 底层设备池
    pub fn pool(&self) -> &Arc<DevicePool> {
        &self.pool
    }

    /// 预约设备，租约时长由服务端配置决定
    pub async fn reserve_device(&self, req: ReserveRequest) -> ReserveResponse {
        let device_type = if req.device_type.is_empty() {
            self.config.default_device_type.as_str()
        } else {
            req.device_type.as_str()
        };

        let reserved = self
            .pool
            .reserve(&req.user, device_type, self.config.reservation_ttl())
            .await;

        match reserved {
            Some(device) => {
                self.metrics.record_reservation(ReservationOutcome::Success);
                info!(user = %req.user, device_id = %device.id, "预约设备成功");
                ReserveResponse {
                    device_id: device.id,
                    status: STATUS_RESERVED.to_string(),
                }
            }
            None => {
                self.metrics.record_reservation(ReservationOutcome::Failure);
                info!(user = %req.user, device_type = %device_type, "预约设备失败: 没有可用设备");
                ReserveResponse {
                    device_id: String::new(),
                    status: STATUS_NO_DEVICES.to_string(),
                }
            }
        }
    }

    /// 释放设备
    pub async fn release_device(&self, req: ReleaseRequest) -> ReleaseResponse {
        let released = self.pool.release(&req.device_id).await;

        let status = if released { STATUS_RELEASED } else { STATUS_NOT_FOUND };
        info!(device_id = %req.device_id, status = %status, "释放设备");

        ReleaseResponse {
            status: status.to_string(),
        }
    }

    /// 一次性获取全部设备状态
    pub async fn list_devices(&self) -> Vec<DeviceStatusMessage> {
        self.pool
            .snapshot()
            .await
            .into_iter()
            .map(DeviceStatusMessage::from)
            .collect()
    }

    /// 订阅设备状态，按配置的间隔持续推送
    pub fn watch_devices<S>(&self, sink: S) -> WatchSubscription
    where
        S: WatchSink + 'static,
    {
        WatchSubscription::spawn(
            Arc::clone(&self.pool),
            sink,
            self.config.watch_interval(),
            Arc::clone(&self.metrics),
        )
    }
}
