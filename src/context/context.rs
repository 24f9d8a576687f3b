use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::FleetConfig;
use crate::error::Result;
use crate::metrics::{FleetMetrics, MetricsSnapshot};
use crate::pool::{DevicePool, ExpirySweeper};
use crate::service::DeviceService;

/// Context trait，定义获取服务实例的接口
pub trait IContext: Send + Sync {
    fn get_service(&self) -> &DeviceService;
    fn get_metrics(&self) -> MetricsSnapshot;

    /// Prometheus 文本格式的指标
    fn render_metrics(&self) -> String;
}

/// 线程安全的 Context，管理设备池、清理任务、指标和设备服务
pub struct Context {
    service: DeviceService,
    metrics: Arc<FleetMetrics>,
    sweeper: Mutex<Option<ExpirySweeper>>,
}

impl Context {
    /// 按配置创建 Context 并启动过期清理任务
    ///
    /// 需要在 tokio 运行时内调用。
    pub fn new(config: &FleetConfig) -> Result<Self> {
        let pool = Arc::new(DevicePool::with_groups(
            config
                .pool
                .groups
                .iter()
                .map(|g| (g.device_type.clone(), g.count)),
        )?);

        let metrics = Arc::new(FleetMetrics::new());

        let sweeper = ExpirySweeper::spawn(Arc::clone(&pool), config.pool.sweep_interval());
        let service = DeviceService::new(pool, metrics.clone(), config.service.clone());

        info!("Context 已创建");
        Ok(Context {
            service,
            metrics,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// 停止后台清理任务
    pub async fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.shutdown().await;
        }
    }
}

impl IContext for Context {
    fn get_service(&self) -> &DeviceService {
        &self.service
    }

    fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn render_metrics(&self) -> String {
        self.metrics.render_prometheus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceGroupConfig;

    #[tokio::test]
    async fn test_context_from_config() {
        let mut config = FleetConfig::default();
        config.pool.groups.push(DeviceGroupConfig {
            device_type: "pixel".to_string(),
            count: 2,
        });

        let ctx = Context::new(&config).unwrap();
        assert_eq!(ctx.get_service().pool().len().await, 12);

        // 初始值由指标更新任务写入
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while ctx.get_metrics().devices_available != 12 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("可用数量应为 12");
        assert!(ctx.render_metrics().contains("fleet_devices_available 12"));

        ctx.shutdown().await;
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_context_rejects_duplicate_types() {
        let mut config = FleetConfig::default();
        config.pool.groups.push(config.pool.groups[0].clone());
        assert!(Context::new(&config).is_err());
    }
}
