//! 指标模块
//!
//! 服务层通过 [`PoolMetrics`] 上报预约结果和可用设备数量，
//! 具体实现在启动时创建并注入，不使用全局状态。
//! [`FleetMetrics`] 以 Prometheus 文本格式输出，供 `/metrics` 抓取。

use metriken::{Counter, Gauge};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// 预约结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationOutcome {
    Success,
    Failure,
}

impl ReservationOutcome {
    fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// 设备池指标收集接口
pub trait PoolMetrics: Send + Sync {
    /// 记录一次预约尝试
    fn record_reservation(&self, outcome: ReservationOutcome);

    /// 更新可用设备数量
    fn set_available(&self, count: usize);

    /// 新的订阅建立
    fn watch_opened(&self) {}

    /// 订阅结束
    fn watch_closed(&self) {}
}

/// 指标快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub reservations_success: u64,
    pub reservations_failure: u64,
    pub devices_available: u64,
    pub active_watches: u64,
}

/// Prometheus 文本格式的 Content-Type
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// 进程内指标实现
///
/// 每个实例持有自己的计数器，多个实例互不影响。
pub struct FleetMetrics {
    reservations_success: Counter,
    reservations_failure: Counter,
    devices_available: Gauge,
    active_watches: Gauge,
}

impl Default for FleetMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetMetrics {
    pub const fn new() -> Self {
        Self {
            reservations_success: Counter::new(),
            reservations_failure: Counter::new(),
            devices_available: Gauge::new(),
            active_watches: Gauge::new(),
        }
    }

    fn reservations(&self, outcome: ReservationOutcome) -> &Counter {
        match outcome {
            ReservationOutcome::Success => &self.reservations_success,
            ReservationOutcome::Failure => &self.reservations_failure,
        }
    }

    /// 读取当前指标
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reservations_success: self.reservations_success.value(),
            reservations_failure: self.reservations_failure.value(),
            devices_available: self.devices_available.value().max(0) as u64,
            active_watches: self.active_watches.value().max(0) as u64,
        }
    }

    /// 以 Prometheus 文本格式输出全部指标
    pub fn render_prometheus(&self) -> String {
        let mut output = String::with_capacity(512);

        let _ = writeln!(output, "# HELP fleet_reservations_total Reservation attempts by outcome");
        let _ = writeln!(output, "# TYPE fleet_reservations_total counter");
        for outcome in [ReservationOutcome::Success, ReservationOutcome::Failure] {
            let _ = writeln!(
                output,
                "fleet_reservations_total{{outcome=\"{}\"}} {}",
                outcome.label(),
                self.reservations(outcome).value()
            );
        }

        let gauges = [
            ("fleet_devices_available", "Devices currently available", &self.devices_available),
            ("fleet_active_watches", "Open status subscriptions", &self.active_watches),
        ];
        for (name, help, gauge) in gauges {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} gauge", name);
            let _ = writeln!(output, "{} {}", name, gauge.value());
        }

        output
    }
}

impl PoolMetrics for FleetMetrics {
    #[inline]
    fn record_reservation(&self, outcome: ReservationOutcome) {
        self.reservations(outcome).increment();
    }

    #[inline]
    fn set_available(&self, count: usize) {
        self.devices_available.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    #[inline]
    fn watch_opened(&self) {
        self.active_watches.increment();
    }

    #[inline]
    fn watch_closed(&self) {
        self.active_watches.decrement();
    }
}
