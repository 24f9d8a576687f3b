//! 设备条目实现
//!
//! 表示池中的单个设备及其租约状态

use crate::pool::types::DeviceSnapshot;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 设备条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// 设备 ID，形如 `iphone-0`
    pub id: String,

    /// 设备类型
    pub device_type: String,

    /// 当前租约持有者
    pub reserved_by: Option<String>,

    /// 租约开始时间
    pub reserved_at: Option<DateTime<Utc>>,

    /// 租约到期时间
    pub expires_at: Option<DateTime<Utc>>,
}

impl DeviceEntry {
    /// 创建新的空闲设备条目
    pub fn new(id: String, device_type: String) -> Self {
        Self {
            id,
            device_type,
            reserved_by: None,
            reserved_at: None,
            expires_at: None,
        }
    }

    /// 在给定时刻是否可用
    ///
    /// 没有持有者，或租约已到期（`now >= expires_at`）即视为可用。
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.reserved_by, self.expires_at) {
            (None, _) => true,
            (Some(_), Some(expires_at)) => now >= expires_at,
            (Some(_), None) => true,
        }
    }

    /// 当前是否可用
    pub fn is_available(&self) -> bool {
        self.is_available_at(Utc::now())
    }

    /// 持有者存在但租约已到期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.reserved_by.is_some() && self.is_available_at(now)
    }

    /// 开始租约
    ///
    /// 到期时间超出可表示范围时取边界值，不做 TTL 校验。
    pub fn lease(&mut self, holder: &str, now: DateTime<Utc>, ttl: Duration) {
        let expires_at = now.checked_add_signed(ttl).unwrap_or(if ttl < Duration::zero() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });

        self.reserved_by = Some(holder.to_string());
        self.reserved_at = Some(now);
        self.expires_at = Some(expires_at);
    }

    /// 清除租约
    pub fn clear(&mut self) {
        self.reserved_by = None;
        self.reserved_at = None;
        self.expires_at = None;
    }

    /// 按给定时刻生成快照
    pub fn to_snapshot(&self, now: DateTime<Utc>) -> DeviceSnapshot {
        DeviceSnapshot {
            available: self.is_available_at(now),
            device: self.clone(),
        }
    }
}
