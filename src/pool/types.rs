//! 设备池相关的类型定义

use crate::pool::device_entry::DeviceEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 设备快照：某一时刻的设备副本及其派生的可用状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub device: DeviceEntry,
    pub available: bool,
}

/// 设备池事件
///
/// 在写锁内发送，接收顺序与变更顺序一致。`available` 为本次变更后的可用设备总数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevicePoolEvent {
    /// 设备被预约
    Reserved {
        device_id: String,
        reserved_by: String,
        expires_at: DateTime<Utc>,
        available: usize,
    },

    /// 设备被主动释放
    Released { device_id: String, available: usize },

    /// 租约过期被清理
    Expired {
        device_id: String,
        reserved_by: String,
        available: usize,
    },
}

impl DevicePoolEvent {
    /// 变更后的可用设备总数
    pub fn available(&self) -> usize {
        match self {
            Self::Reserved { available, .. }
            | Self::Released { available, .. }
            | Self::Expired { available, .. } => *available,
        }
    }
}

/// 设备池错误（仅在构建时出现）
#[derive(Debug, thiserror::Error)]
pub enum DevicePoolError {
    #[error("设备类型重复: {0}")]
    DuplicateDeviceType(String),

    #[error("设备类型不能为空")]
    EmptyDeviceType,
}
