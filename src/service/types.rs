//! 服务层请求与响应类型

use crate::pool::DeviceSnapshot;
use serde::{Deserialize, Serialize};

/// 预约成功
pub const STATUS_RESERVED: &str = "reserved";
/// 没有可用设备
pub const STATUS_NO_DEVICES: &str = "no devices available";
/// 释放成功
pub const STATUS_RELEASED: &str = "released";
/// 设备不存在或本就可用
pub const STATUS_NOT_FOUND: &str = "not found or already available";

/// 订阅流中设备状态事件的名称
pub const DEVICE_EVENT: &str = "device";

/// 预约请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub user: String,
    /// 为空时使用默认设备类型
    #[serde(default)]
    pub device_type: String,
}

/// 预约响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveResponse {
    pub device_id: String,
    pub status: String,
}

/// 释放请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub device_id: String,
}

/// 释放响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub status: String,
}

/// 推送给订阅者的单台设备状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatusMessage {
    pub device_id: String,
    pub reserved_by: String,
    pub available: bool,
}

impl From<DeviceSnapshot> for DeviceStatusMessage {
    fn from(snapshot: DeviceSnapshot) -> Self {
        Self {
            device_id: snapshot.device.id,
            reserved_by: snapshot.device.reserved_by.unwrap_or_default(),
            available: snapshot.available,
        }
    }
}
