//! 设备服务模块
//!
//! 预约/释放的请求响应映射，以及设备状态订阅

mod device_service;
mod gauge;
mod types;
mod watch;

pub use device_service::DeviceService;
pub use types::{
    DeviceStatusMessage,
    DEVICE_EVENT,
    ReleaseRequest,
    ReleaseResponse,
    ReserveRequest,
    ReserveResponse,
    STATUS_NOT_FOUND,
    STATUS_NO_DEVICES,
    STATUS_RELEASED,
    STATUS_RESERVED,
};
pub use watch::{WatchClosed, WatchSink, WatchSubscription};
