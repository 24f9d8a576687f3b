//! 设备池模块
//!
//! 提供固定容量的设备租约管理：预约、释放、快照以及过期清理

mod device_entry;
mod device_pool;
mod sweeper;
mod types;

pub use device_entry::DeviceEntry;
pub use device_pool::DevicePool;
pub use sweeper::ExpirySweeper;
pub use types::{
    DevicePoolError,
    DevicePoolEvent,
    DeviceSnapshot,
};
