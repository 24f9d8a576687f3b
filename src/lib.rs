//! 设备租约服务
//!
//! 固定容量的设备池：调用方按租约借出设备，到期自动回收，
//! 并可通过订阅流持续观察设备状态。

pub mod api;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod pool;
pub mod service;
