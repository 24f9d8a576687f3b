//! 配置模块
//!
//! 从 TOML 文件和环境变量加载服务配置

mod fleet_config;

pub use fleet_config::{
    ConfigError,
    DeviceGroupConfig,
    FleetConfig,
    LoggingConfig,
    PoolConfig,
    ServerConfig,
    ServiceConfig,
};
