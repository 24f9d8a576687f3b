use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 服务监听配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// 监听地址，形如 `0.0.0.0:8080`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 一组同类型设备
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGroupConfig {
    pub device_type: String,
    pub count: usize,
}

/// 设备池配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 设备分组，按顺序构建
    pub groups: Vec<DeviceGroupConfig>,

    /// 过期清理间隔（秒）
    pub sweep_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            groups: vec![DeviceGroupConfig {
                device_type: "iphone".to_string(),
                count: 10,
            }],
            sweep_interval_secs: 60,
        }
    }
}

impl PoolConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// 服务层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// 请求未指定类型时使用的默认设备类型
    pub default_device_type: String,

    /// 服务端固定的租约时长（秒）
    pub reservation_ttl_secs: u64,

    /// 订阅推送间隔（毫秒）
    pub watch_interval_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_device_type: "iphone".to_string(),
            reservation_ttl_secs: 120, // 2 分钟
            watch_interval_ms: 1000,
        }
    }
}

impl ServiceConfig {
    /// 租约时长，超出可表示范围时取最大值
    pub fn reservation_ttl(&self) -> chrono::Duration {
        i64::try_from(self.reservation_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 默认日志级别，RUST_LOG 存在时以其为准
    pub level: String,

    /// 日志文件目录，为空则只输出到终端
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// 完整的服务配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

impl FleetConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml_str(&content)
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FleetConfig = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// 从文件加载（文件不存在时使用默认值），并使用环境变量覆盖
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = if path.as_ref().exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        if let Ok(host) = std::env::var("FLEET_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("FLEET_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("无效的端口: {}", port)))?;
        }

        if let Ok(level) = std::env::var("FLEET_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.groups.is_empty() {
            return Err(ConfigError::ValidationError("设备池至少需要一组设备".to_string()));
        }
        if let Some(group) = self.pool.groups.iter().find(|g| g.count == 0) {
            return Err(ConfigError::ValidationError(format!(
                "设备组 {} 的数量不能为 0",
                group.device_type
            )));
        }
        if self.pool.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError("清理间隔不能为 0".to_string()));
        }
        if self.service.watch_interval_ms == 0 {
            return Err(ConfigError::ValidationError("推送间隔不能为 0".to_string()));
        }
        Ok(())
    }
}

/// 配置错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO 错误: {0}")]
    IoError(String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("验证错误: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FleetConfig::default();
        assert_eq!(config.service.default_device_type, "iphone");
        assert_eq!(config.service.reservation_ttl(), chrono::Duration::minutes(2));
        assert_eq!(config.service.watch_interval(), Duration::from_secs(1));
        assert_eq!(config.pool.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.pool.groups[0].count, 10);
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FleetConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [[pool.groups]]
            device_type = "pixel"
            count = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.pool.groups.len(), 1);
        assert_eq!(config.pool.groups[0].device_type, "pixel");
        assert_eq!(config.pool.sweep_interval_secs, 60);
        assert_eq!(config.service.reservation_ttl_secs, 120);
    }

    #[test]
    fn test_rejects_zero_count() {
        let result = FleetConfig::from_toml_str(
            r#"
            [[pool.groups]]
            device_type = "pixel"
            count = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let config = ServiceConfig {
            reservation_ttl_secs: u64::MAX,
            ..ServiceConfig::default()
        };
        assert_eq!(config.reservation_ttl(), chrono::Duration::MAX);

        let config = ServiceConfig {
            reservation_ttl_secs: i64::MAX as u64 / 1000 + 1,
            ..ServiceConfig::default()
        };
        assert_eq!(config.reservation_ttl(), chrono::Duration::MAX);
    }

    #[test]
    fn test_serialize_config() {
        let config = FleetConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = FleetConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.pool.groups, config.pool.groups);
    }
}
