use std::sync::Arc;
use tracing::{error, info};

use fleet_rs::api;
use fleet_rs::config::FleetConfig;
use fleet_rs::context::{Context, IContext};
use fleet_rs::logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("FLEET_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = FleetConfig::from_file_with_env(&config_path)?;

    // 初始化日志系统
    let _log_guard = logger::init_logging(&config.logging)?;

    info!("启动设备租约服务，配置文件: {}", config_path);

    let ctx = Arc::new(Context::new(&config)?);

    let api_server = api::ApiServer::new(Arc::clone(&ctx) as Arc<dyn IContext + Sync + Send>);
    if let Err(e) = api_server.run(&config.server.bind_addr()).await {
        error!("API 服务器运行失败: {:?}", e);
    }

    ctx.shutdown().await;
    info!("服务已退出");
    Ok(())
}
