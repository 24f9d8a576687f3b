use std::ops::ControlFlow;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;

use fleet_rs::client::{format_status, FleetClient};
use fleet_rs::logger;

/// 设备租约服务命令行客户端
#[derive(Parser, Debug)]
#[command(name = "fleet-client")]
#[command(about = "Reserve, release and watch devices")]
struct Cli {
    /// 服务地址
    #[arg(long, env = "FLEET_SERVER", default_value = "http://localhost:8080")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 预约一台设备
    Reserve {
        #[arg(long)]
        user: String,

        #[arg(long = "type", default_value = "iphone")]
        device_type: String,
    },

    /// 释放设备
    Release {
        #[arg(long)]
        device_id: String,
    },

    /// 持续输出设备状态，Ctrl+C 退出
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logger::init_cli_logging() {
        eprintln!("初始化日志失败: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> fleet_rs::error::Result<()> {
    let client = FleetClient::new(&cli.server)?;
    debug!("服务地址: {}", cli.server);

    match cli.command {
        Command::Reserve { user, device_type } => {
            let resp = client.reserve(&user, &device_type).await?;
            if resp.device_id.is_empty() {
                println!("failed: {}", resp.status);
            } else {
                println!("reserved: {}", resp.device_id);
            }
        }
        Command::Release { device_id } => {
            let resp = client.release(&device_id).await?;
            println!("released: {} ({})", device_id, resp.status);
        }
        Command::Watch => {
            println!("watching devices (ctrl+c to stop)");
            tokio::select! {
                result = client.watch(|message| {
                    println!("{}", format_status(&message));
                    ControlFlow::Continue(())
                }) => result?,
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }

    Ok(())
}
