//! # Warden Auth 主程序
//!
//! 加载配置、连接数据库并执行迁移，然后启动 HTTP 服务。

use clap::Parser;
use std::path::PathBuf;

use warden_auth::{
    Result,
    app::AppContext,
    config::ConfigManager,
    database::{init_database, run_migrations},
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    server::HttpServer,
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "warden-auth", version, about = "OAuth2 + PKCE 登录与令牌服务")]
struct Cli {
    /// 配置文件路径（缺省读取 WARDEN_CONFIG_PATH 或 config/config.{RUST_ENV}.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别（RUST_LOG 优先）
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    if let Err(e) = run(cli).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            "服务启动失败",
            error = ?e
        );
        return Err(e);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config_manager = match cli.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    let config = config_manager.get_config();

    let db = init_database(&config.database).await?;
    if config.database.auto_migrate {
        run_migrations(&db).await?;
    }

    let context = AppContext::build(config, Some(db)).await?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动",
        config_path = %config_manager.config_path().display()
    );
    HttpServer::new(context).serve().await
}
