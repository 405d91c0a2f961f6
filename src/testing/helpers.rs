//! # 测试辅助函数
//!
//! 提供通用的测试工具和辅助函数

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tracing::Level;

use crate::app::AppContext;
use crate::auth::{IdentityRepository, MemoryIdentityRepository};
use crate::cache::MemoryKvStore;
use crate::config::{AppConfig, DatabaseConfig};
use crate::database::{init_database, run_migrations};
use crate::error::{AuthError, Result};
use crate::server::{AppState, build_router};

static INIT: Once = Once::new();

/// 初始化测试环境
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 创建已迁移的内存数据库连接
pub async fn create_test_db() -> Result<DatabaseConnection> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    let db = init_database(&config).await?;
    run_migrations(&db).await?;
    Ok(db)
}

/// 创建临时数据库文件，`TempDir` 需在测试期间保持存活
pub async fn create_temp_db() -> Result<(DatabaseConnection, TempDir)> {
    let temp_dir =
        tempfile::tempdir().map_err(|e| AuthError::internal_with_source("创建临时目录失败", e))?;

    let config = DatabaseConfig {
        url: format!("sqlite://{}", temp_dir.path().join("test.db").display()),
        max_connections: 1,
        ..DatabaseConfig::default()
    };
    let db = init_database(&config).await?;
    run_migrations(&db).await?;
    Ok((db, temp_dir))
}

/// 用内存存储构建应用上下文
pub fn build_test_context(config: AppConfig) -> Result<Arc<AppContext>> {
    let identities: Arc<dyn IdentityRepository> = Arc::new(MemoryIdentityRepository::new());
    build_test_context_with(config, identities)
}

/// 用给定身份仓库构建应用上下文
pub fn build_test_context_with(
    config: AppConfig,
    identities: Arc<dyn IdentityRepository>,
) -> Result<Arc<AppContext>> {
    AppContext::with_parts(Arc::new(config), Arc::new(MemoryKvStore::new()), identities)
}

/// 构建完整路由（含中间件）
pub fn test_router(context: Arc<AppContext>) -> Router {
    build_router(AppState::new(context))
}
