//! # 数据库模块
//!
//! 数据库连接和迁移管理

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{lerror, linfo, lwarn};

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    config.ensure_database_path()?;

    let mut options = ConnectOptions::new(config.connection_url());
    // 内存 SQLite 每个连接是独立的库，只能使用单连接
    let max_connections = if config.is_memory() { 1 } else { config.max_connections };
    options
        .max_connections(max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .map_err(|e| AuthError::database_with_source("数据库连接失败", e))?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "db_connected",
        "数据库连接成功",
        memory = config.is_memory(),
        max_connections = max_connections
    );
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    let pending = ::migration::Migrator::get_pending_migrations(db)
        .await
        .map_err(|e| AuthError::database_with_source("读取迁移状态失败", e))?;
    if pending.is_empty() {
        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Database,
            "migrations_up_to_date",
            "所有迁移都已应用"
        );
        return Ok(());
    }

    lwarn!(
        "system",
        LogStage::Db,
        LogComponent::Database,
        "migrations_pending",
        "存在待应用的迁移",
        count = pending.len()
    );

    if let Err(e) = ::migration::Migrator::up(db, None).await {
        lerror!(
            "system",
            LogStage::Db,
            LogComponent::Database,
            "migrations_failed",
            "数据库迁移失败",
            error = %e
        );
        return Err(AuthError::database_with_source("数据库迁移失败", e));
    }

    linfo!(
        "system",
        LogStage::Db,
        LogComponent::Database,
        "migrations_applied",
        "数据库迁移完成"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, Statement};

    #[tokio::test]
    async fn test_memory_database_migrates() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        let db = init_database(&config).await.unwrap();
        run_migrations(&db).await.unwrap();
        // 第二次运行无待应用迁移
        run_migrations(&db).await.unwrap();

        let row = db
            .query_one(Statement::from_string(
                db.get_database_backend(),
                "SELECT COUNT(*) AS n FROM user_auth_providers",
            ))
            .await
            .unwrap()
            .unwrap();
        let n: i64 = row.try_get("", "n").unwrap();
        assert_eq!(n, 0);
    }
}
