//! 应用上下文（DI 容器）
//!
//! 统一持有跨模块共享的服务实例，便于在测试中注入替身实现。

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::{DbIdentityRepository, IdentityRepository, LoginService, MemoryIdentityRepository};
use crate::cache::{KvStore, build_store};
use crate::config::AppConfig;
use crate::error::Result;
use crate::linfo;
use crate::logging::{LogComponent, LogStage};

/// 共享服务集合
pub struct AppContext {
    /// 应用配置
    pub config: Arc<AppConfig>,
    /// state 与会话存储
    pub store: Arc<dyn KvStore>,
    /// 登录编排服务
    pub login: Arc<LoginService>,
}

impl AppContext {
    /// 由已构建的服务组装
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn KvStore>, login: Arc<LoginService>) -> Self {
        Self {
            config,
            store,
            login,
        }
    }

    /// 按配置构建全部服务；没有数据库连接时身份保存在内存中
    pub async fn build(config: Arc<AppConfig>, db: Option<DatabaseConnection>) -> Result<Arc<Self>> {
        let store = build_store(&config.state_store).await?;
        let identities: Arc<dyn IdentityRepository> = match db {
            Some(db) => Arc::new(DbIdentityRepository::new(db)),
            None => Arc::new(MemoryIdentityRepository::new()),
        };

        Self::with_parts(config, store, identities)
    }

    /// 用给定的存储与身份仓库构建
    pub fn with_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn KvStore>,
        identities: Arc<dyn IdentityRepository>,
    ) -> Result<Arc<Self>> {
        let login = LoginService::from_config(&config, Arc::clone(&store), identities)?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "context_ready",
            "应用上下文已构建",
            store_backend = store.backend_name(),
            providers = login.registry().len()
        );
        Ok(Arc::new(Self::new(config, store, Arc::new(login))))
    }
}
