//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod database;
mod manager;

pub use app_config::{
    AppConfig, HttpClientConfig, ProviderConfig, ServerConfig, SessionBinding, SessionConfig,
    StateStoreConfig, StoreBackend, TokenConfig,
};
pub use database::DatabaseConfig;
pub use manager::ConfigManager;

use crate::error::{AuthError, Result};

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.server.port == 0 {
        return Err(AuthError::config("无效的服务器端口: 0"));
    }

    if config.database.url.is_empty() {
        return Err(AuthError::config("数据库URL不能为空"));
    }

    if config.database.max_connections == 0 {
        return Err(AuthError::config("数据库最大连接数必须大于0"));
    }

    validate_tokens(&config.tokens)?;

    if config.state_store.ttl == 0 {
        return Err(AuthError::config("state 有效期必须大于0"));
    }

    if config.state_store.backend == StoreBackend::Redis && config.state_store.redis_url.is_empty() {
        return Err(AuthError::config("Redis URL不能为空"));
    }

    if config.http_client.timeout == 0 {
        return Err(AuthError::config("HTTP 客户端超时必须大于0"));
    }

    if config.session.cookie_name.is_empty() {
        return Err(AuthError::config("会话 Cookie 名称不能为空"));
    }

    for (key, provider) in &config.providers {
        if provider.is_enabled() && provider.client_id.trim().is_empty() {
            return Err(AuthError::config(format!("提供商 {key} 缺少 client_id")));
        }
    }

    Ok(())
}

/// 令牌配置校验：密钥非空且互不相同，访问令牌有效期严格短于刷新令牌
pub fn validate_tokens(tokens: &TokenConfig) -> Result<()> {
    if tokens.access_secret.is_empty() || tokens.refresh_secret.is_empty() {
        return Err(AuthError::config("访问令牌与刷新令牌密钥均不能为空"));
    }

    if tokens.access_secret == tokens.refresh_secret {
        return Err(AuthError::config("访问令牌与刷新令牌必须使用不同的密钥"));
    }

    if tokens.access_ttl == 0 {
        return Err(AuthError::config("访问令牌有效期必须大于0"));
    }

    if tokens.access_ttl >= tokens.refresh_ttl {
        return Err(AuthError::config(format!(
            "访问令牌有效期({}s)必须短于刷新令牌有效期({}s)",
            tokens.access_ttl, tokens.refresh_ttl
        )));
    }

    Ok(())
}
