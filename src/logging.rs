//! # 日志配置模块
//!
//! tracing 订阅器初始化，以及带阶段/组件标签的结构化日志宏。
//!
//! 约定：令牌与密钥绝不直接写入日志，只允许使用 [`token_fingerprint`] 生成的短指纹。

use sha2::{Digest, Sha256};
use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志所处的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 启动
    Startup,
    /// 关闭
    Shutdown,
    /// 配置加载与校验
    Configuration,
    /// 请求进入
    RequestStart,
    /// 令牌校验
    Authentication,
    /// 生成授权地址
    Authorize,
    /// 授权码交换
    Exchange,
    /// 身份解析
    IdentityResolve,
    /// 签发令牌
    TokenIssue,
    /// 刷新令牌轮换
    Refresh,
    /// 登出
    Logout,
    /// 状态/会话存储
    Cache,
    /// 数据库
    Db,
    /// 外部 API 调用
    ExternalApi,
    /// 响应
    Response,
    /// 错误
    Error,
}

impl LogStage {
    /// 日志字段中使用的名称
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::RequestStart => "request_start",
            Self::Authentication => "authentication",
            Self::Authorize => "authorize",
            Self::Exchange => "exchange",
            Self::IdentityResolve => "identity_resolve",
            Self::TokenIssue => "token_issue",
            Self::Refresh => "refresh",
            Self::Logout => "logout",
            Self::Cache => "cache",
            Self::Db => "db",
            Self::ExternalApi => "external_api",
            Self::Response => "response",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 进程入口
    Main,
    /// HTTP 服务装配
    ServerSetup,
    /// 配置管理
    Config,
    /// OAuth 提供商客户端
    OAuth,
    /// 提供商注册表
    ProviderRegistry,
    /// 登录 state 存储
    StateStore,
    /// 会话存储
    SessionStore,
    /// 令牌服务
    TokenService,
    /// 登录编排
    LoginService,
    /// 身份仓库
    Identity,
    /// 数据库
    Database,
    /// KV 存储
    Cache,
    /// 中间件
    Middleware,
    /// 请求处理器
    Handler,
}

impl LogComponent {
    /// 日志字段中使用的名称
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::ServerSetup => "server_setup",
            Self::Config => "config",
            Self::OAuth => "oauth",
            Self::ProviderRegistry => "provider_registry",
            Self::StateStore => "state_store",
            Self::SessionStore => "session_store",
            Self::TokenService => "token_service",
            Self::LoginService => "login_service",
            Self::Identity => "identity",
            Self::Database => "database",
            Self::Cache => "cache",
            Self::Middleware => "middleware",
            Self::Handler => "handler",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 info 日志
///
/// `linfo!(request_id, LogStage, LogComponent, "operation", "描述", key = value, ...)`
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($fields:tt)*)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($fields)*,)?
            "{}", $description
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($fields:tt)*)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($fields)*,)?
            "{}", $description
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($fields:tt)*)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($fields)*,)?
            "{}", $description
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($fields:tt)*)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($fields)*,)?
            "{}", $description
        )
    };
}

/// 令牌/state 的日志指纹：SHA-256 的前 8 个十六进制字符
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..4])
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先；否则使用传入级别并压低 sqlx/sea-orm 的查询日志。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");

    let default_filter = format!("{level},warden_auth=debug,sqlx::query=off,sea_orm::query=warn,sqlx=warn");

    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    // 重复初始化（例如测试中）时忽略错误
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let a = token_fingerprint("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        let b = token_fingerprint("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_ne!(a, token_fingerprint("other"));
    }

    #[test]
    fn test_stage_and_component_names() {
        assert_eq!(LogStage::IdentityResolve.to_string(), "identity_resolve");
        assert_eq!(LogComponent::StateStore.to_string(), "state_store");
    }
}
