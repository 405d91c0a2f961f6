//! # 应用配置结构定义

use super::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 服务配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 令牌配置
    pub tokens: TokenConfig,
    /// 会话与 Cookie 配置
    pub session: SessionConfig,
    /// 登录 state / 会话的存储后端
    pub state_store: StateStoreConfig,
    /// 出站 HTTP 客户端配置
    pub http_client: HttpClientConfig,
    /// 回调地址前缀（`APP_ROOT`），用于推导默认 redirect_uri
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_root: Option<String>,
    /// 登录提供商，键为提供商标识（yandex、google、github ...）
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 允许的跨域来源，空表示不限制
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 令牌配置：访问令牌与刷新令牌使用相互独立的密钥
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// 访问令牌签名密钥
    pub access_secret: String,
    /// 刷新令牌签名密钥
    pub refresh_secret: String,
    /// 访问令牌有效期（秒）
    pub access_ttl: u64,
    /// 刷新令牌有效期（秒）
    pub refresh_ttl: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl: 30 * 60,
            refresh_ttl: 30 * 24 * 60 * 60,
        }
    }
}

/// 刷新令牌交付方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBinding {
    /// 写入 HttpOnly Cookie
    #[default]
    Cookie,
    /// 在响应体中返回给调用方
    Opaque,
}

/// 会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 会话 Cookie 名称
    pub cookie_name: String,
    /// Cookie 是否带 Secure
    pub secure: bool,
    /// 默认交付方式
    pub binding: SessionBinding,
    /// 旧刷新令牌被重放时吊销整条会话链
    pub revoke_chain_on_reuse: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "warden_session".to_string(),
            secure: true,
            binding: SessionBinding::Cookie,
            revoke_chain_on_reuse: true,
        }
    }
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// 进程内存
    #[default]
    Memory,
    /// Redis
    Redis,
}

/// 登录 state 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateStoreConfig {
    /// 后端类型
    pub backend: StoreBackend,
    /// state 有效期（秒）
    pub ttl: u64,
    /// Redis 连接 URL（backend = redis 时使用）
    pub redis_url: String,
    /// Redis 键前缀
    pub key_prefix: String,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ttl: 600,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            key_prefix: "warden".to_string(),
        }
    }
}

/// 出站 HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// 请求超时（秒）
    pub timeout: u64,
    /// User-Agent
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: 15,
            user_agent: concat!("warden-auth/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// 单个登录提供商配置
///
/// 内置 yandex / google / github 的端点预设，其它提供商必须显式给出端点。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// 是否启用
    pub enabled: Option<bool>,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret（公开客户端可为空）
    pub client_secret: Option<String>,
    /// 授权端点
    pub auth_url: Option<String>,
    /// 令牌端点
    pub token_url: Option<String>,
    /// 用户信息端点
    pub userinfo_url: Option<String>,
    /// 申请的权限
    pub scopes: Option<Vec<String>>,
    /// 回调地址，缺省由 `app_root` 推导
    pub redirect_uri: Option<String>,
    /// 展示名称
    pub display_name: Option<String>,
    /// 图标（不透明字符串，URL 或 data URI）
    pub icon: Option<String>,
    /// 资料映射方式（yandex/google/github/default），缺省按提供商键推断
    pub normalizer: Option<String>,
    /// 用户信息请求的 Authorization 方案（Bearer 或 OAuth）
    pub userinfo_auth_scheme: Option<String>,
}

impl ProviderConfig {
    /// 未显式关闭即视为启用
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}
