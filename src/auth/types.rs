//! # 认证类型定义
//!
//! 令牌载荷、规范化资料、身份与绑定、登录 state 等数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 用户（身份）ID
pub type UserId = i32;

/// 令牌类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// 访问令牌
    Access,
    /// 刷新令牌
    Refresh,
}

impl TokenKind {
    /// 载荷中的 `token_type` 取值
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT 载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// 用户ID
    pub user_id: UserId,
    /// 令牌类型
    pub token_type: TokenKind,
    /// 过期时间（unix 秒）
    pub exp: i64,
    /// 签发时间（unix 秒）
    pub iat: i64,
    /// 令牌唯一ID
    pub jti: String,
    /// 会话（刷新链）ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

impl TokenClaims {
    /// 检查是否过期（无容差）
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// 提供商返回资料的规范化结果，每次登录产生，不落库
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// 提供商侧用户ID
    pub provider_id: String,
    /// 提供商标识
    pub provider_name: String,
    /// 邮箱
    pub email: String,
    /// 展示名
    pub name: String,
    /// 名
    pub first_name: String,
    /// 姓
    pub last_name: String,
    /// 头像
    pub avatar_url: String,
}

/// 规范化身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// 身份ID
    pub id: UserId,
    /// 展示名
    pub display_name: String,
    /// 邮箱
    pub email: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

/// 提供商账号到身份的绑定，`(provider_name, provider_uid)` 唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderBinding {
    /// 身份ID
    pub identity_id: UserId,
    /// 提供商标识
    pub provider_name: String,
    /// 提供商侧用户ID
    pub provider_uid: String,
    /// 提供商侧展示名
    pub name: String,
}

/// 登录 state 记录，单次消费
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginState {
    /// state 值
    pub state_token: String,
    /// 发起登录的提供商
    pub provider: String,
    /// 客户端提供的 code_challenge
    pub code_challenge: String,
    /// Challenge 方法
    pub code_challenge_method: String,
    /// 创建时间（unix 秒）
    pub created_at: i64,
    /// 有效期（秒）
    pub ttl: u64,
}

/// 授权地址及其 state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeUrl {
    /// 提供商授权地址
    pub auth_url: String,
    /// 本次登录的 state
    pub state: String,
}

/// 访问令牌 + 刷新令牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// 用户ID
    pub user_id: UserId,
    /// 访问令牌
    pub access_token: String,
    /// 刷新令牌
    pub refresh_token: String,
    /// 会话ID
    pub session_id: String,
    /// 访问令牌有效期（秒）
    pub access_expires_in: u64,
    /// 刷新令牌有效期（秒）
    pub refresh_expires_in: u64,
}

/// 请求作用域内的认证上下文，由认证中间件注入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// 用户ID
    pub user_id: UserId,
    /// 会话ID（随会话签发的访问令牌才有）
    pub session_id: Option<String>,
    /// 访问令牌ID
    pub token_id: String,
}

impl From<TokenClaims> for AuthContext {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            session_id: claims.sid,
            token_id: claims.jti,
        }
    }
}

/// 登录页展示的提供商信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// 提供商标识
    pub provider: String,
    /// 图标
    pub icon: String,
    /// 展示名称
    pub display_name: String,
}
