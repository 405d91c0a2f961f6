//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum AuthError {
    /// 配置或请求参数错误（未知提供商、缺少 code_challenge 等）
    #[error("配置错误: {message}")]
    Configuration {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 第三方提供商调用失败（非 2xx 或网络错误）
    #[error("上游服务错误 [{provider}]: {message}")]
    Upstream {
        /// 错误描述
        message: String,
        /// 提供商标识
        provider: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 响应或令牌无法解析
    #[error("解析错误: {message}")]
    Decode {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 令牌签名或算法不合法
    #[error("签名错误: {message}")]
    Signature {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 令牌已过期
    #[error("令牌已过期: {message}")]
    Expired {
        /// 错误描述
        message: String,
    },

    /// 令牌类型不匹配
    #[error("令牌类型错误: 期望 {expected}, 实际 {actual}")]
    WrongType {
        /// 期望的令牌类型
        expected: String,
        /// 实际的令牌类型
        actual: String,
    },

    /// 资源冲突（并发创建身份时的唯一约束冲突）
    #[error("资源冲突: {resource} {identifier}")]
    Conflict {
        /// 资源类型
        resource: String,
        /// 资源标识
        identifier: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 资源不存在（state 已消费/过期，会话失效等）
    #[error("资源未找到: {resource} {identifier}")]
    NotFound {
        /// 资源类型
        resource: String,
        /// 资源标识
        identifier: String,
    },

    /// 未认证
    #[error("未认证: {message}")]
    Unauthorized {
        /// 错误描述
        message: String,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 状态存储（内存/Redis）错误
    #[error("存储错误: {message}")]
    Storage {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 附加上下文的错误，状态码与错误代码沿用被包装的错误
    #[error("{context}: {source}")]
    Context {
        /// 上下文描述
        context: String,
        /// 被包装的错误
        #[source]
        source: Box<AuthError>,
    },
}

impl AuthError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &str) {
        match self {
            Self::Configuration { .. } => (StatusCode::BAD_REQUEST, "CONFIG_ERROR"),
            Self::Upstream { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::Decode { .. } => (StatusCode::UNAUTHORIZED, "DECODE_ERROR"),
            Self::Signature { .. } => (StatusCode::UNAUTHORIZED, "SIGNATURE_ERROR"),
            Self::Expired { .. } => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            Self::WrongType { .. } => (StatusCode::UNAUTHORIZED, "WRONG_TOKEN_TYPE"),
            Self::NotFound { .. } => (StatusCode::UNAUTHORIZED, "NOT_FOUND"),
            Self::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFLICT"),
            Self::Database { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Self::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// 错误分类（4xx 为客户端，5xx 为服务端）
    #[must_use]
    pub fn category(&self) -> super::ErrorCategory {
        if self.to_http_response_parts().0.is_server_error() {
            super::ErrorCategory::Server
        } else {
            super::ErrorCategory::Client
        }
    }

    /// 去掉上下文包装，返回根错误
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// 是否为令牌校验类错误
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self.root(),
            Self::Decode { .. } | Self::Signature { .. } | Self::Expired { .. } | Self::WrongType { .. }
        )
    }

    /// 登录交换中提供商侧的失败统一按 401 对外呈现
    ///
    /// 只改写上游调用与资料解析失败，不暴露对应的 502；
    /// 身份冲突等服务端错误保持原状态码。
    #[must_use]
    pub fn into_login_failure(self) -> Self {
        let login_failure = matches!(self.root(), Self::Upstream { .. } | Self::Decode { .. });
        if login_failure {
            Self::Unauthorized {
                message: self.to_string(),
            }
        } else {
            self
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建上游错误
    pub fn upstream<T: Into<String>, P: Into<String>>(provider: P, message: T) -> Self {
        Self::Upstream {
            message: message.into(),
            provider: provider.into(),
            source: None,
        }
    }

    /// 创建带来源的上游错误
    pub fn upstream_with_source<T: Into<String>, P: Into<String>, E: Into<anyhow::Error>>(
        provider: P,
        message: T,
        source: E,
    ) -> Self {
        Self::Upstream {
            message: message.into(),
            provider: provider.into(),
            source: Some(source.into()),
        }
    }

    /// 创建解析错误
    pub fn decode<T: Into<String>>(message: T) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的解析错误
    pub fn decode_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Decode {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的签名错误
    pub fn signature_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Signature {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建过期错误
    pub fn expired<T: Into<String>>(message: T) -> Self {
        Self::Expired {
            message: message.into(),
        }
    }

    /// 创建令牌类型错误
    pub fn wrong_type<E: Into<String>, A: Into<String>>(expected: E, actual: A) -> Self {
        Self::WrongType {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// 创建冲突错误
    pub fn conflict<R: Into<String>, I: Into<String>>(resource: R, identifier: I) -> Self {
        Self::Conflict {
            resource: resource.into(),
            identifier: identifier.into(),
            source: None,
        }
    }

    /// 创建带来源的冲突错误
    pub fn conflict_with_source<R: Into<String>, I: Into<String>, E: Into<anyhow::Error>>(
        resource: R,
        identifier: I,
        source: E,
    ) -> Self {
        Self::Conflict {
            resource: resource.into(),
            identifier: identifier.into(),
            source: Some(source.into()),
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, identifier: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            identifier: identifier.into(),
        }
    }

    /// 创建未认证错误
    pub fn unauthorized<T: Into<String>>(message: T) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建存储错误
    pub fn storage<T: Into<String>>(message: T) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的存储错误
    pub fn storage_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        Self::internal_with_source("文件操作失败", err)
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode_with_source("JSON处理失败", err)
    }
}

impl From<sea_orm::error::DbErr> for AuthError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::database_with_source("数据库操作失败", err)
    }
}

// Redis错误转换
impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        Self::storage_with_source("Redis操作失败", err)
    }
}

// Reqwest错误转换：调用方未标注提供商时记为 unknown
impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::upstream_with_source("unknown", "HTTP请求失败", err)
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        Self::config_with_source("URL解析失败", err)
    }
}
