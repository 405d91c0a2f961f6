//! # API 响应结构
//!
//! 成功响应直接返回业务 JSON；错误统一为
//! `{success: false, error: {code, message}, timestamp}`。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::logging::{LogComponent, LogStage};
use crate::{lerror, lwarn};

/// # 标准错误信息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// 错误代码
    pub code: String,
    /// 错误描述
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 恒为 false
    pub success: bool,
    /// 错误信息
    pub error: ErrorInfo,
    /// 响应时间
    pub timestamp: DateTime<Utc>,
}

/// 构建错误响应
pub fn error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorInfo {
            code: code.to_string(),
            message: message.into(),
        },
        timestamp: Utc::now(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();
        if status.is_server_error() {
            lerror!(
                "system",
                LogStage::Response,
                LogComponent::Handler,
                "request_failed",
                "请求处理失败",
                status = status.as_u16(),
                code = code,
                error = ?self
            );
        } else {
            lwarn!(
                "system",
                LogStage::Response,
                LogComponent::Handler,
                "request_rejected",
                "请求被拒绝",
                status = status.as_u16(),
                code = code,
                error = %self
            );
        }

        // 服务端错误不向客户端暴露内部细节
        let message = if status.is_server_error() {
            "服务内部错误".to_string()
        } else {
            self.to_string()
        };
        error(status, code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> ErrorResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_token_error_envelope() {
        let response = AuthError::expired("token has expired").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_of(response).await;
        assert!(!body.success);
        assert_eq!(body.error.code, "TOKEN_EXPIRED");
    }

    #[tokio::test]
    async fn test_server_error_hides_details() {
        let response = AuthError::database("connection refused at 10.0.0.3").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(response).await;
        assert!(!body.error.message.contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_config_error_is_bad_request() {
        let response = AuthError::config("缺少 code_challenge").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await.error.code, "CONFIG_ERROR");
    }
}
