//! # 认证中间件
//!
//! 提取访问令牌（`?accessToken=` 优先，其次 `Authorization: Bearer`），
//! 用访问令牌服务校验，并把 [`AuthContext`] 注入请求扩展。任何失败都直接返回 401，
//! 不调用后续处理器。

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use super::request_id::RequestId;
use crate::auth::types::AuthContext;
use crate::auth::utils::AuthUtils;
use crate::logging::{LogComponent, LogStage, token_fingerprint};
use crate::server::server::AppState;
use crate::{ldebug, lwarn};

/// Axum认证中间件
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(ToString::to_string)
        .unwrap_or_default();

    let Some(token) = AuthUtils::extract_access_token(request.headers(), request.uri().query())
    else {
        ldebug!(
            request_id,
            LogStage::Authentication,
            LogComponent::Middleware,
            "token_missing",
            "请求未携带访问令牌",
            path = %request.uri().path()
        );
        return Err(StatusCode::UNAUTHORIZED);
    };

    match state.login.access_tokens().validate_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthContext::from(claims));
            Ok(next.run(request).await)
        }
        Err(err) => {
            lwarn!(
                request_id,
                LogStage::Authentication,
                LogComponent::Middleware,
                "token_rejected",
                "访问令牌校验失败",
                token_fp = %token_fingerprint(&token),
                error = %err
            );
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
