//! # 用户处理器

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::auth::types::{AuthContext, UserId};
use crate::error::AuthError;
use crate::server::response;
use crate::server::server::AppState;

/// 当前用户
#[derive(Debug, Serialize)]
pub struct CurrentUser {
    /// 用户ID
    pub id: UserId,
    /// 展示名称
    pub display_name: String,
    /// 邮箱，提供商未返回时为空
    pub email: String,
}

/// `GET /api/user`：返回访问令牌对应的身份
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Response {
    match state.login.get_identity(auth.user_id).await {
        Ok(identity) => Json(CurrentUser {
            id: identity.id,
            display_name: identity.display_name,
            email: identity.email,
        })
        .into_response(),
        Err(err) if matches!(err.root(), AuthError::NotFound { .. }) => {
            response::error(StatusCode::NOT_FOUND, "USER_NOT_FOUND", "用户不存在")
        }
        Err(err) => err.into_response(),
    }
}
