//! # 登录与会话处理器
//!
//! 刷新令牌按绑定方式交付：`cookie` 写入 HttpOnly 会话 Cookie，`opaque` 放在响应体中。
//! 刷新时沿用令牌到达的方式。

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::service::ExchangeRequest;
use crate::auth::types::{AuthorizeUrl, ProviderInfo, TokenPair, UserId};
use crate::auth::utils::AuthUtils;
use crate::config::SessionBinding;
use crate::error::{AuthError, Result};
use crate::server::server::AppState;

/// 登录请求
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    /// 提供商标识
    #[serde(default)]
    pub provider: String,
    /// 客户端生成的 PKCE challenge
    #[serde(default)]
    pub code_challenge: Option<String>,
}

/// 回调交换请求
#[derive(Debug, Default, Deserialize)]
pub struct ExchangeBody {
    /// 提供商标识
    #[serde(default)]
    pub provider: String,
    /// 授权码
    #[serde(default)]
    pub code: String,
    /// PKCE verifier
    #[serde(default)]
    pub code_verifier: Option<String>,
    /// 登录时返回的 state
    #[serde(default)]
    pub state: Option<String>,
    /// 刷新令牌交付方式，缺省取配置
    #[serde(default)]
    pub binding: Option<SessionBinding>,
}

/// 刷新 / 登出请求体（opaque 绑定）
#[derive(Debug, Default, Deserialize)]
pub struct RefreshBody {
    /// 刷新令牌
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// 令牌响应
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// 访问令牌
    pub access_token: String,
    /// 用户ID
    pub user_id: UserId,
    /// 仅 opaque 绑定返回
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// 会话响应
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    /// 用户ID
    pub user_id: UserId,
    /// 刷新令牌剩余有效期（秒）
    pub expires_in: u64,
}

/// `GET /api/providers`
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    Json(state.login.list_providers())
}

/// `POST /api/user/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthorizeUrl>> {
    if body.provider.trim().is_empty() {
        return Err(AuthError::config("缺少 provider"));
    }

    state
        .login
        .build_authorize_url(&body.provider, body.code_challenge.as_deref())
        .await
        .map(Json)
}

/// `POST /api/user/exchange`
pub async fn exchange(
    State(state): State<AppState>,
    Json(body): Json<ExchangeBody>,
) -> Result<Response> {
    if body.provider.trim().is_empty() || body.code.trim().is_empty() {
        return Err(AuthError::config("缺少 provider 或 code"));
    }

    let binding = body.binding.unwrap_or(state.config.session.binding);
    let request = ExchangeRequest {
        provider: body.provider,
        code: body.code,
        code_verifier: body.code_verifier,
        state: body.state,
    };

    let pair = state
        .login
        .exchange(&request)
        .await
        .map_err(AuthError::into_login_failure)?;

    Ok(token_response(&state, pair, binding))
}

/// `POST /api/user/refresh`
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let (token, binding) = match presented_refresh_token(&state, &headers, &body) {
        Ok(found) => found,
        Err(err) => return err.into_response(),
    };

    match state.login.refresh(&token).await {
        Ok(pair) => token_response(&state, pair, binding),
        Err(err) => {
            let response = err.into_response();
            if binding == SessionBinding::Cookie {
                with_cookie(response, clear_cookie(&state))
            } else {
                response
            }
        }
    }
}

/// `GET /api/user/session`
pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>> {
    let token = AuthUtils::extract_cookie(&headers, &state.config.session.cookie_name)
        .ok_or_else(|| AuthError::unauthorized("缺少会话 Cookie"))?;

    let info = state.login.session(&token).await?;
    Ok(Json(SessionResponse {
        user_id: info.user_id,
        expires_in: info.expires_in,
    }))
}

/// `POST /api/user/logout`：幂等，总是清除会话 Cookie
pub async fn logout(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match presented_refresh_token(&state, &headers, &body) {
        Ok((token, _)) => {
            if let Err(err) = state.login.logout(&token).await {
                return err.into_response();
            }
        }
        Err(err) if matches!(err.root(), AuthError::Unauthorized { .. }) => {}
        Err(err) => return err.into_response(),
    }

    with_cookie(Json(json!({})).into_response(), clear_cookie(&state))
}

/// 请求体中的刷新令牌优先，其次会话 Cookie
fn presented_refresh_token(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<(String, SessionBinding)> {
    let parsed = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshBody::default()
    } else {
        serde_json::from_slice::<RefreshBody>(body)
            .map_err(|e| AuthError::config_with_source("请求体不是有效的 JSON", e))?
    };

    if let Some(token) = parsed.refresh_token.filter(|t| !t.is_empty()) {
        return Ok((token, SessionBinding::Opaque));
    }
    AuthUtils::extract_cookie(headers, &state.config.session.cookie_name)
        .map(|token| (token, SessionBinding::Cookie))
        .ok_or_else(|| AuthError::unauthorized("缺少刷新令牌"))
}

fn token_response(state: &AppState, pair: TokenPair, binding: SessionBinding) -> Response {
    match binding {
        SessionBinding::Cookie => {
            let cookie = AuthUtils::session_cookie(
                &state.config.session.cookie_name,
                &pair.refresh_token,
                state.config.session.secure,
                pair.refresh_expires_in,
            );
            let body = TokenResponse {
                access_token: pair.access_token,
                user_id: pair.user_id,
                refresh_token: None,
            };
            with_cookie(Json(body).into_response(), cookie)
        }
        SessionBinding::Opaque => Json(TokenResponse {
            access_token: pair.access_token,
            user_id: pair.user_id,
            refresh_token: Some(pair.refresh_token),
        })
        .into_response(),
    }
}

fn clear_cookie(state: &AppState) -> String {
    AuthUtils::clear_session_cookie(&state.config.session.cookie_name, state.config.session.secure)
}

fn with_cookie(response: Response, cookie: String) -> Response {
    ([(header::SET_COOKIE, cookie)], response).into_response()
}
