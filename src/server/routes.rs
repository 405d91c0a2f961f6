//! # 路由配置

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

use super::handlers::{auth, system, users};
use super::middleware;
use super::server::AppState;

/// 创建所有路由（挂载在 `/api` 下）
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/providers", get(auth::list_providers))
        .nest("/user", user_routes(state.clone()))
        .route("/ping", get(system::ping_handler))
        .with_state(state)
}

/// 登录与会话路由；`GET /user` 需要访问令牌
fn user_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", get(users::get_current_user))
        .route_layer(from_fn_with_state(state, middleware::auth));

    Router::new()
        .route("/login", post(auth::login))
        .route("/exchange", post(auth::exchange))
        .route("/refresh", post(auth::refresh))
        .route("/session", get(auth::session))
        .route("/logout", post(auth::logout))
        .merge(protected)
}
