//! # HTTP 服务器
//!
//! 组装路由与中间件并监听端口。所有 API 挂在 `/api` 下。

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::middleware::request_id_middleware;
use crate::app::AppContext;
use crate::config::ServerConfig;
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{linfo, lwarn};

/// API前缀
pub const API_PREFIX: &str = "/api";

/// 服务器应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    /// 包装应用上下文
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// 共享的应用上下文
    #[must_use]
    pub const fn context_arc(&self) -> &Arc<AppContext> {
        &self.context
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// 跨域配置：未配置或包含 `*` 时放开来源（此时不允许携带凭据）
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
        ]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let parsed = origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<std::result::Result<Vec<_>, _>>();

    match parsed {
        // 会话 Cookie 跨站发送需要凭据
        Ok(list) => base.allow_origin(list).allow_credentials(true),
        Err(e) => {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::ServerSetup,
                "cors_config_fail",
                "CORS 来源配置无效，退回为允许任意来源",
                error = %e
            );
            base.allow_origin(Any)
        }
    }
}

/// 构建完整路由
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .nest(API_PREFIX, super::routes::create_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// HTTP 服务器
pub struct HttpServer {
    config: ServerConfig,
    router: Router,
}

impl HttpServer {
    /// 创建服务器
    #[must_use]
    pub fn new(context: Arc<AppContext>) -> Self {
        let config = context.config.server.clone();
        let router = build_router(AppState::new(context));
        Self { config, router }
    }

    /// 监听并处理请求，直到收到 Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self.config.bind_address().parse().map_err(|e| {
            AuthError::config_with_source(
                format!("无效的监听地址 '{}'", self.config.bind_address()),
                e,
            )
        })?;

        let listener = TcpListener::bind(&addr).await?;
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            "HTTP 服务已启动",
            addr = %addr
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AuthError::internal_with_source("HTTP 服务异常退出", e))?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "server_stop",
            "HTTP 服务已停止"
        );
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        lwarn!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "signal_listen_fail",
            "无法监听退出信号",
            error = %e
        );
    }
}
