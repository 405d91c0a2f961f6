//! # HTTP 服务
//!
//! Axum 路由、处理器、中间件与统一错误响应

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use server::{AppState, HttpServer, build_router};
