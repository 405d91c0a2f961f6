//! # Warden Auth Library
//!
//! 多提供商 OAuth2 + PKCE 登录、资料规范化、单次使用的登录 state、
//! 访问/刷新双令牌与会话链轮换。

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod server;
pub mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AuthError, Result};
