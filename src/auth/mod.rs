//! # 认证模块
//!
//! 多提供商 OAuth 登录（PKCE）、登录 state、访问/刷新令牌与会话链。
//! 对外只暴露编排服务 [`LoginService`] 和核心数据结构，其余实现通过子模块路径访问。

pub mod identity;
pub mod identity_db;
pub mod jwt;
pub mod oauth_client;
pub mod pkce;
pub mod service;
pub mod session;
pub mod state_store;
pub mod types;
pub mod utils;

pub use identity::{IdentityRepository, MemoryIdentityRepository};
pub use identity_db::DbIdentityRepository;
pub use jwt::TokenService;
pub use service::{ExchangeRequest, LoginPhase, LoginService, SessionInfo};
pub use types::{AuthContext, TokenKind, TokenPair};
