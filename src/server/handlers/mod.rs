//! # 请求处理器

pub mod auth;
pub mod system;
pub mod users;
