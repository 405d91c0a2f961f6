//! # 应用装配
//!
//! 持有跨模块共享的服务实例

pub mod context;

pub use context::AppContext;
