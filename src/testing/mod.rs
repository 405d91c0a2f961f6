//! # 测试支持
//!
//! 单元测试与集成测试共用：应用配置 fixtures、内存数据库与路由构建、
//! 身份仓库 Mock 与 OAuth 提供商替身。集成测试通过 `testing` feature 引入。

#[cfg(any(test, feature = "testing"))]
pub mod fixtures;
#[cfg(any(test, feature = "testing"))]
pub mod helpers;
#[cfg(any(test, feature = "testing"))]
pub mod mocks;

#[cfg(any(test, feature = "testing"))]
pub use fixtures::*;
#[cfg(any(test, feature = "testing"))]
pub use helpers::*;
#[cfg(any(test, feature = "testing"))]
pub use mocks::*;
