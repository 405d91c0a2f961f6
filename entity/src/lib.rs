//! # Entity 模块
//!
//! 身份与第三方登录绑定的 Sea-ORM 实体定义

pub mod user_auth_providers;
pub mod users;

pub use user_auth_providers::Entity as UserAuthProviders;
pub use users::Entity as Users;

#[cfg(test)]
mod tests;
