//! # 测试 Mock 对象
//!
//! OAuth 提供商的 HTTP 替身与身份仓库的 Mock 实现

use async_trait::async_trait;
use mockall::mock;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::auth::IdentityRepository;
use crate::auth::types::{Identity, ProviderBinding, ProviderProfile, UserId};
use crate::error::Result;

mock! {
    /// 身份仓库 Mock，生成 `MockIdentityRepo`
    pub IdentityRepo {}

    #[async_trait]
    impl IdentityRepository for IdentityRepo {
        async fn find_binding(&self, provider: &str, provider_uid: &str) -> Result<Option<ProviderBinding>>;
        async fn create_identity_with_binding(&self, profile: &ProviderProfile) -> Result<ProviderBinding>;
        async fn get_identity(&self, id: UserId) -> Result<Option<Identity>>;
    }
}

/// 模拟 OAuth 提供商（令牌端点 `/token`，资料端点 `/info`）
pub struct MockProvider {
    server: MockServer,
}

impl MockProvider {
    /// 启动替身服务器
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// 服务器根地址
    #[must_use]
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// 底层 wiremock 服务器
    #[must_use]
    pub const fn server(&self) -> &MockServer {
        &self.server
    }

    /// 挂载一次成功登录：令牌交换返回 `access_token`，资料端点要求 `OAuth <token>`
    pub async fn mount_login(&self, access_token: &str, profile: Value) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/info"))
            .and(header("authorization", format!("OAuth {access_token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile))
            .mount(&self.server)
            .await;
    }

    /// 令牌端点返回错误
    pub async fn mount_token_error(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Code has expired"
            })))
            .mount(&self.server)
            .await;
    }

    /// 已收到的令牌交换请求体
    pub async fn token_request_bodies(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == "/token")
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }
}
