//! # OAuth 客户端
//!
//! 授权码交换与用户资料获取。每次登录恰好发出一次令牌交换请求和一次资料请求，
//! 不做重试：登录由用户发起，失败后由客户端重新开始流程。

pub mod normalizer;
pub mod providers;
pub mod token_exchange;

pub use normalizer::{NormalizerKind, ProfileNormalizer};
pub use providers::{OAuthProviderConfig, ProviderRegistry};
pub use token_exchange::{TokenExchangeClient, TokenResponse};

use serde_json::Value;

use crate::auth::types::ProviderProfile;
use crate::config::HttpClientConfig;
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 提供商客户端
#[derive(Debug, Clone)]
pub struct ProviderClient {
    exchange: TokenExchangeClient,
}

impl ProviderClient {
    /// 创建客户端
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        Ok(Self {
            exchange: TokenExchangeClient::new(config)?,
        })
    }

    /// 用授权码换取提供商令牌，再获取并规范化用户资料
    pub async fn get_user_data(
        &self,
        provider: &OAuthProviderConfig,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<ProviderProfile> {
        let token = self
            .exchange
            .exchange_code(provider, code, code_verifier)
            .await?;
        let raw = self.fetch_profile(provider, &token.access_token).await?;

        let profile = provider.profile_normalizer().normalize(&provider.key, &raw);
        if profile.provider_id.is_empty() {
            return Err(AuthError::decode(format!(
                "{} 返回的用户资料缺少 id",
                provider.key
            )));
        }

        ldebug!(
            "system",
            LogStage::Exchange,
            LogComponent::OAuth,
            "profile_normalized",
            "用户资料已规范化",
            provider = %provider.key,
            normalizer = %provider.normalizer,
            has_email = !profile.email.is_empty()
        );
        Ok(profile)
    }

    async fn fetch_profile(&self, provider: &OAuthProviderConfig, access_token: &str) -> Result<Value> {
        let response = self
            .exchange
            .http_client()
            .get(&provider.userinfo_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("{} {access_token}", provider.userinfo_auth_scheme),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthError::upstream_with_source(&provider.key, "用户资料请求失败", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::upstream_with_source(&provider.key, "读取用户资料失败", e))?;

        if !status.is_success() {
            lwarn!(
                "system",
                LogStage::Exchange,
                LogComponent::OAuth,
                "profile_fetch_failed",
                "用户资料端点返回错误",
                provider = %provider.key,
                status = %status
            );
            return Err(crate::upstream_error!(&provider.key, "HTTP {}: {}", status, body));
        }

        let raw: Value = serde_json::from_str(&body)
            .map_err(|e| AuthError::decode_with_source("无法解析用户资料", e))?;
        if !raw.is_object() {
            return Err(AuthError::decode("用户资料不是 JSON 对象"));
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer, scheme: &str, normalizer: NormalizerKind) -> OAuthProviderConfig {
        OAuthProviderConfig {
            key: "yandex".to_string(),
            client_id: "client".to_string(),
            client_secret: Some("secret".to_string()),
            auth_url: format!("{}/authorize", server.uri()),
            token_url: format!("{}/token", server.uri()),
            userinfo_url: format!("{}/info", server.uri()),
            scopes: vec![],
            redirect_uri: "https://app.test/YandexAuthCallback".to_string(),
            display_name: "Yandex".to_string(),
            icon: String::new(),
            normalizer,
            userinfo_auth_scheme: scheme.to_string(),
        }
    }

    fn client() -> ProviderClient {
        ProviderClient::new(&HttpClientConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_and_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier=ver"))
            .and(body_string_contains("client_secret=secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "prov-token",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .and(header("authorization", "OAuth prov-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "42", "real_name": "Ann"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server, "OAuth", NormalizerKind::Yandex);
        let profile = client()
            .get_user_data(&provider, "the-code", Some("ver"))
            .await
            .unwrap();

        assert_eq!(profile.provider_id, "42");
        assert_eq!(profile.name, "Ann");
        assert_eq!(profile.provider_name, "yandex");
        assert!(profile.email.is_empty());
    }

    #[tokio::test]
    async fn test_token_endpoint_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "code expired"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server, "Bearer", NormalizerKind::Default);
        let err = client()
            .get_user_data(&provider, "bad", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Upstream { .. }));
        assert!(err.to_string().contains("invalid_grant") || format!("{err:?}").contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_unparsable_profile_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let provider = provider_for(&server, "Bearer", NormalizerKind::Default);
        let err = client().get_user_data(&provider, "c", None).await.unwrap_err();
        assert!(matches!(err, AuthError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_profile_endpoint_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = provider_for(&server, "Bearer", NormalizerKind::Default);
        let err = client().get_user_data(&provider, "c", None).await.unwrap_err();
        assert!(matches!(err, AuthError::Upstream { .. }));
    }
}
