//! # Token 交换
//!
//! 用授权码向提供商令牌端点换取访问令牌（`application/x-www-form-urlencoded`）

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::providers::OAuthProviderConfig;
use crate::config::HttpClientConfig;
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 令牌端点响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    /// 访问令牌
    #[serde(default)]
    pub access_token: String,
    /// 令牌类型
    #[serde(default)]
    pub token_type: Option<String>,
    /// 有效期（秒）
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// 提供商的刷新令牌
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// OIDC ID 令牌
    #[serde(default)]
    pub id_token: Option<String>,
    /// 实际授予的权限范围
    #[serde(default)]
    pub scope: Option<String>,
    /// 错误代码
    #[serde(default)]
    pub error: Option<String>,
    /// 错误描述
    #[serde(default)]
    pub error_description: Option<String>,
}

/// 出站 HTTP 客户端（令牌交换与资料获取共用）
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    http_client: reqwest::Client,
}

impl TokenExchangeClient {
    /// 按配置创建，超时必须有界
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AuthError::config_with_source("无法创建HTTP客户端", e))?;

        Ok(Self { http_client })
    }

    /// 共享的底层客户端
    #[must_use]
    pub const fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// 交换授权码
    pub async fn exchange_code(
        &self,
        provider: &OAuthProviderConfig,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse> {
        let mut form_params: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", provider.client_id.as_str()),
            ("redirect_uri", provider.redirect_uri.as_str()),
        ];
        if let Some(secret) = provider.client_secret.as_deref() {
            form_params.push(("client_secret", secret));
        }
        if let Some(verifier) = code_verifier {
            form_params.push(("code_verifier", verifier));
        }

        ldebug!(
            "system",
            LogStage::Exchange,
            LogComponent::OAuth,
            "token_exchange_start",
            "开始交换授权码",
            provider = %provider.key,
            with_verifier = code_verifier.is_some()
        );

        let response = self
            .http_client
            .post(&provider.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form_params)
            .send()
            .await
            .map_err(|e| AuthError::upstream_with_source(&provider.key, "令牌端点请求失败", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::upstream_with_source(&provider.key, "读取令牌响应失败", e))?;

        if !status.is_success() {
            lwarn!(
                "system",
                LogStage::Exchange,
                LogComponent::OAuth,
                "token_exchange_failed",
                "令牌端点返回错误",
                provider = %provider.key,
                status = %status
            );
            if let Ok(error_response) = serde_json::from_str::<TokenResponse>(&body) {
                if let Some(error) = error_response.error {
                    return Err(AuthError::upstream(
                        &provider.key,
                        format!(
                            "HTTP {status}: {error}: {}",
                            error_response.error_description.unwrap_or_default()
                        ),
                    ));
                }
            }
            return Err(crate::upstream_error!(&provider.key, "HTTP {}: {}", status, body));
        }

        let token = serde_json::from_str::<TokenResponse>(&body)
            .map_err(|e| AuthError::decode_with_source("无法解析令牌响应", e))?;

        // 部分提供商以 200 返回 error 字段
        if let Some(error) = &token.error {
            return Err(AuthError::upstream(
                &provider.key,
                format!(
                    "{error}: {}",
                    token.error_description.as_deref().unwrap_or_default()
                ),
            ));
        }
        if token.access_token.is_empty() {
            return Err(AuthError::decode("令牌响应缺少 access_token"));
        }

        ldebug!(
            "system",
            LogStage::Exchange,
            LogComponent::OAuth,
            "token_exchange_complete",
            "授权码交换完成",
            provider = %provider.key,
            token_type = ?token.token_type,
            expires_in = ?token.expires_in
        );
        Ok(token)
    }
}
