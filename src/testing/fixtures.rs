//! # 测试数据 Fixtures

use serde_json::{Value, json};

use crate::auth::types::ProviderProfile;
use crate::config::{AppConfig, ProviderConfig};

/// 测试用访问令牌密钥
pub const TEST_ACCESS_SECRET: &str = "test-access-secret";
/// 测试用刷新令牌密钥
pub const TEST_REFRESH_SECRET: &str = "test-refresh-secret";
/// 测试用应用根地址
pub const TEST_APP_ROOT: &str = "https://poker.test";

/// 以 `provider_base` 作为 Yandex 各端点地址的应用配置
#[must_use]
pub fn test_app_config(provider_base: &str) -> AppConfig {
    let mut config = AppConfig {
        app_root: Some(TEST_APP_ROOT.to_string()),
        ..AppConfig::default()
    };
    config.tokens.access_secret = TEST_ACCESS_SECRET.to_string();
    config.tokens.refresh_secret = TEST_REFRESH_SECRET.to_string();
    config.providers.insert(
        "yandex".to_string(),
        ProviderConfig {
            enabled: Some(true),
            client_id: "yandex-client".to_string(),
            client_secret: Some("yandex-secret".to_string()),
            auth_url: Some(format!("{provider_base}/authorize")),
            token_url: Some(format!("{provider_base}/token")),
            userinfo_url: Some(format!("{provider_base}/info")),
            ..ProviderConfig::default()
        },
    );
    config
}

/// Yandex 用户资料原始响应
#[must_use]
pub fn yandex_profile_json(id: &str, real_name: &str) -> Value {
    json!({
        "id": id,
        "login": real_name.to_lowercase(),
        "real_name": real_name,
    })
}

/// 规范化资料
#[must_use]
pub fn sample_profile(provider: &str, provider_uid: &str) -> ProviderProfile {
    ProviderProfile {
        provider_id: provider_uid.to_string(),
        provider_name: provider.to_string(),
        email: format!("{provider_uid}@example.com"),
        name: format!("User {provider_uid}"),
        ..ProviderProfile::default()
    }
}
