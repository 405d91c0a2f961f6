//! # OAuth 提供商注册表
//!
//! 启动时把配置中的 `providers.<key>` 与内置预设合并，每个提供商注册为
//! `{配置, 规范化器}` 一对。编排层只通过提供商标识访问，不做提供商分支。

use std::collections::BTreeMap;

use url::Url;

use super::normalizer::{NormalizerKind, ProfileNormalizer};
use crate::auth::pkce::{CHALLENGE_METHOD_S256, PkceChallenge};
use crate::auth::types::ProviderInfo;
use crate::config::{AppConfig, ProviderConfig};
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ensure_config, linfo};

/// 用户信息请求默认的授权方案
pub const DEFAULT_USERINFO_SCHEME: &str = "Bearer";

/// 内置提供商预设
struct ProviderPreset {
    key: &'static str,
    auth_url: &'static str,
    token_url: &'static str,
    userinfo_url: &'static str,
    scopes: &'static [&'static str],
    display_name: &'static str,
    icon: &'static str,
    normalizer: NormalizerKind,
    userinfo_auth_scheme: &'static str,
}

const PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        key: "yandex",
        auth_url: "https://oauth.yandex.com/authorize",
        token_url: "https://oauth.yandex.com/token",
        userinfo_url: "https://login.yandex.ru/info?format=json",
        scopes: &["login:email", "login:info"],
        display_name: "Yandex",
        icon: "yandex",
        normalizer: NormalizerKind::Yandex,
        userinfo_auth_scheme: "OAuth",
    },
    ProviderPreset {
        key: "google",
        auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
        token_url: "https://oauth2.googleapis.com/token",
        userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo",
        scopes: &["openid", "email", "profile"],
        display_name: "Google",
        icon: "google",
        normalizer: NormalizerKind::Google,
        userinfo_auth_scheme: DEFAULT_USERINFO_SCHEME,
    },
    ProviderPreset {
        key: "github",
        auth_url: "https://github.com/login/oauth/authorize",
        token_url: "https://github.com/login/oauth/access_token",
        userinfo_url: "https://api.github.com/user",
        scopes: &["read:user", "user:email"],
        display_name: "GitHub",
        icon: "github",
        normalizer: NormalizerKind::Github,
        userinfo_auth_scheme: DEFAULT_USERINFO_SCHEME,
    },
];

fn preset(key: &str) -> Option<&'static ProviderPreset> {
    PRESETS.iter().find(|p| p.key == key)
}

/// 合并后的提供商配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProviderConfig {
    /// 提供商标识
    pub key: String,
    /// 客户端ID
    pub client_id: String,
    /// 客户端密钥（公开客户端为空）
    pub client_secret: Option<String>,
    /// 授权端点
    pub auth_url: String,
    /// 令牌端点
    pub token_url: String,
    /// 用户信息端点
    pub userinfo_url: String,
    /// 申请的权限范围
    pub scopes: Vec<String>,
    /// 回调地址
    pub redirect_uri: String,
    /// 展示名称
    pub display_name: String,
    /// 图标标识
    pub icon: String,
    /// 资料规范化器
    pub normalizer: NormalizerKind,
    /// 用户信息请求的 Authorization 方案（`Bearer` / `OAuth`）
    pub userinfo_auth_scheme: String,
}

impl OAuthProviderConfig {
    /// 资料规范化器实例
    #[must_use]
    pub fn profile_normalizer(&self) -> &'static dyn ProfileNormalizer {
        self.normalizer.normalizer()
    }

    /// 登录页展示信息
    #[must_use]
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            provider: self.key.clone(),
            icon: self.icon.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// 默认回调地址 `{app_root}/{Provider}AuthCallback`
fn default_redirect(app_root: &str, key: &str) -> String {
    let mut chars = key.chars();
    let capitalized = chars
        .next()
        .map(|c| c.to_uppercase().chain(chars).collect::<String>())
        .unwrap_or_default();
    format!("{}/{capitalized}AuthCallback", app_root.trim_end_matches('/'))
}

fn resolve_endpoint(
    key: &str,
    name: &str,
    configured: Option<&String>,
    preset: Option<&'static str>,
) -> Result<String> {
    let value = configured
        .map(String::as_str)
        .or(preset)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::config(format!("提供商 {key} 缺少 {name}")))?;
    Url::parse(value)
        .map_err(|e| AuthError::config_with_source(format!("提供商 {key} 的 {name} 无效"), e))?;
    Ok(value.to_string())
}

fn resolve_provider(
    key: &str,
    config: &ProviderConfig,
    app_root: Option<&str>,
) -> Result<OAuthProviderConfig> {
    let preset = preset(key);
    ensure_config!(!config.client_id.is_empty(), "提供商 {} 缺少 client_id", key);

    let auth_url = resolve_endpoint(key, "auth_url", config.auth_url.as_ref(), preset.map(|p| p.auth_url))?;
    let token_url =
        resolve_endpoint(key, "token_url", config.token_url.as_ref(), preset.map(|p| p.token_url))?;
    let userinfo_url = resolve_endpoint(
        key,
        "userinfo_url",
        config.userinfo_url.as_ref(),
        preset.map(|p| p.userinfo_url),
    )?;

    let redirect_uri = match (&config.redirect_uri, app_root) {
        (Some(uri), _) if !uri.is_empty() => uri.clone(),
        (_, Some(root)) if !root.is_empty() => default_redirect(root, key),
        _ => {
            return Err(AuthError::config(format!(
                "提供商 {key} 缺少 redirect_uri，且未配置 app_root"
            )));
        }
    };

    let normalizer = match &config.normalizer {
        Some(name) => name.parse()?,
        None => preset.map_or(NormalizerKind::Default, |p| p.normalizer),
    };

    let scopes = config.scopes.clone().unwrap_or_else(|| {
        preset
            .map(|p| p.scopes.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    });

    Ok(OAuthProviderConfig {
        key: key.to_string(),
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone().filter(|s| !s.is_empty()),
        auth_url,
        token_url,
        userinfo_url,
        scopes,
        redirect_uri,
        display_name: config
            .display_name
            .clone()
            .or_else(|| preset.map(|p| p.display_name.to_string()))
            .unwrap_or_else(|| key.to_string()),
        icon: config
            .icon
            .clone()
            .or_else(|| preset.map(|p| p.icon.to_string()))
            .unwrap_or_default(),
        normalizer,
        userinfo_auth_scheme: config
            .userinfo_auth_scheme
            .clone()
            .or_else(|| preset.map(|p| p.userinfo_auth_scheme.to_string()))
            .unwrap_or_else(|| DEFAULT_USERINFO_SCHEME.to_string()),
    })
}

/// 提供商注册表
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, OAuthProviderConfig>,
}

impl ProviderRegistry {
    /// 由应用配置构建，只注册启用的提供商
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut providers = BTreeMap::new();
        for (key, provider) in &config.providers {
            if !provider.is_enabled() {
                continue;
            }
            let key = key.to_ascii_lowercase();
            let resolved = resolve_provider(&key, provider, config.app_root.as_deref())?;
            providers.insert(key, resolved);
        }

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ProviderRegistry,
            "registry_built",
            "OAuth 提供商注册完成",
            providers = ?providers.keys().collect::<Vec<_>>()
        );
        Ok(Self { providers })
    }

    /// 直接注册一个已解析的提供商（覆盖同名）
    pub fn register(&mut self, mut provider: OAuthProviderConfig) {
        provider.key.make_ascii_lowercase();
        self.providers.insert(provider.key.clone(), provider);
    }

    /// 按标识读取配置，标识不区分大小写；未知标识返回配置错误
    pub fn get_config(&self, key: &str) -> Result<&OAuthProviderConfig> {
        self.providers
            .get(&key.to_ascii_lowercase())
            .ok_or_else(|| AuthError::config(format!("未知的登录提供商: {key}")))
    }

    /// 已注册的提供商，按标识排序
    #[must_use]
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        self.providers.values().map(OAuthProviderConfig::info).collect()
    }

    /// 已注册的提供商数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// 是否没有任何提供商
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// 构建授权地址
    pub fn build_authorize_url(
        &self,
        config: &OAuthProviderConfig,
        state: &str,
        challenge: &PkceChallenge,
    ) -> Result<String> {
        let mut url = Url::parse(&config.auth_url)?;

        let scope = config.scopes.join(" ");
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        params.extend([
            ("state", state),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", CHALLENGE_METHOD_S256),
        ]);

        url.query_pairs_mut().extend_pairs(params);
        Ok(url.to_string())
    }
}
