//! # 资料规范化
//!
//! 各提供商的用户资料字段各不相同（id 为字符串或数字、`name` 或 `real_name`/`login` 等），
//! 规范化器把原始 JSON 映射为统一的 [`ProviderProfile`]。缺失的可选字段一律为空字符串。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::auth::types::ProviderProfile;
use crate::error::AuthError;

/// 规范化器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizerKind {
    /// Yandex 资料格式
    Yandex,
    /// Google 资料格式
    Google,
    /// GitHub 资料格式
    Github,
    /// 未知提供商，按常见字段名尽力提取
    Default,
}

impl NormalizerKind {
    /// 配置中使用的名称
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yandex => "yandex",
            Self::Google => "google",
            Self::Github => "github",
            Self::Default => "default",
        }
    }

    /// 对应的规范化器实例
    #[must_use]
    pub fn normalizer(self) -> &'static dyn ProfileNormalizer {
        match self {
            Self::Yandex => &YandexNormalizer,
            Self::Google => &GoogleNormalizer,
            Self::Github => &GithubNormalizer,
            Self::Default => &DefaultNormalizer,
        }
    }
}

impl fmt::Display for NormalizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizerKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yandex" => Ok(Self::Yandex),
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "default" => Ok(Self::Default),
            other => Err(AuthError::config(format!("未知的资料规范化器: {other}"))),
        }
    }
}

/// 把提供商原始资料映射为规范化资料
pub trait ProfileNormalizer: Send + Sync {
    /// `provider` 为注册表中的提供商标识，写入 `provider_name`
    fn normalize(&self, provider: &str, raw: &Value) -> ProviderProfile;
}

/// 读取字符串字段，缺失或非字符串时为空
fn text(raw: &Value, field: &str) -> String {
    match raw.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

/// 读取 ID 字段，兼容字符串与整数
fn id_field(raw: &Value, field: &str) -> String {
    match raw.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|v| v.to_string())
            .or_else(|| n.as_u64().map(|v| v.to_string()))
            .unwrap_or_else(|| n.to_string()),
        _ => String::new(),
    }
}

fn first_non_empty(values: impl IntoIterator<Item = String>) -> String {
    values
        .into_iter()
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}

fn join_name(first: &str, last: &str) -> String {
    format!("{first} {last}").trim().to_string()
}

/// Yandex ID
#[derive(Debug, Clone, Copy, Default)]
pub struct YandexNormalizer;

impl ProfileNormalizer for YandexNormalizer {
    fn normalize(&self, provider: &str, raw: &Value) -> ProviderProfile {
        let avatar_id = text(raw, "default_avatar_id");
        let avatar_url = if avatar_id.is_empty() || raw.get("is_avatar_empty") == Some(&Value::Bool(true))
        {
            String::new()
        } else {
            format!("https://avatars.yandex.net/get-yapic/{avatar_id}/islands-200")
        };

        ProviderProfile {
            provider_id: id_field(raw, "id"),
            provider_name: provider.to_string(),
            email: text(raw, "default_email"),
            name: first_non_empty([
                text(raw, "real_name"),
                text(raw, "display_name"),
                text(raw, "login"),
            ]),
            first_name: text(raw, "first_name"),
            last_name: text(raw, "last_name"),
            avatar_url,
        }
    }
}

/// Google (v2 userinfo 与 OpenID userinfo 两种格式)
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleNormalizer;

impl ProfileNormalizer for GoogleNormalizer {
    fn normalize(&self, provider: &str, raw: &Value) -> ProviderProfile {
        let first_name = text(raw, "given_name");
        let last_name = text(raw, "family_name");
        let name = first_non_empty([text(raw, "name"), join_name(&first_name, &last_name)]);

        ProviderProfile {
            provider_id: first_non_empty([id_field(raw, "id"), id_field(raw, "sub")]),
            provider_name: provider.to_string(),
            email: text(raw, "email"),
            name,
            first_name,
            last_name,
            avatar_url: text(raw, "picture"),
        }
    }
}

/// GitHub，`id` 为整数
#[derive(Debug, Clone, Copy, Default)]
pub struct GithubNormalizer;

impl ProfileNormalizer for GithubNormalizer {
    fn normalize(&self, provider: &str, raw: &Value) -> ProviderProfile {
        let name = first_non_empty([text(raw, "name"), text(raw, "login")]);

        ProviderProfile {
            provider_id: id_field(raw, "id"),
            provider_name: provider.to_string(),
            email: text(raw, "email"),
            first_name: name.clone(),
            last_name: String::new(),
            name,
            avatar_url: text(raw, "avatar_url"),
        }
    }
}

/// 未知提供商的尽力提取
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNormalizer;

impl ProfileNormalizer for DefaultNormalizer {
    fn normalize(&self, provider: &str, raw: &Value) -> ProviderProfile {
        ProviderProfile {
            provider_id: id_field(raw, "id"),
            provider_name: provider.to_string(),
            email: text(raw, "email"),
            name: text(raw, "name"),
            first_name: text(raw, "first_name"),
            last_name: text(raw, "last_name"),
            avatar_url: first_non_empty([text(raw, "avatar_url"), text(raw, "picture")]),
        }
    }
}
