//! # 配置管理器
//!
//! TOML 文件加载 + 环境变量覆盖 + 校验

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{AppConfig, ProviderConfig, validate_config};
use crate::error::{AuthError, Context, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 当前配置
    config: Arc<AppConfig>,
    /// 配置文件路径
    config_path: PathBuf,
}

impl ConfigManager {
    /// 创建配置管理器
    ///
    /// 优先使用 `WARDEN_CONFIG_PATH`，否则读取 `config/config.{RUST_ENV}.toml`。
    pub fn new() -> Result<Self> {
        let config_file = if let Ok(path) = env::var("WARDEN_CONFIG_PATH") {
            path
        } else {
            let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
            format!("config/config.{env}.toml")
        };

        Self::from_file(config_file)
    }

    /// 从指定文件创建配置管理器，使用进程环境变量覆盖
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with_env(config_path, env::vars())
    }

    /// 从指定文件创建配置管理器，使用给定的环境变量集合覆盖
    pub fn from_file_with_env<I>(config_path: impl AsRef<Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config_path = config_path.as_ref();
        let mut config = Self::load_config_file(config_path)?;

        let overrides: HashMap<String, String> = vars.into_iter().collect();
        let applied = Self::apply_env_overrides(&mut config, &overrides)?;

        validate_config(&config)?;

        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Config,
            "config_loaded",
            "配置管理器初始化完成",
            path = %config_path.display(),
            providers = config.providers.len(),
            env_overrides = applied
        );

        Ok(Self {
            config: Arc::new(config),
            config_path: config_path.to_path_buf(),
        })
    }

    /// 直接包装一个已构造的配置（测试与嵌入使用）
    pub fn from_config(config: AppConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            config_path: PathBuf::new(),
        })
    }

    /// 获取当前配置
    #[must_use]
    pub fn get_config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// 配置文件路径
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Err(AuthError::config(format!("配置文件不存在: {}", path.display())));
        }

        let config_content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;

        toml::from_str::<AppConfig>(&config_content)
            .with_context(|| format!("配置文件: {}", path.display()))
    }

    /// 应用环境变量覆盖，返回生效的覆盖数量
    ///
    /// 固定变量：`ACCESS_TOKEN_SECRET`、`REFRESH_TOKEN_SECRET`、`DATABASE_URL`、
    /// `APP_ROOT`、`REDIS_URL`、`CLIENT_ID_<P>`、`CLIENT_SECRET_<P>`；
    /// 以及 `WARDEN_` 前缀的通用路径覆盖（`WARDEN_SERVER_PORT` -> server.port）。
    fn apply_env_overrides(
        config: &mut AppConfig,
        vars: &HashMap<String, String>,
    ) -> Result<usize> {
        let mut applied = 0;

        for (key, value) in vars {
            let hit = match key.as_str() {
                "ACCESS_TOKEN_SECRET" => {
                    config.tokens.access_secret.clone_from(value);
                    true
                }
                "REFRESH_TOKEN_SECRET" => {
                    config.tokens.refresh_secret.clone_from(value);
                    true
                }
                "DATABASE_URL" => {
                    config.database.url.clone_from(value);
                    true
                }
                "APP_ROOT" => {
                    config.app_root = Some(value.clone());
                    true
                }
                "REDIS_URL" => {
                    config.state_store.redis_url.clone_from(value);
                    true
                }
                "WARDEN_CONFIG_PATH" => false,
                other => {
                    if let Some(provider) = other.strip_prefix("CLIENT_ID_") {
                        Self::provider_entry(config, provider).client_id.clone_from(value);
                        true
                    } else if let Some(provider) = other.strip_prefix("CLIENT_SECRET_") {
                        Self::provider_entry(config, provider).client_secret = Some(value.clone());
                        true
                    } else if let Some(path) = other.strip_prefix("WARDEN_") {
                        let path = path.to_lowercase().replace('_', ".");
                        Self::apply_override_to_config(config, &path, value)?
                    } else {
                        false
                    }
                }
            };

            if hit {
                applied += 1;
                let shown = if is_sensitive(key) { "***" } else { value.as_str() };
                ldebug!(
                    "system",
                    LogStage::Configuration,
                    LogComponent::Config,
                    "env_override",
                    "应用环境变量覆盖",
                    key = %key,
                    value = %shown
                );
            }
        }

        Ok(applied)
    }

    /// `CLIENT_ID_YANDEX` 对应 `providers.yandex`，不存在时新建
    fn provider_entry<'a>(config: &'a mut AppConfig, provider: &str) -> &'a mut ProviderConfig {
        config
            .providers
            .entry(provider.to_lowercase())
            .or_default()
    }

    /// 将通用路径覆盖应用到配置对象
    fn apply_override_to_config(config: &mut AppConfig, path: &str, value: &str) -> Result<bool> {
        let parts: Vec<&str> = path.split('.').collect();

        match parts.as_slice() {
            ["server", "host"] => config.server.host = value.to_string(),
            ["server", "port"] => {
                config.server.port = value.parse().map_err(|e| {
                    AuthError::config_with_source(format!("无效的端口号: {value}"), e)
                })?;
            }
            ["database", "max", "connections"] => {
                config.database.max_connections = value.parse().map_err(|e| {
                    AuthError::config_with_source(format!("无效的最大连接数: {value}"), e)
                })?;
            }
            ["state", "store", "backend"] => {
                config.state_store.backend = match value.to_lowercase().as_str() {
                    "memory" => super::StoreBackend::Memory,
                    "redis" => super::StoreBackend::Redis,
                    other => {
                        return Err(AuthError::config(format!("无效的存储后端: {other}")));
                    }
                };
            }
            ["session", "secure"] => {
                config.session.secure = value.parse().map_err(|e| {
                    AuthError::config_with_source(format!("无效的布尔值: {value}"), e)
                })?;
            }
            _ => {
                lwarn!(
                    "system",
                    LogStage::Configuration,
                    LogComponent::Config,
                    "unknown_override",
                    format!("未知的配置路径，忽略环境变量覆盖: {path}")
                );
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    key.contains("secret") || key.contains("password") || key.contains("database_url")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BASE: &str = r#"
[tokens]
access_secret = "file-access"
refresh_secret = "file-refresh"

[providers.yandex]
client_id = "file-client"
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(BASE);
        let manager = ConfigManager::from_file_with_env(file.path(), Vec::new()).unwrap();
        let config = manager.get_config();
        assert_eq!(config.tokens.access_secret, "file-access");
        assert_eq!(config.providers["yandex"].client_id, "file-client");
        assert_eq!(config.session.cookie_name, "warden_session");
    }

    #[test]
    fn test_env_overrides() {
        let file = write_config(BASE);
        let manager = ConfigManager::from_file_with_env(
            file.path(),
            vars(&[
                ("ACCESS_TOKEN_SECRET", "env-access"),
                ("CLIENT_ID_GOOGLE", "google-id"),
                ("CLIENT_SECRET_GOOGLE", "google-secret"),
                ("APP_ROOT", "https://poker.example.com"),
                ("WARDEN_SERVER_PORT", "9000"),
                ("UNRELATED", "ignored"),
            ]),
        )
        .unwrap();

        let config = manager.get_config();
        assert_eq!(config.tokens.access_secret, "env-access");
        assert_eq!(config.tokens.refresh_secret, "file-refresh");
        assert_eq!(config.providers["google"].client_id, "google-id");
        assert_eq!(
            config.providers["google"].client_secret.as_deref(),
            Some("google-secret")
        );
        assert_eq!(config.app_root.as_deref(), Some("https://poker.example.com"));
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_invalid_port_override() {
        let file = write_config(BASE);
        let result =
            ConfigManager::from_file_with_env(file.path(), vars(&[("WARDEN_SERVER_PORT", "abc")]));
        assert!(matches!(result, Err(AuthError::Configuration { .. })));
    }

    #[test]
    fn test_broken_toml_is_configuration_error() {
        let file = write_config("[server\nport = 1");
        let err = ConfigManager::from_file_with_env(file.path(), Vec::new()).unwrap_err();
        assert!(matches!(err.root(), AuthError::Configuration { .. }));
        assert!(err.to_string().contains("配置文件"));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigManager::from_file_with_env("/nonexistent/warden.toml", Vec::new());
        assert!(result.is_err());
    }
}
