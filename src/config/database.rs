//! # 数据库配置

use crate::error::{AuthError, Result};
use crate::{linfo, logging::{LogComponent, LogStage}};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout: u64,
    /// 启动时自动执行迁移
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/warden.db".to_string(),
            max_connections: 10,
            connect_timeout: 30,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// 是否为 SQLite 内存数据库
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:")
    }

    /// 确保数据库路径存在（仅对SQLite文件数据库）
    pub fn ensure_database_path(&self) -> Result<()> {
        if !self.url.starts_with("sqlite:") || self.is_memory() {
            return Ok(());
        }

        let path_str = self
            .url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let path_str = path_str.split('?').next().unwrap_or(path_str);
        let db_path = Path::new(path_str);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AuthError::config_with_source(
                        format!("无法创建数据库目录: {}", parent.display()),
                        e,
                    )
                })?;

                linfo!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Database,
                    "create_db_dir",
                    format!("创建数据库目录: {}", parent.display())
                );
            }
        }

        if !db_path.exists() {
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "create_db_file_info",
                format!("数据库文件将在首次连接时创建: {}", db_path.display())
            );
        }

        Ok(())
    }

    /// 连接串，文件库追加 `mode=rwc` 以便自动建库
    #[must_use]
    pub fn connection_url(&self) -> String {
        if self.url.starts_with("sqlite:") && !self.is_memory() && !self.url.contains("mode=") {
            let sep = if self.url.contains('?') { '&' } else { '?' };
            format!("{}{sep}mode=rwc", self.url)
        } else {
            self.url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_url_appends_mode() {
        let config = DatabaseConfig {
            url: "sqlite://./data/x.db".to_string(),
            ..DatabaseConfig::default()
        };
        assert_eq!(config.connection_url(), "sqlite://./data/x.db?mode=rwc");

        let memory = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        assert_eq!(memory.connection_url(), "sqlite::memory:");
        assert!(memory.ensure_database_path().is_ok());
    }

    #[test]
    fn test_ensure_database_path_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("warden.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db.display()),
            ..DatabaseConfig::default()
        };
        config.ensure_database_path().unwrap();
        assert!(dir.path().join("nested").exists());
    }
}
