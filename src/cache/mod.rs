//! # KV 存储模块
//!
//! 登录 state 与会话链的存储后端（内存 / Redis）

pub mod abstract_cache;
pub mod client;

pub use abstract_cache::{KvStore, KvStoreExt, MemoryKvStore};
pub use client::RedisKvStore;

use std::sync::Arc;

use crate::config::{StateStoreConfig, StoreBackend};
use crate::error::Result;

/// 按配置构建存储后端
pub async fn build_store(config: &StateStoreConfig) -> Result<Arc<dyn KvStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryKvStore::new())),
        StoreBackend::Redis => {
            let store = RedisKvStore::connect(&config.redis_url, config.key_prefix.clone()).await?;
            store.ping().await?;
            Ok(Arc::new(store))
        }
    }
}
