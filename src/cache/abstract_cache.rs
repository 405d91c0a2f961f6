//! # KV 存储抽象层
//!
//! 登录 state 与会话链共用的键值存储接口，支持内存与 Redis 两种后端。
//! 所有写入都带 TTL；`take` 必须是原子的读取并删除，`compare_and_swap`
//! 必须是原子的比较并替换。

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{AuthError, Result};

/// 存储项
#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    expires_at: Instant,
}

impl StoreEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// KV 存储抽象
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 写入（覆盖）一个带 TTL 的值
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// 读取但不删除
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 原子读取并删除；并发调用时至多一个拿到值
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// 删除，返回键是否存在
    async fn remove(&self, key: &str) -> Result<bool>;

    /// 仅当当前值等于 `expected` 时原子地替换为 `value` 并重置 TTL
    ///
    /// 键不存在、已过期或值已变化时返回 `false`，存储不变。
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool>;

    /// 后端名称（用于日志）
    fn backend_name(&self) -> &'static str;
}

/// 基于 JSON 的类型化读写
#[async_trait]
pub trait KvStoreExt: KvStore {
    /// 序列化后写入
    async fn put_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let serialized = serde_json::to_string(value)
            .map_err(|e| AuthError::storage_with_source("序列化存储值失败", e))?;
        self.put(key, serialized, ttl).await
    }

    /// 读取并反序列化
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.get(key).await?.map(|raw| decode_json(&raw)).transpose()
    }

    /// 原子取出并反序列化
    async fn take_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.take(key).await?.map(|raw| decode_json(&raw)).transpose()
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| AuthError::storage_with_source("反序列化存储值失败", e))
}

/// 写入时顺带清理过期项的最小间隔
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct MemoryInner {
    entries: HashMap<String, StoreEntry>,
    next_purge: Instant,
}

/// 内存存储实现
///
/// 单个互斥锁保护整张表。读取时惰性丢弃过期项；写入时每隔
/// `purge_interval` 清扫一次整张表，未被读取的过期项（如被放弃的登录）
/// 不会无限累积。
#[derive(Debug)]
pub struct MemoryKvStore {
    data: Mutex<MemoryInner>,
    purge_interval: Duration,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::with_purge_interval(DEFAULT_PURGE_INTERVAL)
    }
}

impl MemoryKvStore {
    /// 创建空存储
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定清扫间隔创建存储
    #[must_use]
    pub fn with_purge_interval(purge_interval: Duration) -> Self {
        Self {
            data: Mutex::new(MemoryInner {
                entries: HashMap::new(),
                next_purge: Instant::now(),
            }),
            purge_interval,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.data
            .lock()
            .map_err(|_| AuthError::storage("内存存储锁已中毒"))
    }

    /// 清理所有过期项，返回清理数量
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut data = self.lock()?;
        data.next_purge = now + self.purge_interval;
        Ok(purge(&mut data.entries, now))
    }

    /// 当前条目数（含尚未清理的过期项）
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    /// 是否为空
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.entries.is_empty())
    }
}

fn purge(entries: &mut HashMap<String, StoreEntry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut data = self.lock()?;
        if now >= data.next_purge {
            purge(&mut data.entries, now);
            data.next_purge = now + self.purge_interval;
        }
        data.entries.insert(key.to_string(), StoreEntry::new(value, ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut data = self.lock()?;
        let expired = match data.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            data.entries.remove(key);
        }
        Ok(None)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut data = self.lock()?;
        Ok(data
            .entries
            .remove(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut data = self.lock()?;
        Ok(data
            .entries
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool> {
        let now = Instant::now();
        let mut data = self.lock()?;
        match data.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) && entry.value == expected => {
                *entry = StoreEntry::new(value, ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_get_take() {
        let store = MemoryKvStore::new();
        store
            .put("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.take("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.take("k").await.unwrap(), None);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible() {
        let store = MemoryKvStore::new();
        store.put("gone", "v".to_string(), Duration::ZERO).await.unwrap();

        assert_eq!(store.get("gone").await.unwrap(), None);
        assert_eq!(store.take("gone").await.unwrap(), None);
        assert!(!store.remove("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryKvStore::new();
        store.put("a", "1".to_string(), Duration::ZERO).await.unwrap();
        store
            .put("b", "2".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_sweeps_abandoned_entries() {
        let store = MemoryKvStore::with_purge_interval(Duration::ZERO);
        for i in 0..100 {
            store
                .put(&format!("abandoned:{i}"), "x".to_string(), Duration::from_millis(300))
                .await
                .unwrap();
        }
        assert_eq!(store.len().unwrap(), 100);

        tokio::time::sleep(Duration::from_millis(400)).await;
        store
            .put("fresh", "y".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_default_store_sweeps_after_interval() {
        let store = MemoryKvStore::new();
        for i in 0..50 {
            store
                .put(&format!("login_state:{i}"), "x".to_string(), Duration::from_millis(100))
                .await
                .unwrap();
        }

        tokio::time::sleep(DEFAULT_PURGE_INTERVAL + Duration::from_millis(200)).await;
        store
            .put("login_state:last", "y".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryKvStore::new();
        let ttl = Duration::from_secs(60);
        assert!(!store.compare_and_swap("k", "v1", "v2".to_string(), ttl).await.unwrap());

        store.put("k", "v1".to_string(), ttl).await.unwrap();
        assert!(!store.compare_and_swap("k", "other", "v2".to_string(), ttl).await.unwrap());
        assert!(store.compare_and_swap("k", "v1", "v2".to_string(), ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.take("k").await.unwrap();
        assert!(!store.compare_and_swap("k", "v2", "v3".to_string(), ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = MemoryKvStore::new();
        store
            .put_json("n", &vec![1, 2, 3], Duration::from_secs(60))
            .await
            .unwrap();
        let value: Option<Vec<i32>> = store.take_json("n").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_take_single_winner() {
        let store = Arc::new(MemoryKvStore::new());
        store
            .put("once", "x".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.take("once").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
