//! # Redis KV 存储
//!
//! 多实例部署时外置登录 state 与会话链。`take` 使用 `GETDEL`，
//! `compare_and_swap` 使用 Lua 脚本，保证原子性。
//!
//! 键中带有 state 令牌或令牌 jti，日志与错误信息只出现键的命名空间和指纹。

use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use std::time::Duration;

use super::KvStore;
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage, token_fingerprint};
use crate::{ldebug, linfo};

/// 值相等时替换并重置过期时间
const COMPARE_AND_SWAP_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
    return 1
end
return 0
";

/// 可写入日志的键：保留命名空间，其余部分替换为指纹
fn redacted_key(key: &str) -> String {
    match key.split_once(':') {
        Some((namespace, secret)) => format!("{namespace}:{}", token_fingerprint(secret)),
        None => token_fingerprint(key),
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 至少 1ms，0 会被 Redis 拒绝
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis 存储实现
#[derive(Clone)]
pub struct RedisKvStore {
    /// Redis 连接管理器（内部自动重连）
    connection_manager: ConnectionManager,
    /// 键前缀
    key_prefix: String,
}

impl RedisKvStore {
    /// 连接 Redis
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "connect_to_redis",
            "正在连接 Redis 服务器"
        );

        let client = Client::open(redis_url)
            .map_err(|e| AuthError::storage_with_source("创建 Redis 客户端失败", e))?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AuthError::storage_with_source("建立 Redis 连接失败", e))?;

        linfo!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "redis_connected",
            "Redis 连接建立成功"
        );

        Ok(Self {
            connection_manager,
            key_prefix: key_prefix.into(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{key}", self.key_prefix)
        }
    }

    /// 连接健康检查
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::storage_with_source("Redis PING 失败", e))?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let ttl_ms = ttl_millis(ttl);
        let mut conn = self.connection_manager.clone();
        conn.pset_ex::<_, _, ()>(self.full_key(key), value, ttl_ms)
            .await
            .map_err(|e| {
                AuthError::storage_with_source(format!("写入失败: {}", redacted_key(key)), e)
            })?;

        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "kv_put",
            "写入 Redis",
            key = %redacted_key(key),
            ttl_ms = ttl_ms
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection_manager.clone();
        conn.get(self.full_key(key)).await.map_err(|e| {
            AuthError::storage_with_source(format!("读取失败: {}", redacted_key(key)), e)
        })
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection_manager.clone();
        conn.get_del(self.full_key(key)).await.map_err(|e| {
            AuthError::storage_with_source(format!("GETDEL 失败: {}", redacted_key(key)), e)
        })
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection_manager.clone();
        let deleted: i64 = conn.del(self.full_key(key)).await.map_err(|e| {
            AuthError::storage_with_source(format!("删除失败: {}", redacted_key(key)), e)
        })?;
        Ok(deleted > 0)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool> {
        let mut conn = self.connection_manager.clone();
        let swapped: i64 = Script::new(COMPARE_AND_SWAP_SCRIPT)
            .key(self.full_key(key))
            .arg(expected)
            .arg(value)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                AuthError::storage_with_source(
                    format!("比较并替换失败: {}", redacted_key(key)),
                    e,
                )
            })?;
        Ok(swapped == 1)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
