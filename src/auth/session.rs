//! # 会话存储
//!
//! 每个会话是一条刷新令牌链，任一时刻只有一个有效的刷新令牌。
//!
//! - `session:{sid}` 保存会话记录，记录当前刷新令牌的 jti
//! - `refresh:{jti}` 指向所属会话，轮换时以原子 take 取出
//!
//! 同一刷新令牌的并发轮换只有一个能取到 `refresh:{jti}`；其余请求视为重放。
//! 会话记录以比较并替换写回，轮换期间被吊销的会话不会被重新写入。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::types::UserId;
use crate::cache::{KvStore, KvStoreExt};
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

/// 服务端会话记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// 会话ID
    pub session_id: String,
    /// 用户ID
    pub user_id: UserId,
    /// 当前有效刷新令牌的 jti
    pub current_refresh_jti: String,
    /// 创建时间（unix 秒）
    pub created_at: i64,
}

/// 会话存储
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    revoke_chain_on_reuse: bool,
}

impl SessionStore {
    /// 创建会话存储，`ttl` 应等于刷新令牌有效期
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration, revoke_chain_on_reuse: bool) -> Self {
        Self {
            store,
            ttl,
            revoke_chain_on_reuse,
        }
    }

    fn session_key(session_id: &str) -> String {
        format!("session:{session_id}")
    }

    fn refresh_key(jti: &str) -> String {
        format!("refresh:{jti}")
    }

    /// 生成新的会话ID
    #[must_use]
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// 建立会话并登记首个刷新令牌
    pub async fn start(
        &self,
        session_id: &str,
        user_id: UserId,
        refresh_jti: &str,
    ) -> Result<SessionRecord> {
        let record = SessionRecord {
            session_id: session_id.to_string(),
            user_id,
            current_refresh_jti: refresh_jti.to_string(),
            created_at: Utc::now().timestamp(),
        };

        self.store
            .put_json(&Self::session_key(session_id), &record, self.ttl)
            .await?;
        self.store
            .put(&Self::refresh_key(refresh_jti), session_id.to_string(), self.ttl)
            .await?;

        linfo!(
            "system",
            LogStage::TokenIssue,
            LogComponent::SessionStore,
            "session_started",
            "会话已建立",
            user_id = user_id,
            session_id = %session_id
        );
        Ok(record)
    }

    /// 轮换刷新令牌：旧 jti 必须是该会话当前的刷新令牌
    ///
    /// 旧令牌已被替换或会话不存在时返回 NotFound；开启链吊销时，
    /// 被替换的旧令牌再次出现会吊销整个会话。
    pub async fn rotate(
        &self,
        session_id: &str,
        old_jti: &str,
        new_jti: &str,
    ) -> Result<SessionRecord> {
        let owner = self.store.take(&Self::refresh_key(old_jti)).await?;

        if owner.as_deref() != Some(session_id) {
            lwarn!(
                "system",
                LogStage::Refresh,
                LogComponent::SessionStore,
                "refresh_reuse_detected",
                "刷新令牌已失效或被重放",
                session_id = %session_id,
                revoke_chain = self.revoke_chain_on_reuse
            );
            if self.revoke_chain_on_reuse {
                self.revoke(session_id).await?;
            }
            return Err(AuthError::not_found("refresh_token", old_jti));
        }

        let session_key = Self::session_key(session_id);
        let Some(raw) = self.store.get(&session_key).await? else {
            return Err(AuthError::not_found("session", session_id));
        };
        let mut record: SessionRecord = serde_json::from_str(&raw)
            .map_err(|e| AuthError::storage_with_source("反序列化存储值失败", e))?;

        if record.current_refresh_jti != old_jti {
            // refresh 键与会话记录不一致时按重放处理
            if self.revoke_chain_on_reuse {
                self.revoke(session_id).await?;
            }
            return Err(AuthError::not_found("refresh_token", old_jti));
        }

        new_jti.clone_into(&mut record.current_refresh_jti);
        let updated = serde_json::to_string(&record)
            .map_err(|e| AuthError::storage_with_source("序列化存储值失败", e))?;

        // 新 refresh 键先于会话记录写入，写回失败时撤销
        let new_refresh_key = Self::refresh_key(new_jti);
        self.store
            .put(&new_refresh_key, session_id.to_string(), self.ttl)
            .await?;

        if !self
            .store
            .compare_and_swap(&session_key, &raw, updated, self.ttl)
            .await?
        {
            self.store.remove(&new_refresh_key).await?;
            lwarn!(
                "system",
                LogStage::Refresh,
                LogComponent::SessionStore,
                "session_changed_during_rotation",
                "轮换期间会话已被吊销或修改",
                session_id = %session_id
            );
            return Err(AuthError::not_found("session", session_id));
        }

        ldebug!(
            "system",
            LogStage::Refresh,
            LogComponent::SessionStore,
            "session_rotated",
            "刷新令牌已轮换",
            session_id = %session_id
        );
        Ok(record)
    }

    /// 读取会话，要求 `jti` 是当前刷新令牌
    pub async fn current(&self, session_id: &str, jti: &str) -> Result<SessionRecord> {
        let record = self
            .store
            .get_json::<SessionRecord>(&Self::session_key(session_id))
            .await?
            .ok_or_else(|| AuthError::not_found("session", session_id))?;

        if record.current_refresh_jti != jti {
            return Err(AuthError::not_found("refresh_token", jti));
        }
        Ok(record)
    }

    /// 吊销整个会话链，幂等；返回会话此前是否存在
    pub async fn revoke(&self, session_id: &str) -> Result<bool> {
        let record = self
            .store
            .take_json::<SessionRecord>(&Self::session_key(session_id))
            .await?;

        let Some(record) = record else {
            return Ok(false);
        };

        self.store
            .remove(&Self::refresh_key(&record.current_refresh_jti))
            .await?;

        linfo!(
            "system",
            LogStage::Logout,
            LogComponent::SessionStore,
            "session_revoked",
            "会话已吊销",
            user_id = record.user_id,
            session_id = %session_id
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKvStore;

    fn sessions(revoke_chain: bool) -> SessionStore {
        SessionStore::new(
            Arc::new(MemoryKvStore::new()),
            Duration::from_secs(3600),
            revoke_chain,
        )
    }

    #[tokio::test]
    async fn test_start_and_rotate() {
        let store = sessions(true);
        store.start("s1", 5, "j1").await.unwrap();

        let record = store.rotate("s1", "j1", "j2").await.unwrap();
        assert_eq!(record.current_refresh_jti, "j2");
        assert_eq!(store.current("s1", "j2").await.unwrap().user_id, 5);
        assert!(store.current("s1", "j1").await.is_err());
    }

    #[tokio::test]
    async fn test_reuse_revokes_chain() {
        let store = sessions(true);
        store.start("s1", 5, "j1").await.unwrap();
        store.rotate("s1", "j1", "j2").await.unwrap();

        let reuse = store.rotate("s1", "j1", "j3").await;
        assert!(matches!(reuse, Err(AuthError::NotFound { .. })));

        // 整条链被吊销，当前令牌也失效
        assert!(store.current("s1", "j2").await.is_err());
        assert!(store.rotate("s1", "j2", "j4").await.is_err());
    }

    #[tokio::test]
    async fn test_reuse_without_chain_revocation() {
        let store = sessions(false);
        store.start("s1", 5, "j1").await.unwrap();
        store.rotate("s1", "j1", "j2").await.unwrap();

        assert!(store.rotate("s1", "j1", "j3").await.is_err());
        assert!(store.rotate("s1", "j2", "j4").await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = sessions(true);
        store.start("s1", 5, "j1").await.unwrap();
        assert!(store.revoke("s1").await.unwrap());
        assert!(!store.revoke("s1").await.unwrap());
        assert!(store.rotate("s1", "j1", "j2").await.is_err());
    }

    /// 在会话记录写回前插入一次吊销，模拟并发登出
    struct RevokeBeforeWrite {
        inner: MemoryKvStore,
        sessions: std::sync::OnceLock<SessionStore>,
    }

    #[async_trait::async_trait]
    impl KvStore for RevokeBeforeWrite {
        async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
            self.inner.put(key, value, ttl).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn take(&self, key: &str) -> Result<Option<String>> {
            self.inner.take(key).await
        }

        async fn remove(&self, key: &str) -> Result<bool> {
            self.inner.remove(key).await
        }

        async fn compare_and_swap(
            &self,
            key: &str,
            expected: &str,
            value: String,
            ttl: Duration,
        ) -> Result<bool> {
            if let Some(sessions) = self.sessions.get() {
                sessions.revoke("s1").await?;
            }
            self.inner.compare_and_swap(key, expected, value, ttl).await
        }

        fn backend_name(&self) -> &'static str {
            "memory"
        }
    }

    #[tokio::test]
    async fn test_revoke_during_rotation_is_not_resurrected() {
        let kv = Arc::new(RevokeBeforeWrite {
            inner: MemoryKvStore::new(),
            sessions: std::sync::OnceLock::new(),
        });
        let store = SessionStore::new(kv.clone(), Duration::from_secs(3600), true);
        store.start("s1", 5, "j1").await.unwrap();
        assert!(kv.sessions.set(store.clone()).is_ok());

        let rotated = store.rotate("s1", "j1", "j2").await;
        assert!(matches!(rotated, Err(AuthError::NotFound { .. })));

        // 会话保持吊销状态，新令牌也不可用
        assert!(kv.inner.get("session:s1").await.unwrap().is_none());
        assert!(kv.inner.get("refresh:j2").await.unwrap().is_none());
        assert!(store.current("s1", "j2").await.is_err());
        assert!(store.rotate("s1", "j2", "j3").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_single_winner() {
        let store = sessions(false);
        store.start("s1", 5, "j1").await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.rotate("s1", "j1", &format!("n{i}")).await.is_ok() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
