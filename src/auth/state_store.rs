//! # 登录 state 存储
//!
//! 授权跳转前写入，回调交换时原子取出。每个 state 至多被消费一次，
//! 过期项对读取不可见（惰性清理）。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::auth::pkce::{PkceChallenge, generate_state};
use crate::auth::types::LoginState;
use crate::cache::{KvStore, KvStoreExt};
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage, token_fingerprint};
use crate::{ldebug, lwarn};

const KEY_PREFIX: &str = "login_state";

/// 登录 state 存储
#[derive(Clone)]
pub struct LoginStateStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl LoginStateStore {
    /// 创建存储
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// state 有效期
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(state_token: &str) -> String {
        format!("{KEY_PREFIX}:{state_token}")
    }

    /// 生成新的 state 并与 Challenge 一起保存
    pub async fn create(&self, provider: &str, challenge: &PkceChallenge) -> Result<LoginState> {
        let state = LoginState {
            state_token: generate_state(),
            provider: provider.to_string(),
            code_challenge: challenge.as_str().to_string(),
            code_challenge_method: challenge.method().to_string(),
            created_at: Utc::now().timestamp(),
            ttl: self.ttl.as_secs(),
        };
        self.insert(&state).await?;
        Ok(state)
    }

    /// 保存一条 state 记录（覆盖同名记录）
    pub async fn insert(&self, state: &LoginState) -> Result<()> {
        if state.state_token.is_empty() {
            return Err(AuthError::config("state 不能为空"));
        }

        self.store
            .put_json(&Self::key(&state.state_token), state, self.ttl)
            .await?;

        ldebug!(
            "system",
            LogStage::Authorize,
            LogComponent::StateStore,
            "state_created",
            "登录 state 已保存",
            provider = %state.provider,
            state_fp = %token_fingerprint(&state.state_token),
            backend = self.store.backend_name()
        );
        Ok(())
    }

    /// 原子消费 state；不存在、已过期或已被消费时返回 NotFound
    pub async fn consume(&self, state_token: &str) -> Result<LoginState> {
        let fingerprint = token_fingerprint(state_token);
        match self.store.take_json::<LoginState>(&Self::key(state_token)).await? {
            Some(state) => {
                ldebug!(
                    "system",
                    LogStage::Exchange,
                    LogComponent::StateStore,
                    "state_consumed",
                    "登录 state 已消费",
                    provider = %state.provider,
                    state_fp = %fingerprint
                );
                Ok(state)
            }
            None => {
                lwarn!(
                    "system",
                    LogStage::Exchange,
                    LogComponent::StateStore,
                    "state_missing",
                    "登录 state 不存在、已过期或已被使用",
                    state_fp = %fingerprint
                );
                Err(AuthError::not_found("login_state", fingerprint))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKvStore;

    fn store(ttl: Duration) -> LoginStateStore {
        LoginStateStore::new(Arc::new(MemoryKvStore::new()), ttl)
    }

    #[tokio::test]
    async fn test_create_then_consume_once() {
        let states = store(Duration::from_secs(600));
        let challenge = PkceChallenge::from_client("abc123").unwrap();
        let created = states.create("yandex", &challenge).await.unwrap();

        assert_eq!(created.code_challenge, "abc123");
        assert_eq!(created.code_challenge_method, "S256");

        let consumed = states.consume(&created.state_token).await.unwrap();
        assert_eq!(consumed, created);

        let replay = states.consume(&created.state_token).await;
        assert!(matches!(replay, Err(AuthError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_expired_state_is_not_found() {
        let states = store(Duration::ZERO);
        let challenge = PkceChallenge::from_client("abc123").unwrap();
        let created = states.create("yandex", &challenge).await.unwrap();

        assert!(matches!(
            states.consume(&created.state_token).await,
            Err(AuthError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_state() {
        let states = store(Duration::from_secs(600));
        assert!(matches!(
            states.consume("never-issued").await,
            Err(AuthError::NotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_single_winner() {
        let states = store(Duration::from_secs(600));
        let challenge = PkceChallenge::from_client("abc123").unwrap();
        let created = states.create("github", &challenge).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let states = states.clone();
                let token = created.state_token.clone();
                tokio::spawn(async move { states.consume(&token).await.is_ok() })
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
