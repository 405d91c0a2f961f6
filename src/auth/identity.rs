//! # 身份仓库
//!
//! `(provider, provider_uid)` 唯一映射到一个身份。首次登录时身份与绑定在同一原子操作中创建；
//! 绑定已存在时创建方得到 Conflict，由编排层重读绑定。

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::auth::types::{Identity, ProviderBinding, ProviderProfile, UserId};
use crate::error::{AuthError, Result};

/// 身份仓库接口
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// 按提供商账号查找绑定
    async fn find_binding(
        &self,
        provider: &str,
        provider_uid: &str,
    ) -> Result<Option<ProviderBinding>>;

    /// 原子创建身份与绑定；绑定已存在时返回 Conflict
    async fn create_identity_with_binding(
        &self,
        profile: &ProviderProfile,
    ) -> Result<ProviderBinding>;

    /// 按ID读取身份
    async fn get_identity(&self, id: UserId) -> Result<Option<Identity>>;
}

/// 由资料推导身份展示名：name，其次“名 姓”，再次邮箱
#[must_use]
pub fn display_name_for(profile: &ProviderProfile) -> String {
    if !profile.name.trim().is_empty() {
        return profile.name.trim().to_string();
    }
    let full = format!("{} {}", profile.first_name.trim(), profile.last_name.trim());
    if !full.trim().is_empty() {
        return full.trim().to_string();
    }
    profile.email.trim().to_string()
}

/// 冲突错误中的资源名
pub(crate) const BINDING_RESOURCE: &str = "provider_binding";

/// 冲突错误中的绑定标识
pub(crate) fn binding_identifier(provider: &str, provider_uid: &str) -> String {
    format!("{provider}:{provider_uid}")
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: UserId,
    identities: HashMap<UserId, Identity>,
    bindings: HashMap<(String, String), ProviderBinding>,
}

/// 内存身份仓库（测试与单机使用）
#[derive(Debug, Default)]
pub struct MemoryIdentityRepository {
    inner: Mutex<MemoryInner>,
}

impl MemoryIdentityRepository {
    /// 创建空仓库
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| AuthError::internal("身份仓库锁已中毒"))
    }

    /// 身份数量
    pub fn identity_count(&self) -> Result<usize> {
        Ok(self.lock()?.identities.len())
    }
}

#[async_trait]
impl IdentityRepository for MemoryIdentityRepository {
    async fn find_binding(
        &self,
        provider: &str,
        provider_uid: &str,
    ) -> Result<Option<ProviderBinding>> {
        let inner = self.lock()?;
        Ok(inner
            .bindings
            .get(&(provider.to_string(), provider_uid.to_string()))
            .cloned())
    }

    async fn create_identity_with_binding(
        &self,
        profile: &ProviderProfile,
    ) -> Result<ProviderBinding> {
        let mut inner = self.lock()?;
        let key = (profile.provider_name.clone(), profile.provider_id.clone());
        if inner.bindings.contains_key(&key) {
            return Err(AuthError::conflict(
                BINDING_RESOURCE,
                binding_identifier(&profile.provider_name, &profile.provider_id),
            ));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.identities.insert(
            id,
            Identity {
                id,
                display_name: display_name_for(profile),
                email: profile.email.clone(),
                created_at: Utc::now(),
            },
        );

        let binding = ProviderBinding {
            identity_id: id,
            provider_name: profile.provider_name.clone(),
            provider_uid: profile.provider_id.clone(),
            name: profile.name.clone(),
        };
        inner.bindings.insert(key, binding.clone());
        Ok(binding)
    }

    async fn get_identity(&self, id: UserId) -> Result<Option<Identity>> {
        Ok(self.lock()?.identities.get(&id).cloned())
    }
}
