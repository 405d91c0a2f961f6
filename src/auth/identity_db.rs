//! # 数据库身份仓库
//!
//! 基于 sea-orm 的实现。身份与绑定在同一事务中写入，
//! 并发首次登录由 `(provider, provider_uid)` 唯一索引裁决。

use async_trait::async_trait;
use chrono::Utc;
use entity::{UserAuthProviders, Users, user_auth_providers, users};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr, TransactionTrait,
};

use super::identity::{
    BINDING_RESOURCE, IdentityRepository, binding_identifier, display_name_for,
};
use crate::auth::types::{Identity, ProviderBinding, ProviderProfile, UserId};
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 数据库身份仓库
#[derive(Debug, Clone)]
pub struct DbIdentityRepository {
    db: DatabaseConnection,
}

impl DbIdentityRepository {
    /// 创建仓库
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_binding(model: user_auth_providers::Model) -> ProviderBinding {
    ProviderBinding {
        identity_id: model.user_id,
        provider_name: model.provider,
        provider_uid: model.provider_uid,
        name: model.name,
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[async_trait]
impl IdentityRepository for DbIdentityRepository {
    async fn find_binding(
        &self,
        provider: &str,
        provider_uid: &str,
    ) -> Result<Option<ProviderBinding>> {
        let model = UserAuthProviders::find()
            .filter(user_auth_providers::Column::Provider.eq(provider))
            .filter(user_auth_providers::Column::ProviderUid.eq(provider_uid))
            .one(&self.db)
            .await
            .map_err(|e| AuthError::database_with_source("查询登录绑定失败", e))?;

        Ok(model.map(to_binding))
    }

    async fn create_identity_with_binding(
        &self,
        profile: &ProviderProfile,
    ) -> Result<ProviderBinding> {
        let now = Utc::now().naive_utc();
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AuthError::database_with_source("开启事务失败", e))?;

        let user = users::ActiveModel {
            display_name: Set(display_name_for(profile)),
            email: Set(profile.email.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| AuthError::database_with_source("创建用户失败", e))?;

        let inserted = user_auth_providers::ActiveModel {
            user_id: Set(user.id),
            provider: Set(profile.provider_name.clone()),
            provider_uid: Set(profile.provider_id.clone()),
            name: Set(profile.name.clone()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        match inserted {
            Ok(model) => {
                txn.commit()
                    .await
                    .map_err(|e| AuthError::database_with_source("提交事务失败", e))?;
                ldebug!(
                    "system",
                    LogStage::IdentityResolve,
                    LogComponent::Database,
                    "identity_created",
                    "身份与绑定已创建",
                    user_id = user.id,
                    provider = %profile.provider_name
                );
                Ok(to_binding(model))
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    lwarn!(
                        "system",
                        LogStage::Db,
                        LogComponent::Database,
                        "rollback_failed",
                        "事务回滚失败",
                        error = %rollback_err
                    );
                }
                if is_unique_violation(&err) {
                    Err(AuthError::conflict_with_source(
                        BINDING_RESOURCE,
                        binding_identifier(&profile.provider_name, &profile.provider_id),
                        err,
                    ))
                } else {
                    Err(AuthError::database_with_source("创建登录绑定失败", err))
                }
            }
        }
    }

    async fn get_identity(&self, id: UserId) -> Result<Option<Identity>> {
        let model = Users::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| AuthError::database_with_source("查询用户失败", e))?;

        Ok(model.map(|user| Identity {
            id: user.id,
            display_name: user.display_name,
            email: user.email,
            created_at: user.created_at.and_utc(),
        }))
    }
}
