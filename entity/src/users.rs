//! # 用户实体定义
//!
//! 规范化身份（Identity）表的 Sea-ORM 实体模型

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub display_name: String,
    pub email: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_auth_providers::Entity")]
    UserAuthProviders,
}

impl Related<super::user_auth_providers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserAuthProviders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
