//! # 实体定义测试
//!
//! 测试身份相关实体定义的正确性

#[cfg(test)]
mod tests {
    use crate::{user_auth_providers, users};
    use sea_orm::{EntityName, Set};

    #[tokio::test]
    async fn test_user_creation() {
        let user = users::ActiveModel {
            display_name: Set("Ann".to_string()),
            email: Set("ann@example.com".to_string()),
            ..Default::default()
        };

        assert_eq!(user.display_name.as_ref(), "Ann");
        assert_eq!(user.email.as_ref(), "ann@example.com");
    }

    #[tokio::test]
    async fn test_binding_creation() {
        let binding = user_auth_providers::ActiveModel {
            user_id: Set(1),
            provider: Set("yandex".to_string()),
            provider_uid: Set("42".to_string()),
            name: Set("Ann".to_string()),
            ..Default::default()
        };

        assert_eq!(binding.provider.as_ref(), "yandex");
        assert_eq!(binding.provider_uid.as_ref(), "42");
        assert_eq!(binding.user_id.as_ref(), &1);
    }

    #[test]
    fn test_table_names() {
        assert_eq!(users::Entity.table_name(), "users");
        assert_eq!(user_auth_providers::Entity.table_name(), "user_auth_providers");
    }
}
