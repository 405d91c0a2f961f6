use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserAuthProviders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserAuthProviders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserAuthProviders::UserId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserAuthProviders::Provider)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserAuthProviders::ProviderUid)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserAuthProviders::Name)
                            .string_len(255)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(UserAuthProviders::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_auth_providers_user_id")
                            .from(UserAuthProviders::Table, UserAuthProviders::UserId)
                            .to(Users::Table, Users::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 并发首次登录依赖该唯一索引裁决
        manager
            .create_index(
                Index::create()
                    .name("idx_user_auth_providers_provider_uid")
                    .table(UserAuthProviders::Table)
                    .col(UserAuthProviders::Provider)
                    .col(UserAuthProviders::ProviderUid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_auth_providers_user_id")
                    .table(UserAuthProviders::Table)
                    .col(UserAuthProviders::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserAuthProviders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserAuthProviders {
    Table,
    Id,
    UserId,
    Provider,
    ProviderUid,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
