//! create identities table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Identities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Identities::UserId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Identities::DomainName).string())
                    .col(ColumnDef::new(Identities::ServerDomain).string())
                    .col(ColumnDef::new(Identities::PublicKey).string())
                    .col(ColumnDef::new(Identities::LastSeenOnline).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Identities::LastRouteRegistration)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(Identities::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Identities::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // one owner per label
        manager
            .create_index(
                Index::create()
                    .name("idx_identities_domain_name")
                    .table(Identities::Table)
                    .col(Identities::DomainName)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Identities::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Identities {
    Table,
    UserId,
    DomainName,
    ServerDomain,
    PublicKey,
    LastSeenOnline,
    LastRouteRegistration,
    CreatedAt,
    UpdatedAt,
}
