//! Creates the table recording which bootstrap changes have been applied.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BootstrapMigrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BootstrapMigrations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    // JSON array of change identifiers, in the order they were applied
                    .col(
                        ColumnDef::new(BootstrapMigrations::Changes)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(BootstrapMigrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BootstrapMigrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bootstrap_migrations_created_at")
                    .table(BootstrapMigrations::Table)
                    .col(BootstrapMigrations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BootstrapMigrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BootstrapMigrations {
    Table,
    Id,
    Changes,
    CreatedAt,
    UpdatedAt,
}
