//! Contra entries: inter-account transfers.
//!
//! The `entry_no` unique index is the single authority against duplicate
//! contra numbers; the application retries generation on collision.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum ContraEntries {
    Table,
    Id,
    EntryNo,
    Date,
    FinancialYear,
    FromAccount,
    ToAccount,
    AmountMinor,
    Narration,
    RefNumber,
    Status,
    CreatedBy,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContraEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContraEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ContraEntries::EntryNo).string().not_null())
                    .col(ColumnDef::new(ContraEntries::Date).date().not_null())
                    .col(
                        ColumnDef::new(ContraEntries::FinancialYear)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContraEntries::FromAccount)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContraEntries::ToAccount).string().not_null())
                    .col(
                        ColumnDef::new(ContraEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContraEntries::Narration).string().not_null())
                    .col(ColumnDef::new(ContraEntries::RefNumber).string())
                    .col(ColumnDef::new(ContraEntries::Status).string().not_null())
                    .col(ColumnDef::new(ContraEntries::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(ContraEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-contra_entries-entry_no-unique")
                    .table(ContraEntries::Table)
                    .col(ContraEntries::EntryNo)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContraEntries::Table).to_owned())
            .await
    }
}
