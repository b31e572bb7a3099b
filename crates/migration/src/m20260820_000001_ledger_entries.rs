//! Ledger entries: the append-only audit trail.
//!
//! Every row carries the opening and closing balance of its
//! `(scope_ref, financial_year)` stream at the moment it was appended.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    ScopeRef,
    FinancialYear,
    EntryType,
    EntryRef,
    AmountMinor,
    OpeningMinor,
    ClosingMinor,
    Remarks,
    PnrId,
    PaymentId,
    AccountId,
    CreatedBy,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerEntries::ScopeRef).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::FinancialYear)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::EntryType).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::EntryRef).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::OpeningMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::ClosingMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::Remarks).string())
                    .col(ColumnDef::new(LedgerEntries::PnrId).string())
                    .col(ColumnDef::new(LedgerEntries::PaymentId).string())
                    .col(ColumnDef::new(LedgerEntries::AccountId).string())
                    .col(ColumnDef::new(LedgerEntries::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Stream reads and latest-balance lookups are always keyed this way.
        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-scope_ref-financial_year")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::ScopeRef)
                    .col(LedgerEntries::FinancialYear)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-financial_year")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::FinancialYear)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await
    }
}
