//! Year-end closing snapshots, one per financial year.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum YearEndClosingSnapshots {
    Table,
    Id,
    FinancialYear,
    ClosingDate,
    ReceivablesMinor,
    AdvanceMinor,
    CustomersWithOutstanding,
    PendingItems,
    Status,
    Remarks,
    CreatedBy,
    CreatedAt,
    FinalizedAt,
    CarriedForwardAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(YearEndClosingSnapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::FinancialYear)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::ClosingDate)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::ReceivablesMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::AdvanceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::CustomersWithOutstanding)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::PendingItems)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::Status)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(YearEndClosingSnapshots::Remarks).string())
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::CreatedBy)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::FinalizedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(YearEndClosingSnapshots::CarriedForwardAt)
                            .timestamp_with_time_zone(),
                    )
                    .to_owned(),
            )
            .await?;

        // One closing per financial year.
        manager
            .create_index(
                Index::create()
                    .name("idx-year_end_closing_snapshots-financial_year-unique")
                    .table(YearEndClosingSnapshots::Table)
                    .col(YearEndClosingSnapshots::FinancialYear)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(YearEndClosingSnapshots::Table)
                    .to_owned(),
            )
            .await
    }
}
