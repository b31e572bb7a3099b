//! Year-end closing snapshots.
//!
//! One [`YearEndClosingSnapshot`] per financial year freezes the aggregate
//! receivables/advances picture for audit. The status machine is strictly
//! forward-only:
//!
//! ```text
//! DRAFT -> FINALIZED -> CARRY_FORWARDED
//! ```
//!
//! Snapshots are never deleted, at any status. Once FINALIZED the aggregate
//! fields are frozen; the only permitted mutation is the single transition
//! to CARRY_FORWARDED.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosingStatus {
    Draft,
    Finalized,
    CarryForwarded,
}

impl ClosingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Finalized => "FINALIZED",
            Self::CarryForwarded => "CARRY_FORWARDED",
        }
    }
}

impl TryFrom<&str> for ClosingStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "DRAFT" => Ok(Self::Draft),
            "FINALIZED" => Ok(Self::Finalized),
            "CARRY_FORWARDED" => Ok(Self::CarryForwarded),
            other => Err(EngineError::Validation(format!(
                "invalid closing status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearEndClosingSnapshot {
    pub id: i64,
    pub financial_year: String,
    pub closing_date: NaiveDate,
    /// Sum of positive closing balances across all scopes.
    pub total_pending_receivables: MoneyCents,
    /// Absolute sum of negative (advance) closing balances.
    pub total_advance_balance: MoneyCents,
    /// Count of distinct scopes with a nonzero closing balance.
    pub total_customers_with_outstanding: i64,
    /// Count of distinct PNR references still tied to outstanding scopes.
    pub total_pending_items: i64,
    pub status: ClosingStatus,
    pub remarks: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub carried_forward_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "year_end_closing_snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub financial_year: String,
    pub closing_date: Date,
    pub receivables_minor: i64,
    pub advance_minor: i64,
    pub customers_with_outstanding: i64,
    pub pending_items: i64,
    pub status: String,
    pub remarks: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
    pub finalized_at: Option<DateTimeUtc>,
    pub carried_forward_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Snapshots exist for audit; no status makes them deletable.
    async fn before_delete<C>(self, _db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Err(DbErr::Custom(
            "year-end closing snapshots can never be deleted".to_string(),
        ))
    }
}

impl TryFrom<Model> for YearEndClosingSnapshot {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            financial_year: model.financial_year,
            closing_date: model.closing_date,
            total_pending_receivables: MoneyCents::new(model.receivables_minor),
            total_advance_balance: MoneyCents::new(model.advance_minor),
            total_customers_with_outstanding: model.customers_with_outstanding,
            total_pending_items: model.pending_items,
            status: ClosingStatus::try_from(model.status.as_str())?,
            remarks: model.remarks,
            created_by: model.created_by,
            created_at: model.created_at,
            finalized_at: model.finalized_at,
            carried_forward_at: model.carried_forward_at,
        })
    }
}
