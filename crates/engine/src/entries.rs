//! Ledger entry primitives.
//!
//! A [`LedgerEntry`] is one immutable financial event in the audit trail.
//! Every entry carries the opening/closing balance of its stream so the
//! whole history is self-verifying: for temporally adjacent entries in the
//! same stream, `opening_balance` equals the previous `closing_balance`.
//!
//! A stream is keyed by `(scope_ref, financial_year)`. Entries are
//! append-only: the entity hooks below reject updates and deletes at the
//! storage layer, not merely by convention.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Increases the tracked receivable/outstanding balance.
    Debit,
    /// Decreases it (a payment or adjustment reduces what is owed).
    Credit,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "DEBIT",
            Self::Credit => "CREDIT",
        }
    }
}

impl TryFrom<&str> for EntryType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "DEBIT" => Ok(Self::Debit),
            "CREDIT" => Ok(Self::Credit),
            other => Err(EngineError::Validation(format!(
                "invalid entry type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub scope_ref: String,
    pub financial_year: String,
    pub entry_type: EntryType,
    pub entry_ref: String,
    pub amount: MoneyCents,
    pub opening_balance: MoneyCents,
    pub closing_balance: MoneyCents,
    pub remarks: Option<String>,
    pub pnr_id: Option<String>,
    pub payment_id: Option<String>,
    pub account_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub scope_ref: String,
    pub financial_year: String,
    pub entry_type: String,
    pub entry_ref: String,
    pub amount_minor: i64,
    pub opening_minor: i64,
    pub closing_minor: i64,
    pub remarks: Option<String>,
    pub pnr_id: Option<String>,
    pub payment_id: Option<String>,
    pub account_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// The ledger is the audit trail: rows may be inserted, never rewritten.
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            Ok(self)
        } else {
            Err(DbErr::Custom(
                "ledger entries are append-only and can never be updated".to_string(),
            ))
        }
    }

    async fn before_delete<C>(self, _db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Err(DbErr::Custom(
            "ledger entries can never be deleted".to_string(),
        ))
    }
}

impl LedgerEntry {
    /// Builds the insert model for a new entry. The `id` stays unset so the
    /// database assigns the next monotonic value.
    pub(crate) fn insert_model(&self) -> ActiveModel {
        ActiveModel {
            id: ActiveValue::NotSet,
            scope_ref: ActiveValue::Set(self.scope_ref.clone()),
            financial_year: ActiveValue::Set(self.financial_year.clone()),
            entry_type: ActiveValue::Set(self.entry_type.as_str().to_string()),
            entry_ref: ActiveValue::Set(self.entry_ref.clone()),
            amount_minor: ActiveValue::Set(self.amount.cents()),
            opening_minor: ActiveValue::Set(self.opening_balance.cents()),
            closing_minor: ActiveValue::Set(self.closing_balance.cents()),
            remarks: ActiveValue::Set(self.remarks.clone()),
            pnr_id: ActiveValue::Set(self.pnr_id.clone()),
            payment_id: ActiveValue::Set(self.payment_id.clone()),
            account_id: ActiveValue::Set(self.account_id.clone()),
            created_by: ActiveValue::Set(self.created_by.clone()),
            created_at: ActiveValue::Set(self.created_at),
        }
    }
}

impl TryFrom<Model> for LedgerEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            scope_ref: model.scope_ref,
            financial_year: model.financial_year,
            entry_type: EntryType::try_from(model.entry_type.as_str())?,
            entry_ref: model.entry_ref,
            amount: MoneyCents::new(model.amount_minor),
            opening_balance: MoneyCents::new(model.opening_minor),
            closing_balance: MoneyCents::new(model.closing_minor),
            remarks: model.remarks,
            pnr_id: model.pnr_id,
            payment_id: model.payment_id,
            account_id: model.account_id,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
