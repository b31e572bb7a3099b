//! Contra entries: inter-account transfers.
//!
//! A [`ContraEntry`] is one administrative record that drives two linked
//! ledger postings (CREDIT on the source account, DEBIT on the destination),
//! both tagged with the contra's `entry_no`.
//!
//! The status is soft state only. `Deleted` hides the record from listings;
//! it never removes the row and never reverses the ledger effects already
//! posted. Reversal is its own operation and posts a new compensating pair.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContraStatus {
    Active,
    Inactive,
    Deleted,
}

impl ContraStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Deleted => "deleted",
        }
    }
}

impl TryFrom<&str> for ContraStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "deleted" => Ok(Self::Deleted),
            other => Err(EngineError::Validation(format!(
                "invalid contra status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContraEntry {
    pub id: i64,
    pub entry_no: String,
    pub date: NaiveDate,
    pub financial_year: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: MoneyCents,
    pub narration: String,
    pub ref_number: Option<String>,
    pub status: ContraStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Generates a candidate contra entry number.
///
/// The timestamp keeps numbers sortable and the uuid suffix makes collisions
/// unlikely, but the unique index on `entry_no` is the authority: a clash
/// fails the insert rather than silently reusing a number.
pub(crate) fn next_entry_no(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "CN-{}-{}",
        now.format("%Y%m%d%H%M%S"),
        &suffix[..6].to_uppercase()
    )
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "contra_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub entry_no: String,
    pub date: Date,
    pub financial_year: String,
    pub from_account: String,
    pub to_account: String,
    pub amount_minor: i64,
    pub narration: String,
    pub ref_number: Option<String>,
    pub status: String,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Contra rows carry soft state; `Deleted` is a status value, never a
    /// row removal.
    async fn before_delete<C>(self, _db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Err(DbErr::Custom(
            "contra entries are soft-deleted via status, never removed".to_string(),
        ))
    }
}

impl ContraEntry {
    pub(crate) fn insert_model(&self) -> ActiveModel {
        ActiveModel {
            id: ActiveValue::NotSet,
            entry_no: ActiveValue::Set(self.entry_no.clone()),
            date: ActiveValue::Set(self.date),
            financial_year: ActiveValue::Set(self.financial_year.clone()),
            from_account: ActiveValue::Set(self.from_account.clone()),
            to_account: ActiveValue::Set(self.to_account.clone()),
            amount_minor: ActiveValue::Set(self.amount.cents()),
            narration: ActiveValue::Set(self.narration.clone()),
            ref_number: ActiveValue::Set(self.ref_number.clone()),
            status: ActiveValue::Set(self.status.as_str().to_string()),
            created_by: ActiveValue::Set(self.created_by.clone()),
            created_at: ActiveValue::Set(self.created_at),
        }
    }
}

impl TryFrom<Model> for ContraEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            entry_no: model.entry_no,
            date: model.date,
            financial_year: model.financial_year,
            from_account: model.from_account,
            to_account: model.to_account,
            amount: MoneyCents::new(model.amount_minor),
            narration: model.narration,
            ref_number: model.ref_number,
            status: ContraStatus::try_from(model.status.as_str())?,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
