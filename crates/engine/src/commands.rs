//! Command structs for engine operations.
//!
//! These types group parameters for write operations (posting, contra
//! creation, year-end closing), keeping call sites readable and avoiding
//! long argument lists.

use chrono::NaiveDate;

use crate::{EntryType, MoneyCents};

/// Append one ledger entry to a `(scope, financial year)` stream.
#[derive(Clone, Debug)]
pub struct PostEntryCmd {
    pub scope_ref: String,
    pub financial_year: String,
    pub entry_type: EntryType,
    pub amount: MoneyCents,
    pub entry_ref: String,
    pub remarks: Option<String>,
    pub pnr_id: Option<String>,
    pub payment_id: Option<String>,
    pub account_id: Option<String>,
    pub created_by: String,
}

impl PostEntryCmd {
    #[must_use]
    pub fn new(
        scope_ref: impl Into<String>,
        financial_year: impl Into<String>,
        entry_type: EntryType,
        amount: MoneyCents,
        entry_ref: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            scope_ref: scope_ref.into(),
            financial_year: financial_year.into(),
            entry_type,
            amount,
            entry_ref: entry_ref.into(),
            remarks: None,
            pnr_id: None,
            payment_id: None,
            account_id: None,
            created_by: created_by.into(),
        }
    }

    #[must_use]
    pub fn remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    #[must_use]
    pub fn pnr_id(mut self, pnr_id: impl Into<String>) -> Self {
        self.pnr_id = Some(pnr_id.into());
        self
    }

    #[must_use]
    pub fn payment_id(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id.into());
        self
    }

    #[must_use]
    pub fn account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

/// Create a contra entry: one transfer between two accounts, recorded as an
/// administrative row plus two linked ledger postings.
#[derive(Clone, Debug)]
pub struct CreateContraCmd {
    pub from_account: String,
    pub to_account: String,
    pub financial_year: String,
    pub date: NaiveDate,
    pub amount: MoneyCents,
    pub narration: String,
    pub ref_number: Option<String>,
    pub created_by: String,
}

impl CreateContraCmd {
    #[must_use]
    pub fn new(
        from_account: impl Into<String>,
        to_account: impl Into<String>,
        financial_year: impl Into<String>,
        date: NaiveDate,
        amount: MoneyCents,
        narration: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            from_account: from_account.into(),
            to_account: to_account.into(),
            financial_year: financial_year.into(),
            date,
            amount,
            narration: narration.into(),
            ref_number: None,
            created_by: created_by.into(),
        }
    }

    #[must_use]
    pub fn ref_number(mut self, ref_number: impl Into<String>) -> Self {
        self.ref_number = Some(ref_number.into());
        self
    }
}

/// Open the year-end closing for one financial year.
#[derive(Clone, Debug)]
pub struct StartClosingCmd {
    pub financial_year: String,
    pub closing_date: NaiveDate,
    pub remarks: Option<String>,
    pub created_by: String,
}

impl StartClosingCmd {
    #[must_use]
    pub fn new(
        financial_year: impl Into<String>,
        closing_date: NaiveDate,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            financial_year: financial_year.into(),
            closing_date,
            remarks: None,
            created_by: created_by.into(),
        }
    }

    #[must_use]
    pub fn remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }
}
