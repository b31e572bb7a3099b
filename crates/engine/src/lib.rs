//! Accounting core for the farebook back office.
//!
//! The engine keeps an append-only, double-entry style ledger. Every entry
//! carries the opening and closing balance of its `(scope, financial year)`
//! stream, so the full balance history is readable without replaying and a
//! broken chain is detectable after the fact. On top of the ledger sit
//! contra entries (inter-account transfers recorded as a linked
//! credit/debit pair) and the year-end closing flow
//! (DRAFT → FINALIZED → CARRY_FORWARDED) that rolls closing balances into
//! the next financial year.
//!
//! Nothing in the ledger is ever updated or deleted; corrections are new
//! compensating entries.

pub mod balance;
pub mod closing;
pub mod commands;
pub mod contra;
pub mod entries;
pub mod error;
pub mod money;
pub mod ops;
pub(crate) mod util;

pub use closing::{ClosingStatus, YearEndClosingSnapshot};
pub use commands::{CreateContraCmd, PostEntryCmd, StartClosingCmd};
pub use contra::{ContraEntry, ContraStatus};
pub use entries::{EntryType, LedgerEntry};
pub use error::EngineError;
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder};

pub type ResultEngine<T> = Result<T, EngineError>;
