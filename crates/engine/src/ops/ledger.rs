use chrono::Utc;
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    EngineError, LedgerEntry, MoneyCents, PostEntryCmd, ResultEngine, balance, entries,
    util::{normalize_optional_text, normalize_required_ref, validate_financial_year},
};

use super::{CONFLICT_RETRIES, Engine, RETRY_BACKOFF, with_tx};

fn validate_post_cmd(mut cmd: PostEntryCmd) -> ResultEngine<PostEntryCmd> {
    if !cmd.amount.is_positive() {
        return Err(EngineError::Validation(format!(
            "amount must be > 0, got {}",
            cmd.amount
        )));
    }
    cmd.scope_ref = normalize_required_ref(&cmd.scope_ref, "scope reference")?;
    cmd.entry_ref = normalize_required_ref(&cmd.entry_ref, "entry reference")?;
    cmd.created_by = normalize_required_ref(&cmd.created_by, "created_by user reference")?;
    validate_financial_year(&cmd.financial_year)?;
    cmd.remarks = normalize_optional_text(cmd.remarks.as_deref());
    Ok(cmd)
}

impl Engine {
    /// Appends one immutable entry to the scope's ledger stream.
    ///
    /// The read-chain-append step runs under the scope's lock and inside a
    /// single DB transaction, so the new entry's opening balance always
    /// equals the previous entry's closing balance. Lock contention is
    /// retried a bounded number of times before surfacing as a retryable
    /// conflict.
    pub async fn post_entry(&self, cmd: PostEntryCmd) -> ResultEngine<LedgerEntry> {
        let cmd = validate_post_cmd(cmd)?;
        let mut attempt = 0;
        loop {
            match self.post_entry_once(&cmd).await {
                Err(err) if err.is_retryable() && attempt < CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(
                        scope = %cmd.scope_ref,
                        attempt,
                        "posting conflict, backing off"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn post_entry_once(&self, cmd: &PostEntryCmd) -> ResultEngine<LedgerEntry> {
        let _gate = self.posting_permit().await?;
        let _scope = self.lock_scope(&cmd.scope_ref).await?;
        with_tx!(self, |db_tx| self.append_entry(&db_tx, cmd).await)
    }

    /// Chains and inserts one entry inside an open transaction.
    ///
    /// Callers must hold the relevant scope lock (or the closing gate for
    /// write) so no other posting can read the same latest balance.
    pub(crate) async fn append_entry(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &PostEntryCmd,
    ) -> ResultEngine<LedgerEntry> {
        let previous_closing = self
            .latest_closing_in_tx(db_tx, &cmd.scope_ref, &cmd.financial_year)
            .await?;
        let (opening_balance, closing_balance) =
            balance::chain_balances(previous_closing, cmd.entry_type, cmd.amount)?;

        let entry = LedgerEntry {
            id: 0,
            scope_ref: cmd.scope_ref.clone(),
            financial_year: cmd.financial_year.clone(),
            entry_type: cmd.entry_type,
            entry_ref: cmd.entry_ref.clone(),
            amount: cmd.amount,
            opening_balance,
            closing_balance,
            remarks: cmd.remarks.clone(),
            pnr_id: cmd.pnr_id.clone(),
            payment_id: cmd.payment_id.clone(),
            account_id: cmd.account_id.clone(),
            created_by: cmd.created_by.clone(),
            created_at: Utc::now(),
        };
        let model = entry.insert_model().insert(db_tx).await?;
        LedgerEntry::try_from(model)
    }

    async fn latest_closing_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        scope_ref: &str,
        financial_year: &str,
    ) -> ResultEngine<MoneyCents> {
        let latest = entries::Entity::find()
            .filter(entries::Column::ScopeRef.eq(scope_ref))
            .filter(entries::Column::FinancialYear.eq(financial_year))
            .order_by_desc(entries::Column::Id)
            .one(db_tx)
            .await?;
        Ok(latest
            .map(|model| MoneyCents::new(model.closing_minor))
            .unwrap_or(MoneyCents::ZERO))
    }

    /// Returns the entries of one `(scope, financial year)` stream in
    /// creation order.
    pub async fn entries_for_scope(
        &self,
        scope_ref: &str,
        financial_year: &str,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        let models = entries::Entity::find()
            .filter(entries::Column::ScopeRef.eq(scope_ref))
            .filter(entries::Column::FinancialYear.eq(financial_year))
            .order_by_asc(entries::Column::Id)
            .all(&self.database)
            .await?;
        models.into_iter().map(LedgerEntry::try_from).collect()
    }

    pub async fn ledger_entry(&self, entry_id: i64) -> ResultEngine<LedgerEntry> {
        let model = entries::Entity::find_by_id(entry_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("ledger entry {entry_id}")))?;
        LedgerEntry::try_from(model)
    }

    /// The scope's current balance for a financial year: the closing balance
    /// of its latest entry, or zero for an empty stream.
    pub async fn scope_balance(
        &self,
        scope_ref: &str,
        financial_year: &str,
    ) -> ResultEngine<MoneyCents> {
        let latest = entries::Entity::find()
            .filter(entries::Column::ScopeRef.eq(scope_ref))
            .filter(entries::Column::FinancialYear.eq(financial_year))
            .order_by_desc(entries::Column::Id)
            .one(&self.database)
            .await?;
        Ok(latest
            .map(|model| MoneyCents::new(model.closing_minor))
            .unwrap_or(MoneyCents::ZERO))
    }

    /// Ledger entries are the audit trail. There is no delete path, and any
    /// attempt is an integrity violation, logged and rejected.
    pub fn delete_entry(&self, entry_id: i64) -> ResultEngine<()> {
        tracing::error!(
            entry_id,
            "refusing to delete ledger entry; the ledger is append-only"
        );
        Err(EngineError::Integrity(format!(
            "ledger entry {entry_id} can never be deleted"
        )))
    }
}
