use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    ClosingStatus, EngineError, EntryType, LedgerEntry, MoneyCents, PostEntryCmd, ResultEngine,
    StartClosingCmd, YearEndClosingSnapshot, balance, closing, entries,
    util::{
        end_of_day, next_financial_year, normalize_optional_text, normalize_required_ref,
        validate_financial_year,
    },
};

use super::{Engine, with_tx};

/// Per-scope view of one financial year as of a cutoff instant.
struct YearView {
    /// Latest closing balance per scope.
    balances: BTreeMap<String, MoneyCents>,
    /// PNR references seen on each scope's entries.
    pnrs_by_scope: BTreeMap<String, BTreeSet<String>>,
}

/// The four frozen snapshot totals, derived from a [`YearView`].
struct YearAggregates {
    receivables: MoneyCents,
    advances: MoneyCents,
    customers_with_outstanding: i64,
    pending_items: i64,
}

fn checked_sum(total: MoneyCents, amount: MoneyCents) -> ResultEngine<MoneyCents> {
    total
        .checked_add(amount)
        .ok_or_else(|| EngineError::Integrity("aggregate balance overflow".to_string()))
}

fn aggregate(view: &YearView) -> ResultEngine<YearAggregates> {
    let mut receivables = MoneyCents::ZERO;
    let mut advances = MoneyCents::ZERO;
    let mut customers_with_outstanding: i64 = 0;
    let mut pending_pnrs: BTreeSet<&str> = BTreeSet::new();

    for (scope, balance) in &view.balances {
        if balance.is_positive() {
            receivables = checked_sum(receivables, *balance)?;
        } else if balance.is_negative() {
            advances = checked_sum(advances, balance.abs())?;
        }
        if !balance.is_zero() {
            customers_with_outstanding += 1;
            if let Some(pnrs) = view.pnrs_by_scope.get(scope) {
                pending_pnrs.extend(pnrs.iter().map(String::as_str));
            }
        }
    }

    Ok(YearAggregates {
        receivables,
        advances,
        customers_with_outstanding,
        pending_items: pending_pnrs.len() as i64,
    })
}

impl Engine {
    /// Opens the year-end closing: aggregates the receivables/advances
    /// picture as of the closing date into a DRAFT snapshot.
    ///
    /// Runs under the closing gate (write), so no posting interleaves with
    /// the aggregation, and inside one DB transaction, so an interrupted
    /// run leaves nothing behind. Every scope's balance chain is verified
    /// before its numbers enter the aggregates.
    pub async fn start_closing(&self, cmd: StartClosingCmd) -> ResultEngine<YearEndClosingSnapshot> {
        validate_financial_year(&cmd.financial_year)?;
        let created_by = normalize_required_ref(&cmd.created_by, "created_by user reference")?;
        let remarks = normalize_optional_text(cmd.remarks.as_deref());
        let financial_year = cmd.financial_year.clone();

        let _gate = self.closing_permit().await?;
        with_tx!(self, |db_tx| {
            let existing = closing::Entity::find()
                .filter(closing::Column::FinancialYear.eq(financial_year.as_str()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::State(format!(
                    "closing for {financial_year} already exists"
                )));
            }

            let view = self
                .year_view_in_tx(&db_tx, &financial_year, end_of_day(cmd.closing_date))
                .await?;
            let totals = aggregate(&view)?;

            let model = closing::ActiveModel {
                id: ActiveValue::NotSet,
                financial_year: ActiveValue::Set(financial_year.clone()),
                closing_date: ActiveValue::Set(cmd.closing_date),
                receivables_minor: ActiveValue::Set(totals.receivables.cents()),
                advance_minor: ActiveValue::Set(totals.advances.cents()),
                customers_with_outstanding: ActiveValue::Set(totals.customers_with_outstanding),
                pending_items: ActiveValue::Set(totals.pending_items),
                status: ActiveValue::Set(ClosingStatus::Draft.as_str().to_string()),
                remarks: ActiveValue::Set(remarks.clone()),
                created_by: ActiveValue::Set(created_by.clone()),
                created_at: ActiveValue::Set(Utc::now()),
                finalized_at: ActiveValue::Set(None),
                carried_forward_at: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;

            tracing::info!(
                financial_year = %financial_year,
                receivables = %totals.receivables,
                advances = %totals.advances,
                "year-end closing opened as draft"
            );
            YearEndClosingSnapshot::try_from(model)
        })
    }

    /// Freezes a DRAFT snapshot. From any other status this is a state
    /// error; the aggregates are never recomputed afterwards.
    pub async fn finalize(&self, financial_year: &str) -> ResultEngine<YearEndClosingSnapshot> {
        validate_financial_year(financial_year)?;
        with_tx!(self, |db_tx| {
            let model = self.snapshot_in_tx(&db_tx, financial_year).await?;
            let status = ClosingStatus::try_from(model.status.as_str())?;
            if status != ClosingStatus::Draft {
                return Err(EngineError::State(format!(
                    "closing for {financial_year} is {}, finalize requires DRAFT",
                    status.as_str()
                )));
            }

            let updated = closing::ActiveModel {
                id: ActiveValue::Set(model.id),
                status: ActiveValue::Set(ClosingStatus::Finalized.as_str().to_string()),
                finalized_at: ActiveValue::Set(Some(Utc::now())),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            YearEndClosingSnapshot::try_from(updated)
        })
    }

    /// Seeds the next financial year with one opening entry per scope that
    /// closed nonzero, then marks the snapshot CARRY_FORWARDED.
    ///
    /// Only valid from FINALIZED; a repeated call fails with a state error
    /// instead of double-posting. The balances are recomputed and checked
    /// against the frozen aggregates first, so postings that slipped in
    /// behind the snapshot fail the carry-forward instead of silently
    /// diverging from it. The whole step is one transaction.
    pub async fn carry_forward(
        &self,
        financial_year: &str,
        carried_by: &str,
    ) -> ResultEngine<YearEndClosingSnapshot> {
        validate_financial_year(financial_year)?;
        let carried_by = normalize_required_ref(carried_by, "carried_by user reference")?;
        let next_year = next_financial_year(financial_year)?;

        let _gate = self.closing_permit().await?;
        with_tx!(self, |db_tx| {
            let model = self.snapshot_in_tx(&db_tx, financial_year).await?;
            let status = ClosingStatus::try_from(model.status.as_str())?;
            match status {
                ClosingStatus::Finalized => {}
                ClosingStatus::Draft => {
                    return Err(EngineError::State(format!(
                        "closing for {financial_year} is DRAFT, finalize it before carrying forward"
                    )));
                }
                ClosingStatus::CarryForwarded => {
                    return Err(EngineError::State(format!(
                        "closing for {financial_year} was already carried forward"
                    )));
                }
            }

            let view = self
                .year_view_in_tx(&db_tx, financial_year, end_of_day(model.closing_date))
                .await?;

            // Entries posted after the closing was computed but still dated
            // within the cutoff would silently diverge the carried openings
            // from the frozen aggregates. Refuse rather than carry balances
            // the snapshot does not describe.
            let totals = aggregate(&view)?;
            if totals.receivables.cents() != model.receivables_minor
                || totals.advances.cents() != model.advance_minor
                || totals.customers_with_outstanding != model.customers_with_outstanding
                || totals.pending_items != model.pending_items
            {
                tracing::error!(
                    financial_year = %financial_year,
                    frozen_receivables = model.receivables_minor,
                    current_receivables = totals.receivables.cents(),
                    "ledger changed after closing was computed, refusing carry-forward"
                );
                return Err(EngineError::State(format!(
                    "ledger for {financial_year} no longer matches its finalized closing, \
                     entries were posted after the snapshot was computed"
                )));
            }

            for (scope, closing_balance) in &view.balances {
                if closing_balance.is_zero() {
                    continue;
                }
                let entry_type = if closing_balance.is_positive() {
                    EntryType::Debit
                } else {
                    EntryType::Credit
                };
                self.append_entry(
                    &db_tx,
                    &PostEntryCmd::new(
                        scope,
                        &next_year,
                        entry_type,
                        closing_balance.abs(),
                        format!("CF-{financial_year}"),
                        &carried_by,
                    )
                    .remarks(format!(
                        "opening balance carried forward from {financial_year}"
                    )),
                )
                .await?;
            }

            let updated = closing::ActiveModel {
                id: ActiveValue::Set(model.id),
                status: ActiveValue::Set(ClosingStatus::CarryForwarded.as_str().to_string()),
                carried_forward_at: ActiveValue::Set(Some(Utc::now())),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            tracing::info!(
                financial_year = %financial_year,
                next_year = %next_year,
                scopes = view.balances.len(),
                "closing balances carried forward"
            );
            YearEndClosingSnapshot::try_from(updated)
        })
    }

    /// Snapshots exist for audit; deleting one is an integrity violation at
    /// any status, logged and rejected without touching the database.
    pub fn delete_snapshot(&self, financial_year: &str) -> ResultEngine<()> {
        tracing::error!(
            financial_year,
            "refusing to delete year-end closing snapshot; snapshots are kept for audit"
        );
        Err(EngineError::Integrity(format!(
            "closing snapshot for {financial_year} can never be deleted"
        )))
    }

    pub async fn snapshot(&self, financial_year: &str) -> ResultEngine<YearEndClosingSnapshot> {
        let model = closing::Entity::find()
            .filter(closing::Column::FinancialYear.eq(financial_year))
            .one(&self.database)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("closing snapshot for {financial_year}"))
            })?;
        YearEndClosingSnapshot::try_from(model)
    }

    pub async fn list_snapshots(&self) -> ResultEngine<Vec<YearEndClosingSnapshot>> {
        let models = closing::Entity::find()
            .order_by_asc(closing::Column::FinancialYear)
            .all(&self.database)
            .await?;
        models
            .into_iter()
            .map(YearEndClosingSnapshot::try_from)
            .collect()
    }

    async fn snapshot_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        financial_year: &str,
    ) -> ResultEngine<closing::Model> {
        closing::Entity::find()
            .filter(closing::Column::FinancialYear.eq(financial_year))
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("closing snapshot for {financial_year}")))
    }

    /// Replays every stream of the year up to the cutoff, verifying each
    /// balance chain before trusting its closing balance. A broken chain is
    /// an integrity defect and aborts the whole step.
    async fn year_view_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        financial_year: &str,
        cutoff: DateTime<Utc>,
    ) -> ResultEngine<YearView> {
        let models = entries::Entity::find()
            .filter(entries::Column::FinancialYear.eq(financial_year))
            .filter(entries::Column::CreatedAt.lte(cutoff))
            .order_by_asc(entries::Column::ScopeRef)
            .order_by_asc(entries::Column::Id)
            .all(db_tx)
            .await?;

        let mut streams: BTreeMap<String, Vec<LedgerEntry>> = BTreeMap::new();
        for model in models {
            let entry = LedgerEntry::try_from(model)?;
            streams.entry(entry.scope_ref.clone()).or_default().push(entry);
        }

        let mut balances = BTreeMap::new();
        let mut pnrs_by_scope: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (scope, stream) in streams {
            if let Err(err) = balance::verify_chain(&stream) {
                tracing::error!(scope = %scope, %err, "balance chain verification failed");
                return Err(err);
            }
            let pnrs: BTreeSet<String> =
                stream.iter().filter_map(|e| e.pnr_id.clone()).collect();
            if !pnrs.is_empty() {
                pnrs_by_scope.insert(scope.clone(), pnrs);
            }
            if let Some(last) = stream.last() {
                balances.insert(scope, last.closing_balance);
            }
        }

        Ok(YearView {
            balances,
            pnrs_by_scope,
        })
    }
}
