use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, SqlErr, TransactionTrait, prelude::*};

use crate::{
    ContraEntry, ContraStatus, CreateContraCmd, EngineError, EntryType, PostEntryCmd,
    ResultEngine, contra,
    util::{normalize_optional_text, normalize_required_ref, validate_financial_year},
};

use super::{CONFLICT_RETRIES, Engine, RETRY_BACKOFF, with_tx};

fn validate_contra_cmd(mut cmd: CreateContraCmd) -> ResultEngine<CreateContraCmd> {
    cmd.from_account = normalize_required_ref(&cmd.from_account, "from account")?;
    cmd.to_account = normalize_required_ref(&cmd.to_account, "to account")?;
    if cmd.from_account == cmd.to_account {
        return Err(EngineError::Validation(format!(
            "from and to account must differ, both are {}",
            cmd.from_account
        )));
    }
    if !cmd.amount.is_positive() {
        return Err(EngineError::Validation(format!(
            "amount must be > 0, got {}",
            cmd.amount
        )));
    }
    cmd.narration = normalize_required_ref(&cmd.narration, "narration")?;
    cmd.created_by = normalize_required_ref(&cmd.created_by, "created_by user reference")?;
    validate_financial_year(&cmd.financial_year)?;
    cmd.ref_number = normalize_optional_text(cmd.ref_number.as_deref());
    Ok(cmd)
}

impl Engine {
    /// Records an inter-account transfer: one contra row plus two linked
    /// ledger postings, committed together or not at all.
    ///
    /// The source account is CREDITed (its outstanding balance shrinks by
    /// the transferred amount) and the destination DEBITed, both postings
    /// tagged with the generated `entry_no`.
    pub async fn create_contra(&self, cmd: CreateContraCmd) -> ResultEngine<ContraEntry> {
        let cmd = validate_contra_cmd(cmd)?;
        let mut attempt = 0;
        loop {
            match self.create_contra_once(&cmd).await {
                Err(err) if err.is_retryable() && attempt < CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(
                        from = %cmd.from_account,
                        to = %cmd.to_account,
                        attempt,
                        "contra conflict, backing off"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn create_contra_once(&self, cmd: &CreateContraCmd) -> ResultEngine<ContraEntry> {
        let _gate = self.posting_permit().await?;
        let _scopes = self
            .lock_scope_pair(&cmd.from_account, &cmd.to_account)
            .await?;

        with_tx!(self, |db_tx| {
            let now = Utc::now();
            let entry = ContraEntry {
                id: 0,
                entry_no: contra::next_entry_no(now),
                date: cmd.date,
                financial_year: cmd.financial_year.clone(),
                from_account: cmd.from_account.clone(),
                to_account: cmd.to_account.clone(),
                amount: cmd.amount,
                narration: cmd.narration.clone(),
                ref_number: cmd.ref_number.clone(),
                status: ContraStatus::Active,
                created_by: cmd.created_by.clone(),
                created_at: now,
            };
            // A clash on the unique entry_no index comes back as a retryable
            // conflict so the outer loop tries again with a fresh number.
            let model = match entry.insert_model().insert(&db_tx).await {
                Ok(model) => model,
                Err(err)
                    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
                {
                    return Err(EngineError::Conflict(format!(
                        "contra number {} already taken",
                        entry.entry_no
                    )));
                }
                Err(err) => return Err(err.into()),
            };
            let entry = ContraEntry::try_from(model)?;

            self.append_entry(
                &db_tx,
                &PostEntryCmd::new(
                    &entry.from_account,
                    &entry.financial_year,
                    EntryType::Credit,
                    entry.amount,
                    &entry.entry_no,
                    &entry.created_by,
                )
                .remarks(format!("contra to {}: {}", entry.to_account, entry.narration)),
            )
            .await?;
            self.append_entry(
                &db_tx,
                &PostEntryCmd::new(
                    &entry.to_account,
                    &entry.financial_year,
                    EntryType::Debit,
                    entry.amount,
                    &entry.entry_no,
                    &entry.created_by,
                )
                .remarks(format!(
                    "contra from {}: {}",
                    entry.from_account, entry.narration
                )),
            )
            .await?;

            Ok(entry)
        })
    }

    /// Soft status change. The ledger postings already made are untouched;
    /// use [`Engine::reverse_contra`] to compensate them explicitly.
    pub async fn set_contra_status(
        &self,
        contra_id: i64,
        status: ContraStatus,
    ) -> ResultEngine<ContraEntry> {
        with_tx!(self, |db_tx| {
            let model = contra::Entity::find_by_id(contra_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("contra entry {contra_id}")))?;

            let updated = contra::ActiveModel {
                id: ActiveValue::Set(model.id),
                status: ActiveValue::Set(status.as_str().to_string()),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            ContraEntry::try_from(updated)
        })
    }

    /// Reverses an active contra by posting an explicit compensating pair
    /// (DEBIT back on the source, CREDIT on the destination), then marks the
    /// contra inactive. The original postings stay in the audit trail.
    pub async fn reverse_contra(
        &self,
        contra_id: i64,
        reversed_by: &str,
    ) -> ResultEngine<ContraEntry> {
        let reversed_by = normalize_required_ref(reversed_by, "reversed_by user reference")?;
        let mut attempt = 0;
        loop {
            match self.reverse_contra_once(contra_id, &reversed_by).await {
                Err(err) if err.is_retryable() && attempt < CONFLICT_RETRIES => {
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn reverse_contra_once(
        &self,
        contra_id: i64,
        reversed_by: &str,
    ) -> ResultEngine<ContraEntry> {
        let _gate = self.posting_permit().await?;

        // Look the contra up first so we know which scopes to lock.
        let model = contra::Entity::find_by_id(contra_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("contra entry {contra_id}")))?;
        let entry = ContraEntry::try_from(model)?;
        let _scopes = self
            .lock_scope_pair(&entry.from_account, &entry.to_account)
            .await?;

        with_tx!(self, |db_tx| {
            // Re-read under the locks; the status may have moved.
            let model = contra::Entity::find_by_id(contra_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("contra entry {contra_id}")))?;
            let entry = ContraEntry::try_from(model)?;
            if entry.status != ContraStatus::Active {
                return Err(EngineError::State(format!(
                    "contra {} is {}, only active contras can be reversed",
                    entry.entry_no,
                    entry.status.as_str()
                )));
            }

            self.append_entry(
                &db_tx,
                &PostEntryCmd::new(
                    &entry.from_account,
                    &entry.financial_year,
                    EntryType::Debit,
                    entry.amount,
                    &entry.entry_no,
                    reversed_by,
                )
                .remarks(format!("reversal of contra {}", entry.entry_no)),
            )
            .await?;
            self.append_entry(
                &db_tx,
                &PostEntryCmd::new(
                    &entry.to_account,
                    &entry.financial_year,
                    EntryType::Credit,
                    entry.amount,
                    &entry.entry_no,
                    reversed_by,
                )
                .remarks(format!("reversal of contra {}", entry.entry_no)),
            )
            .await?;

            let updated = contra::ActiveModel {
                id: ActiveValue::Set(entry.id),
                status: ActiveValue::Set(ContraStatus::Inactive.as_str().to_string()),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            ContraEntry::try_from(updated)
        })
    }

    pub async fn contra(&self, contra_id: i64) -> ResultEngine<ContraEntry> {
        let model = contra::Entity::find_by_id(contra_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("contra entry {contra_id}")))?;
        ContraEntry::try_from(model)
    }

    pub async fn contra_by_entry_no(&self, entry_no: &str) -> ResultEngine<ContraEntry> {
        let model = contra::Entity::find()
            .filter(contra::Column::EntryNo.eq(entry_no))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("contra entry {entry_no}")))?;
        ContraEntry::try_from(model)
    }

    /// Lists contra entries, newest first. Soft-deleted rows are hidden
    /// unless asked for.
    pub async fn list_contras(&self, include_deleted: bool) -> ResultEngine<Vec<ContraEntry>> {
        let mut query = contra::Entity::find().order_by_desc(contra::Column::Id);
        if !include_deleted {
            query = query.filter(contra::Column::Status.ne(ContraStatus::Deleted.as_str()));
        }
        let models = query.all(&self.database).await?;
        models.into_iter().map(ContraEntry::try_from).collect()
    }
}
