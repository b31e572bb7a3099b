//! Balance calculation for ledger streams.
//!
//! Pure and deterministic: no I/O, no clock. The poster uses
//! [`chain_balances`] to derive each new entry's opening/closing pair from
//! the previous entry of the stream, and the closing engine uses
//! [`verify_chain`] to re-derive a whole stream before freezing aggregates.

use crate::{EngineError, EntryType, LedgerEntry, MoneyCents, ResultEngine};

/// Computes the closing balance for one entry.
///
/// DEBIT adds to the opening balance, CREDIT subtracts. Overflow is a
/// validation failure, not a wrapped balance.
pub fn closing_for(
    opening: MoneyCents,
    entry_type: EntryType,
    amount: MoneyCents,
) -> ResultEngine<MoneyCents> {
    let closing = match entry_type {
        EntryType::Debit => opening.checked_add(amount),
        EntryType::Credit => opening.checked_sub(amount),
    };
    closing.ok_or_else(|| EngineError::Validation("balance overflow".to_string()))
}

/// Derives the `(opening, closing)` pair for a new entry appended after
/// `previous_closing` (`MoneyCents::ZERO` for an empty stream).
pub fn chain_balances(
    previous_closing: MoneyCents,
    entry_type: EntryType,
    amount: MoneyCents,
) -> ResultEngine<(MoneyCents, MoneyCents)> {
    let opening = previous_closing;
    let closing = closing_for(opening, entry_type, amount)?;
    Ok((opening, closing))
}

/// Walks a stream in creation order and fails on the first broken link.
///
/// Checks both invariants the audit trail promises:
/// - every entry's closing balance equals its opening plus/minus its amount
/// - every entry's opening balance equals the previous entry's closing
pub fn verify_chain<'a, I>(entries: I) -> ResultEngine<()>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut previous_closing = MoneyCents::ZERO;
    for entry in entries {
        if entry.opening_balance != previous_closing {
            return Err(EngineError::Integrity(format!(
                "broken balance chain for scope {} at entry {}: opening {} != previous closing {}",
                entry.scope_ref, entry.id, entry.opening_balance, previous_closing
            )));
        }
        let expected = closing_for(entry.opening_balance, entry.entry_type, entry.amount)?;
        if entry.closing_balance != expected {
            return Err(EngineError::Integrity(format!(
                "inconsistent entry {} for scope {}: closing {} != expected {}",
                entry.id, entry.scope_ref, entry.closing_balance, expected
            )));
        }
        previous_closing = entry.closing_balance;
    }
    Ok(())
}
