//! Internal helpers for validation and financial-year handling.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{EngineError, ResultEngine};

/// Trim a required reference and reject empty values.
pub(crate) fn normalize_required_ref(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Validates a financial-year label of the form `"2024-25"`: a four-digit
/// start year followed by the two-digit year after it.
pub(crate) fn validate_financial_year(value: &str) -> ResultEngine<()> {
    let invalid = || {
        EngineError::Validation(format!(
            "invalid financial year '{value}', expected e.g. \"2024-25\""
        ))
    };

    let (start, end) = value.split_once('-').ok_or_else(invalid)?;
    if start.len() != 4 || end.len() != 2 {
        return Err(invalid());
    }
    let start: i32 = start.parse().map_err(|_| invalid())?;
    let end: i32 = end.parse().map_err(|_| invalid())?;
    if (start + 1).rem_euclid(100) != end {
        return Err(invalid());
    }
    Ok(())
}

/// `"2024-25"` -> `"2025-26"`.
pub(crate) fn next_financial_year(value: &str) -> ResultEngine<String> {
    validate_financial_year(value)?;
    let start: i32 = value[..4]
        .parse()
        .map_err(|_| EngineError::Validation(format!("invalid financial year '{value}'")))?;
    let next_start = start + 1;
    Ok(format!(
        "{next_start}-{:02}",
        (next_start + 1).rem_euclid(100)
    ))
}

/// The aggregation cutoff for a closing date: end of that day, UTC.
pub(crate) fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let time = date.and_hms_opt(23, 59, 59).unwrap_or_else(|| {
        // 23:59:59 exists on every calendar day.
        date.and_time(chrono::NaiveTime::MIN)
    });
    DateTime::from_naive_utc_and_offset(time, Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn financial_year_format_is_enforced() {
        assert!(validate_financial_year("2024-25").is_ok());
        assert!(validate_financial_year("1999-00").is_ok());
        assert!(validate_financial_year("2024-26").is_err());
        assert!(validate_financial_year("2024").is_err());
        assert!(validate_financial_year("24-25").is_err());
        assert!(validate_financial_year("2024-2025").is_err());
    }

    #[test]
    fn next_financial_year_rolls_over() {
        assert_eq!(next_financial_year("2024-25").unwrap(), "2025-26");
        assert_eq!(next_financial_year("1998-99").unwrap(), "1999-00");
    }

    #[test]
    fn required_refs_are_trimmed() {
        assert_eq!(
            normalize_required_ref("  ACC-1 ", "scope").unwrap(),
            "ACC-1"
        );
        assert!(normalize_required_ref("   ", "scope").is_err());
    }
}
