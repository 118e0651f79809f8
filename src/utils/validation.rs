use chrono::{Months, NaiveDate};

use crate::error::LifecycleError;

/// `apply_reason`, `reject_reason`, `rescind_reason` and `withdraw_reason`
/// are all VARCHAR(100).
pub const MAX_REASON_LEN: usize = 100;

/// `status_log.action` is VARCHAR(255).
pub const MAX_ACTION_LEN: usize = 255;

pub fn string_length_valid(input: &str, min_length: usize, max_length: usize) -> bool {
    let len = input.chars().count();
    min_length <= len && len <= max_length
}

/// Dates a staff member may apply for: two months back to three months ahead.
pub fn application_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let earliest = today.checked_sub_months(Months::new(2)).unwrap_or(NaiveDate::MIN);
    let latest = today.checked_add_months(Months::new(3)).unwrap_or(NaiveDate::MAX);
    (earliest, latest)
}

pub fn ensure_within_window(date: NaiveDate, today: NaiveDate) -> Result<(), LifecycleError> {
    let (earliest, latest) = application_window(today);
    if date < earliest || date > latest {
        return Err(LifecycleError::InvalidInput(format!(
            "Date {} is outside the allowed range {} to {}.",
            date, earliest, latest
        )));
    }
    Ok(())
}

/// Trims the reason; blank counts as absent.
pub fn normalize_reason(reason: Option<&str>) -> Result<Option<String>, LifecycleError> {
    let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if !string_length_valid(reason, 1, MAX_REASON_LEN) {
        return Err(LifecycleError::InvalidInput(format!(
            "Reason must be at most {} characters.",
            MAX_REASON_LEN
        )));
    }
    Ok(Some(reason.to_string()))
}
