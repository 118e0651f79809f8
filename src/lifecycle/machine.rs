//! Status transitions for request-dates.
//!
//! ```text
//!   Pending Approval ──► Approved ──► Pending Withdrawal ──► Withdrawn
//!        │    │             │  ▲              │
//!        │    │             │  └──────────────┘ (revert)
//!        │    └──► Pending Cancellation ──► Rescinded
//!        └──► Rejected, Rescinded
//! ```
//!
//! `Withdrawn`, `Rescinded` and `Rejected` are terminal. Bulk transitions never
//! touch protected (`Withdrawn`, `Pending Withdrawal`) or terminal rows.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::LifecycleError;
use crate::model::request_date::{RequestDate, RequestStatus, Shift};
use crate::model::status_log::NewLogEntry;
use crate::store::{DateFilter, DateUpdate, TransitionOutcome, TransitionPlan, WfhStore};
use crate::utils::validation::{MAX_ACTION_LEN, normalize_reason};

pub fn can_transition(from: RequestStatus, to: RequestStatus) -> bool {
    use RequestStatus::*;

    match (from, to) {
        (current, next) if current == next => true,
        (
            PendingApproval,
            Approved | Rejected | PendingWithdrawal | PendingCancellation | Rescinded,
        ) => true,
        (Approved, Rescinded | PendingWithdrawal | Withdrawn | Rejected) => true,
        (PendingWithdrawal, Withdrawn | Approved) => true,
        (PendingCancellation, Rescinded | Approved | Rejected) => true,
        _ => false,
    }
}

/// Checks the reason rule before anything is read or written.
pub fn reason_for(
    status: RequestStatus,
    reason: Option<&str>,
) -> Result<Option<String>, LifecycleError> {
    let reason = normalize_reason(reason)?;
    if status.requires_reason() && reason.is_none() {
        return Err(LifecycleError::ReasonRequired(status));
    }
    Ok(reason)
}

/// Only one of the two reason columns is ever populated.
fn update_for(row: &RequestDate, status: RequestStatus, reason: Option<&String>) -> DateUpdate {
    let (rescind_reason, withdraw_reason) = match status {
        RequestStatus::Rescinded => (reason.cloned(), None),
        RequestStatus::Withdrawn | RequestStatus::PendingWithdrawal => (None, reason.cloned()),
        _ => (None, None),
    };
    DateUpdate {
        request_date_id: row.request_date_id,
        status,
        rescind_reason,
        withdraw_reason,
    }
}

fn is_noop(row: &RequestDate, update: &DateUpdate) -> bool {
    row.request_status == update.status
        && row.rescind_reason == update.rescind_reason
        && row.withdraw_reason == update.withdraw_reason
}

fn checked_update(
    row: &RequestDate,
    status: RequestStatus,
    reason: Option<&String>,
) -> Result<Option<DateUpdate>, LifecycleError> {
    if !can_transition(row.request_status, status) {
        return Err(LifecycleError::InvalidTransition {
            request_date_id: row.request_date_id,
            from: row.request_status,
            to: status,
        });
    }
    let update = update_for(row, status, reason);
    Ok((!is_noop(row, &update)).then_some(update))
}

/// How the all-dates transition records itself.
#[derive(Debug, Clone, Default)]
pub(crate) struct BulkAudit {
    /// Replaces the default "Request has been <status>" action.
    pub action: Option<String>,
    /// Commit nothing, and log nothing, when no row would change.
    pub skip_when_unchanged: bool,
}

/// Moves every unprotected, non-terminal date of `request_id` to `status`.
/// A rejection also stores `reason` as the envelope's `reject_reason`.
pub async fn apply_status_to_all_dates(
    store: &dyn WfhStore,
    request_id: u64,
    status: RequestStatus,
    reason: Option<&str>,
) -> Result<TransitionOutcome, LifecycleError> {
    apply_to_all(store, request_id, status, reason, BulkAudit::default()).await
}

pub(crate) async fn apply_to_all(
    store: &dyn WfhStore,
    request_id: u64,
    status: RequestStatus,
    reason: Option<&str>,
    audit: BulkAudit,
) -> Result<TransitionOutcome, LifecycleError> {
    let reason = reason_for(status, reason)?;
    let action = audit
        .action
        .clone()
        .unwrap_or_else(|| format!("Request has been {}", status.to_lowercase()));

    let plan = |rows: &[RequestDate]| -> Result<Option<TransitionPlan>, LifecycleError> {
        let mut updates = Vec::new();
        for row in rows {
            if row.request_status.is_protected() || row.request_status.is_terminal() {
                continue;
            }
            if let Some(update) = checked_update(row, status, reason.as_ref())? {
                updates.push(update);
            }
        }

        if updates.is_empty() && audit.skip_when_unchanged {
            return Ok(None);
        }

        Ok(Some(TransitionPlan {
            updates,
            reject_reason: (status == RequestStatus::Rejected).then(|| reason.clone()),
            log: NewLogEntry {
                request_id,
                action: action.clone(),
                reason: reason.clone(),
            },
        }))
    };

    let outcome = store
        .transition(&DateFilter::all(request_id), &plan)
        .await
        .inspect_err(|e| warn!(request_id, status = %status, error = %e, "All-dates transition failed"))?;

    info!(
        request_id,
        status = %status,
        logged = outcome.log.is_some(),
        "Applied status to all request dates"
    );
    Ok(outcome)
}

/// Audit action for a subset transition. Lists every date while that fits
/// `status_log.action`, otherwise names the count and the range.
fn subset_action(dates: &[NaiveDate], shift: Option<Shift>, status: RequestStatus) -> String {
    let suffix = match shift {
        Some(shift) => format!(" have been {} for the {} shift", status.to_lowercase(), shift),
        None => format!(" have been {}", status.to_lowercase()),
    };

    let listed: Vec<String> = dates.iter().map(NaiveDate::to_string).collect();
    let action = format!("Request date(s) {}{}", listed.join(", "), suffix);
    if action.chars().count() <= MAX_ACTION_LEN {
        return action;
    }

    match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => format!(
            "{} request date(s) from {} to {}{}",
            dates.len(),
            first,
            last,
            suffix
        ),
        _ => format!("Request date(s){}", suffix),
    }
}

/// Moves the dates of `request_id` listed in `dates` (and on `shift`, when
/// given) to `status`. Protected rows in the subset are eligible; the
/// envelope is never touched.
pub async fn apply_status_to_date_subset(
    store: &dyn WfhStore,
    request_id: u64,
    dates: &[NaiveDate],
    shift: Option<Shift>,
    status: RequestStatus,
    reason: Option<&str>,
) -> Result<TransitionOutcome, LifecycleError> {
    if dates.is_empty() {
        return Err(LifecycleError::InvalidInput("No dates provided.".into()));
    }
    let reason = reason_for(status, reason)?;

    let mut wanted = dates.to_vec();
    wanted.sort_unstable();
    wanted.dedup();
    let filter = DateFilter {
        request_id,
        dates: Some(wanted),
        shift,
    };

    let plan = |rows: &[RequestDate]| -> Result<Option<TransitionPlan>, LifecycleError> {
        let mut updates = Vec::new();
        for row in rows {
            if let Some(update) = checked_update(row, status, reason.as_ref())? {
                updates.push(update);
            }
        }

        let mut touched: Vec<NaiveDate> = rows.iter().map(|r| r.request_date).collect();
        touched.dedup();
        let action = subset_action(&touched, shift, status);

        Ok(Some(TransitionPlan {
            updates,
            reject_reason: None,
            log: NewLogEntry {
                request_id,
                action,
                reason: reason.clone(),
            },
        }))
    };

    let outcome = store
        .transition(&filter, &plan)
        .await
        .inspect_err(|e| warn!(request_id, status = %status, error = %e, "Partial transition failed"))?;

    info!(
        request_id,
        status = %status,
        dates = outcome.dates.len(),
        "Applied status to request date subset"
    );
    Ok(outcome)
}
