//! Persistence seam for envelopes, request-dates and the status log.
//!
//! `MySqlStore` is the production backend. Tests run against `MemoryStore`,
//! which keeps the same atomicity guarantees behind a mutex.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::LifecycleError;
use crate::model::request::{ReasonChange, RequestEnvelope};
use crate::model::request_date::{RequestDate, RequestStatus, Shift};
use crate::model::status_log::{NewLogEntry, StatusLogEntry};

pub mod mysql;

#[cfg(test)]
pub mod memory;

pub use mysql::MySqlStore;

/// Selects the request-date rows a transition operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFilter {
    pub request_id: u64,
    /// `None` selects every date of the request.
    pub dates: Option<Vec<NaiveDate>>,
    pub shift: Option<Shift>,
}

impl DateFilter {
    pub fn all(request_id: u64) -> Self {
        Self {
            request_id,
            dates: None,
            shift: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateUpdate {
    pub request_date_id: u64,
    pub status: RequestStatus,
    pub rescind_reason: Option<String>,
    pub withdraw_reason: Option<String>,
}

/// Everything one lifecycle transition writes, committed as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub updates: Vec<DateUpdate>,
    /// `Some` overwrites the envelope's `reject_reason`.
    pub reject_reason: Option<Option<String>>,
    pub log: NewLogEntry,
}

/// Decides the plan from the locked rows. `Ok(None)` means nothing to do.
pub type PlanFn<'a> =
    dyn Fn(&[RequestDate]) -> Result<Option<TransitionPlan>, LifecycleError> + Send + Sync + 'a;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Matched rows as they are after the commit.
    pub dates: Vec<RequestDate>,
    pub log: Option<StatusLogEntry>,
}

#[async_trait]
pub trait WfhStore: Send + Sync {
    async fn insert_envelope(
        &self,
        staff_id: u64,
        creation_date: NaiveDate,
        apply_reason: &str,
    ) -> Result<RequestEnvelope, LifecycleError>;

    /// Only used to undo an envelope whose dates could not be created.
    async fn delete_envelope(&self, request_id: u64) -> Result<(), LifecycleError>;

    async fn find_envelope(&self, request_id: u64)
    -> Result<Option<RequestEnvelope>, LifecycleError>;

    async fn envelopes_by_staff(&self, staff_id: u64)
    -> Result<Vec<RequestEnvelope>, LifecycleError>;

    /// Idempotent setter; `Ok(None)` when the envelope does not exist.
    async fn replace_reject_reason(
        &self,
        request_id: u64,
        reason: Option<&str>,
    ) -> Result<Option<ReasonChange>, LifecycleError>;

    async fn insert_dates(
        &self,
        request_id: u64,
        dates: &[(NaiveDate, Shift)],
        status: RequestStatus,
    ) -> Result<Vec<RequestDate>, LifecycleError>;

    async fn dates_by_request_id(&self, request_id: u64)
    -> Result<Vec<RequestDate>, LifecycleError>;

    async fn dates_by_request_ids(
        &self,
        request_ids: &[u64],
    ) -> Result<Vec<RequestDate>, LifecycleError>;

    async fn dates_by_status(
        &self,
        request_id: u64,
        statuses: &[RequestStatus],
    ) -> Result<Vec<RequestDate>, LifecycleError>;

    /// Request-dates of `staff_id` on any of `dates` that are not terminal.
    async fn active_dates_for_staff(
        &self,
        staff_id: u64,
        dates: &[NaiveDate],
    ) -> Result<Vec<RequestDate>, LifecycleError>;

    /// Distinct request ids owning a `Pending Approval` date before `cutoff`.
    async fn stale_request_ids(&self, cutoff: NaiveDate) -> Result<Vec<u64>, LifecycleError>;

    /// Locks the rows matched by `filter`, asks `plan` what to write, and
    /// commits the date updates, envelope reason and audit entry together.
    /// Fails with `NotFound` when nothing matches.
    async fn transition(
        &self,
        filter: &DateFilter,
        plan: &PlanFn<'_>,
    ) -> Result<TransitionOutcome, LifecycleError>;

    async fn append_log(&self, entry: NewLogEntry) -> Result<StatusLogEntry, LifecycleError>;

    async fn logs_for_request(&self, request_id: u64)
    -> Result<Vec<StatusLogEntry>, LifecycleError>;
}

pub(crate) fn not_found_message(filter: &DateFilter) -> String {
    match &filter.dates {
        None => format!("No request dates found for request ID {}", filter.request_id),
        Some(_) => format!(
            "No matching request dates found for request ID {}",
            filter.request_id
        ),
    }
}
