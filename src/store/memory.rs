use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

use super::{DateFilter, PlanFn, TransitionOutcome, WfhStore, not_found_message};
use crate::error::LifecycleError;
use crate::model::request::{ReasonChange, RequestEnvelope};
use crate::model::request_date::{RequestDate, RequestStatus, Shift};
use crate::model::status_log::{NewLogEntry, StatusLogEntry};

/// Row selection the MySQL store does in its `WHERE` clause.
fn matches(filter: &DateFilter, row: &RequestDate) -> bool {
    row.request_id == filter.request_id
        && filter
            .dates
            .as_ref()
            .is_none_or(|dates| dates.contains(&row.request_date))
        && filter.shift.is_none_or(|shift| shift == row.request_shift)
}

#[derive(Default)]
struct Tables {
    envelopes: Vec<RequestEnvelope>,
    dates: Vec<RequestDate>,
    logs: Vec<StatusLogEntry>,
    next_request_id: u64,
    next_date_id: u64,
    next_log_id: u64,
    last_log_date: Option<NaiveDateTime>,
}

impl Tables {
    fn push_log(&mut self, entry: &NewLogEntry) -> StatusLogEntry {
        self.next_log_id += 1;
        let now = Utc::now().naive_utc();
        let log_date = match self.last_log_date {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_log_date = Some(log_date);

        let logged = StatusLogEntry {
            log_id: self.next_log_id,
            request_id: entry.request_id,
            log_date,
            action: entry.action.clone(),
            reason: entry.reason.clone(),
        };
        self.logs.push(logged.clone());
        logged
    }

    fn matching(&self, filter: &DateFilter) -> Vec<RequestDate> {
        let mut rows: Vec<_> = self.dates.iter().filter(|d| matches(filter, d)).cloned().collect();
        rows.sort_by_key(|d| (d.request_date, d.request_date_id));
        rows
    }
}

/// Test double for `WfhStore`; one mutex stands in for the DB transaction.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_date_inserts: AtomicBool,
    failing_transitions: Mutex<HashSet<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `insert_dates` fail.
    pub fn fail_date_inserts(&self) {
        self.fail_date_inserts.store(true, Ordering::SeqCst);
    }

    /// Makes transitions on `request_id` fail after planning, before commit.
    pub fn fail_transitions_for(&self, request_id: u64) {
        self.failing_transitions.lock().unwrap().insert(request_id);
    }

    /// Seeds an envelope with dates in the given statuses, bypassing validation.
    pub fn seed(
        &self,
        staff_id: u64,
        dates: &[(NaiveDate, Shift, RequestStatus)],
    ) -> (RequestEnvelope, Vec<RequestDate>) {
        let mut tables = self.tables.lock().unwrap();
        tables.next_request_id += 1;
        let envelope = RequestEnvelope {
            request_id: tables.next_request_id,
            staff_id,
            creation_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            apply_reason: "Seeded".into(),
            reject_reason: None,
        };
        tables.envelopes.push(envelope.clone());

        let mut rows = Vec::new();
        for (date, shift, status) in dates {
            tables.next_date_id += 1;
            let row = RequestDate {
                request_date_id: tables.next_date_id,
                request_id: envelope.request_id,
                request_date: *date,
                request_shift: *shift,
                request_status: *status,
                rescind_reason: None,
                withdraw_reason: None,
            };
            tables.dates.push(row.clone());
            rows.push(row);
        }
        (envelope, rows)
    }

    pub fn envelope(&self, request_id: u64) -> Option<RequestEnvelope> {
        let tables = self.tables.lock().unwrap();
        tables.envelopes.iter().find(|e| e.request_id == request_id).cloned()
    }

    pub fn all_dates(&self) -> Vec<RequestDate> {
        self.tables.lock().unwrap().dates.clone()
    }

    pub fn all_logs(&self) -> Vec<StatusLogEntry> {
        self.tables.lock().unwrap().logs.clone()
    }

    pub fn envelope_count(&self) -> usize {
        self.tables.lock().unwrap().envelopes.len()
    }
}

#[async_trait]
impl WfhStore for MemoryStore {
    async fn insert_envelope(
        &self,
        staff_id: u64,
        creation_date: NaiveDate,
        apply_reason: &str,
    ) -> Result<RequestEnvelope, LifecycleError> {
        let mut tables = self.tables.lock().unwrap();
        tables.next_request_id += 1;
        let envelope = RequestEnvelope {
            request_id: tables.next_request_id,
            staff_id,
            creation_date,
            apply_reason: apply_reason.to_string(),
            reject_reason: None,
        };
        tables.envelopes.push(envelope.clone());
        Ok(envelope)
    }

    async fn delete_envelope(&self, request_id: u64) -> Result<(), LifecycleError> {
        let mut tables = self.tables.lock().unwrap();
        tables.envelopes.retain(|e| e.request_id != request_id);
        tables.dates.retain(|d| d.request_id != request_id);
        Ok(())
    }

    async fn find_envelope(
        &self,
        request_id: u64,
    ) -> Result<Option<RequestEnvelope>, LifecycleError> {
        Ok(self.envelope(request_id))
    }

    async fn envelopes_by_staff(&self, staff_id: u64) -> Result<Vec<RequestEnvelope>, LifecycleError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .envelopes
            .iter()
            .filter(|e| e.staff_id == staff_id)
            .cloned()
            .collect())
    }

    async fn replace_reject_reason(
        &self,
        request_id: u64,
        reason: Option<&str>,
    ) -> Result<Option<ReasonChange>, LifecycleError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(envelope) = tables.envelopes.iter_mut().find(|e| e.request_id == request_id)
        else {
            return Ok(None);
        };
        let previous = std::mem::replace(&mut envelope.reject_reason, reason.map(str::to_string));
        Ok(Some(ReasonChange {
            request_id,
            previous_reject_reason: previous,
            reject_reason: envelope.reject_reason.clone(),
        }))
    }

    async fn insert_dates(
        &self,
        request_id: u64,
        dates: &[(NaiveDate, Shift)],
        status: RequestStatus,
    ) -> Result<Vec<RequestDate>, LifecycleError> {
        if self.fail_date_inserts.load(Ordering::SeqCst) {
            return Err(LifecycleError::Persistence("request_dates insert failed".into()));
        }

        let mut tables = self.tables.lock().unwrap();
        for (date, shift) in dates {
            tables.next_date_id += 1;
            let row = RequestDate {
                request_date_id: tables.next_date_id,
                request_id,
                request_date: *date,
                request_shift: *shift,
                request_status: status,
                rescind_reason: None,
                withdraw_reason: None,
            };
            tables.dates.push(row);
        }
        Ok(tables.matching(&DateFilter::all(request_id)))
    }

    async fn dates_by_request_id(&self, request_id: u64) -> Result<Vec<RequestDate>, LifecycleError> {
        Ok(self.tables.lock().unwrap().matching(&DateFilter::all(request_id)))
    }

    async fn dates_by_request_ids(
        &self,
        request_ids: &[u64],
    ) -> Result<Vec<RequestDate>, LifecycleError> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<_> = tables
            .dates
            .iter()
            .filter(|d| request_ids.contains(&d.request_id))
            .cloned()
            .collect();
        rows.sort_by_key(|d| (d.request_id, d.request_date));
        Ok(rows)
    }

    async fn dates_by_status(
        &self,
        request_id: u64,
        statuses: &[RequestStatus],
    ) -> Result<Vec<RequestDate>, LifecycleError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .matching(&DateFilter::all(request_id))
            .into_iter()
            .filter(|d| statuses.contains(&d.request_status))
            .collect())
    }

    async fn active_dates_for_staff(
        &self,
        staff_id: u64,
        dates: &[NaiveDate],
    ) -> Result<Vec<RequestDate>, LifecycleError> {
        let tables = self.tables.lock().unwrap();
        let owned: HashSet<u64> = tables
            .envelopes
            .iter()
            .filter(|e| e.staff_id == staff_id)
            .map(|e| e.request_id)
            .collect();
        Ok(tables
            .dates
            .iter()
            .filter(|d| owned.contains(&d.request_id))
            .filter(|d| dates.contains(&d.request_date) && !d.request_status.is_terminal())
            .cloned()
            .collect())
    }

    async fn stale_request_ids(&self, cutoff: NaiveDate) -> Result<Vec<u64>, LifecycleError> {
        let tables = self.tables.lock().unwrap();
        let mut ids: Vec<u64> = tables
            .dates
            .iter()
            .filter(|d| d.request_status == RequestStatus::PendingApproval && d.request_date < cutoff)
            .map(|d| d.request_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn transition(
        &self,
        filter: &DateFilter,
        plan: &PlanFn<'_>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let mut tables = self.tables.lock().unwrap();

        let current = tables.matching(filter);
        if current.is_empty() {
            return Err(LifecycleError::NotFound(not_found_message(filter)));
        }

        let Some(planned) = plan(&current)? else {
            return Ok(TransitionOutcome {
                dates: current,
                log: None,
            });
        };

        if self.failing_transitions.lock().unwrap().contains(&filter.request_id) {
            return Err(LifecycleError::Persistence(format!(
                "simulated failure for request {}",
                filter.request_id
            )));
        }

        for update in &planned.updates {
            if let Some(row) = tables
                .dates
                .iter_mut()
                .find(|d| d.request_date_id == update.request_date_id)
            {
                row.request_status = update.status;
                row.rescind_reason = update.rescind_reason.clone();
                row.withdraw_reason = update.withdraw_reason.clone();
            }
        }

        if let Some(reason) = &planned.reject_reason {
            if let Some(envelope) = tables
                .envelopes
                .iter_mut()
                .find(|e| e.request_id == planned.log.request_id)
            {
                envelope.reject_reason = reason.clone();
            }
        }

        let log = tables.push_log(&planned.log);
        Ok(TransitionOutcome {
            dates: tables.matching(filter),
            log: Some(log),
        })
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<StatusLogEntry, LifecycleError> {
        Ok(self.tables.lock().unwrap().push_log(&entry))
    }

    async fn logs_for_request(&self, request_id: u64) -> Result<Vec<StatusLogEntry>, LifecycleError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .logs
            .iter()
            .filter(|l| l.request_id == request_id)
            .cloned()
            .collect())
    }
}
