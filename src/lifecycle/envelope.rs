use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::error::LifecycleError;
use crate::model::request::RequestEnvelope;
use crate::model::request_date::{RequestDate, RequestStatus, Shift};
use crate::model::status_log::NewLogEntry;
use crate::store::WfhStore;
use crate::utils::validation::{MAX_REASON_LEN, ensure_within_window, string_length_valid};

pub const CREATED_ACTION: &str = "Request has been created";

/// Staff whose applications skip `Pending Approval`.
#[derive(Debug, Clone, Default)]
pub struct AutoApprovePolicy {
    staff_ids: HashSet<u64>,
}

impl AutoApprovePolicy {
    pub fn new(staff_ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            staff_ids: staff_ids.into_iter().collect(),
        }
    }

    pub fn initial_status(&self, staff_id: u64) -> RequestStatus {
        if self.staff_ids.contains(&staff_id) {
            RequestStatus::Approved
        } else {
            RequestStatus::PendingApproval
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub staff_id: u64,
    pub apply_reason: String,
    pub dates: BTreeMap<NaiveDate, Shift>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedRequest {
    pub request: RequestEnvelope,
    pub dates: Vec<RequestDate>,
}

fn validate(application: &NewApplication, today: NaiveDate) -> Result<String, LifecycleError> {
    let apply_reason = application.apply_reason.trim();
    if !string_length_valid(apply_reason, 1, MAX_REASON_LEN) {
        return Err(LifecycleError::InvalidInput(format!(
            "apply_reason must be between 1 and {} characters.",
            MAX_REASON_LEN
        )));
    }
    if application.dates.is_empty() {
        return Err(LifecycleError::InvalidInput("No dates provided.".into()));
    }
    for date in application.dates.keys() {
        ensure_within_window(*date, today)?;
    }
    Ok(apply_reason.to_string())
}

/// Creates the envelope, then its dates, then the creation audit entry. A
/// failure after the envelope exists deletes it again.
pub async fn create_request(
    store: &dyn WfhStore,
    policy: &AutoApprovePolicy,
    application: NewApplication,
    today: NaiveDate,
) -> Result<CreatedRequest, LifecycleError> {
    let apply_reason = validate(&application, today)?;
    let staff_id = application.staff_id;

    let wanted: Vec<NaiveDate> = application.dates.keys().copied().collect();
    let clashes = store.active_dates_for_staff(staff_id, &wanted).await?;
    if !clashes.is_empty() {
        let mut taken: Vec<String> = clashes.iter().map(|r| r.request_date.to_string()).collect();
        taken.sort();
        taken.dedup();
        return Err(LifecycleError::InvalidInput(format!(
            "Staff {} already has a request for {}.",
            staff_id,
            taken.join(", ")
        )));
    }

    let request = store.insert_envelope(staff_id, today, &apply_reason).await?;
    let request_id = request.request_id;

    let rows: Vec<(NaiveDate, Shift)> = application.dates.into_iter().collect();
    let status = policy.initial_status(staff_id);

    let created = async {
        let dates = store.insert_dates(request_id, &rows, status).await?;
        store
            .append_log(NewLogEntry {
                request_id,
                action: CREATED_ACTION.to_string(),
                reason: Some(apply_reason.clone()),
            })
            .await?;
        Ok::<_, LifecycleError>(dates)
    }
    .await;

    match created {
        Ok(dates) => {
            info!(request_id, staff_id, dates = dates.len(), status = %status, "Request created");
            Ok(CreatedRequest { request, dates })
        }
        Err(e) => {
            error!(error = %e, request_id, staff_id, "Request creation failed, removing envelope");
            if let Err(cleanup) = store.delete_envelope(request_id).await {
                error!(error = %cleanup, request_id, "Failed to remove envelope");
            }
            Err(e)
        }
    }
}
