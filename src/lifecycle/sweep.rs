use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;

use super::machine::{BulkAudit, apply_to_all};
use crate::error::LifecycleError;
use crate::model::request_date::RequestStatus;
use crate::store::WfhStore;

pub const DEFAULT_STALE_THRESHOLD_DAYS: u64 = 60;
pub const AUTO_REJECT_REASON: &str = "1 or more date(s) have been auto-rejected by the system";
pub const AUTO_REJECT_ACTION: &str = "Request has been auto-rejected by the system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepFailure {
    pub request_id: u64,
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    pub count: usize,
    pub requests: Vec<u64>,
    pub failed: Vec<SweepFailure>,
}

/// Rejects every request that still has a `Pending Approval` date more than
/// `threshold_days` before `now`. A request that fails is recorded and the
/// sweep moves on to the next one.
pub async fn auto_reject_stale(
    store: &dyn WfhStore,
    now: NaiveDate,
    threshold_days: u64,
) -> Result<SweepReport, LifecycleError> {
    let cutoff = now.checked_sub_days(Days::new(threshold_days)).ok_or_else(|| {
        LifecycleError::InvalidInput(format!(
            "Stale threshold of {} days is out of range.",
            threshold_days
        ))
    })?;

    let stale = store.stale_request_ids(cutoff).await?;
    let mut report = SweepReport::default();

    for request_id in stale {
        let audit = BulkAudit {
            action: Some(AUTO_REJECT_ACTION.to_string()),
            skip_when_unchanged: true,
        };
        match apply_to_all(
            store,
            request_id,
            RequestStatus::Rejected,
            Some(AUTO_REJECT_REASON),
            audit,
        )
        .await
        {
            Ok(outcome) if outcome.log.is_some() => report.requests.push(request_id),
            Ok(_) => {}
            Err(e) => {
                error!(request_id, error = %e, "Auto-reject failed for request");
                report.failed.push(SweepFailure {
                    request_id,
                    code: e.code(),
                    message: e.to_string(),
                });
            }
        }
    }

    report.count = report.requests.len();
    info!(
        %cutoff,
        rejected = report.count,
        failed = report.failed.len(),
        "Auto-reject sweep finished"
    );
    Ok(report)
}
