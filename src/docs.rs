use crate::api::reject_request::RejectRequest;
use crate::api::request::{CreateRequest, UpdateReason};
use crate::api::request_dates::{ChangeAllStatus, ChangePartialStatus, RequestIds};
use crate::api::status_log::AddEvent;
use crate::lifecycle::envelope::CreatedRequest;
use crate::lifecycle::reject::{RejectionReport, SagaStep, StepOutcome};
use crate::lifecycle::sweep::{SweepFailure, SweepReport};
use crate::model::request::{ReasonChange, RequestEnvelope};
use crate::model::request_date::{RequestDate, RequestStatus, Shift};
use crate::model::status_log::StatusLogEntry;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "WFH Scheduling Lifecycle API",
        version = "1.0.0",
        description = r#"
## Work-From-Home request lifecycle

Staff apply to work from home on specific dates and shifts. Each application
is a **request** (the envelope) owning one **request date** per day. Every
date moves through its own status lifecycle:

`Pending Approval` → `Approved` / `Rejected` / `Pending Cancellation` / `Rescinded`
`Approved` → `Pending Withdrawal` → `Withdrawn`

### 🔹 Services
- **Request**
  - Create applications, read them back, set the rejection reason
- **Request Dates**
  - Query dates, change the status of all or some dates, sweep stale pending requests
- **Status Log**
  - Append-only audit trail per request
- **Reject Requests**
  - Manager/director rejection spanning the three services above

### 📦 Response Format
- Success: `{code, message?, data}`
- Failure: `{code, message}`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::request::create_request,
        crate::api::request::get_request,
        crate::api::request::get_all_requests,
        crate::api::request::update_reason,

        crate::api::request_dates::get_by_request_id,
        crate::api::request_dates::get_request_dates_by_request_ids,
        crate::api::request_dates::get_pending,
        crate::api::request_dates::change_all_status,
        crate::api::request_dates::change_partial_status,
        crate::api::request_dates::auto_reject,

        crate::api::status_log::add_event,
        crate::api::status_log::get_logs,

        crate::api::reject_request::reject_request
    ),
    components(
        schemas(
            CreateRequest,
            UpdateReason,
            ChangeAllStatus,
            ChangePartialStatus,
            RequestIds,
            AddEvent,
            RejectRequest,
            RequestEnvelope,
            ReasonChange,
            RequestDate,
            RequestStatus,
            Shift,
            StatusLogEntry,
            CreatedRequest,
            SweepReport,
            SweepFailure,
            RejectionReport,
            SagaStep,
            StepOutcome
        )
    ),
    tags(
        (name = "Request", description = "Request envelope APIs"),
        (name = "Request Dates", description = "Per-date status lifecycle APIs"),
        (name = "Status Log", description = "Audit trail APIs"),
        (name = "Reject Requests", description = "Manager/director rejection"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert_eq!(paths.len(), 13);
        assert!(doc.paths.paths.contains_key("/reject_requests/reject_request"));
        assert!(doc.paths.paths.contains_key("/request_dates/auto_reject"));
    }
}
