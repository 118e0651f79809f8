use std::collections::BTreeMap;

use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::error::LifecycleError;
use crate::lifecycle::{AutoApprovePolicy, NewApplication, create_request as create_envelope};
use crate::model::request_date::{RequestStatus, Shift};
use crate::store::WfhStore;
use crate::utils::validation::normalize_reason;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRequest {
    #[schema(example = 150488)]
    pub staff_id: Option<u64>,
    #[schema(example = "Family event")]
    pub apply_reason: Option<String>,
    /// date => shift (`AM`, `PM` or `Full`)
    #[schema(value_type = Object, example = json!({"2024-09-24": "PM", "2024-09-25": "Full"}))]
    pub dates: Option<BTreeMap<NaiveDate, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdateReason {
    #[schema(example = 1)]
    pub request_id: Option<u64>,
    #[schema(example = "Rejected")]
    pub status: Option<String>,
    #[schema(example = "Insufficient manpower")]
    pub reason: Option<String>,
}

/// Submit a WFH application
#[utoipa::path(
    post,
    path = "/request/create",
    request_body = CreateRequest,
    responses(
        (status = 200, description = "Request created", body = Object, example = json!({
            "code": 200,
            "message": "Request created successfully.",
            "data": {"request": {"request_id": 1}, "dates": []}
        })),
        (status = 400, description = "Invalid input, date outside the allowed range or already requested"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Request"
)]
pub async fn create_request(
    store: web::Data<dyn WfhStore>,
    policy: web::Data<AutoApprovePolicy>,
    payload: web::Json<CreateRequest>,
) -> Result<HttpResponse, LifecycleError> {
    let payload = payload.into_inner();
    let (Some(staff_id), Some(apply_reason), Some(raw_dates)) =
        (payload.staff_id, payload.apply_reason, payload.dates)
    else {
        return Err(LifecycleError::InvalidInput(
            "Staff ID, apply reason or dates not provided.".into(),
        ));
    };

    let mut dates = BTreeMap::new();
    for (date, shift) in raw_dates {
        dates.insert(date, Shift::parse(&shift)?);
    }

    let application = NewApplication {
        staff_id,
        apply_reason,
        dates,
    };
    let today = Local::now().date_naive();
    let created = create_envelope(store.get_ref(), policy.get_ref(), application, today).await?;

    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "message": "Request created successfully.",
        "data": created
    })))
}

/// Get one request envelope
#[utoipa::path(
    get,
    path = "/request/get_request/{request_id}",
    params(
        ("request_id" = u64, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request found", body = Object),
        (status = 404, description = "Request not found", body = Object, example = json!({
            "code": 404,
            "message": "Request ID 9 not found."
        }))
    ),
    tag = "Request"
)]
pub async fn get_request(
    store: web::Data<dyn WfhStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, LifecycleError> {
    let request_id = path.into_inner();

    match store.find_envelope(request_id).await? {
        Some(envelope) => Ok(HttpResponse::Ok().json(json!({
            "code": 200,
            "data": envelope
        }))),
        None => Err(LifecycleError::NotFound(format!(
            "Request ID {} not found.",
            request_id
        ))),
    }
}

/// Get all requests of a staff member
#[utoipa::path(
    get,
    path = "/request/get_all_requests/{staff_id}",
    params(
        ("staff_id" = u64, Path, description = "Staff ID")
    ),
    responses(
        (status = 200, description = "Requests of the staff member", body = Object)
    ),
    tag = "Request"
)]
pub async fn get_all_requests(
    store: web::Data<dyn WfhStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, LifecycleError> {
    let envelopes = store.envelopes_by_staff(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "data": envelopes
    })))
}

/// Set the request-level rejection reason
#[utoipa::path(
    put,
    path = "/request/update_reason",
    request_body = UpdateReason,
    responses(
        (status = 200, description = "Reason updated", body = Object, example = json!({
            "code": 200,
            "message": "Reason for request ID 1 updated.",
            "data": {"request_id": 1, "previous_reject_reason": null, "reject_reason": "Insufficient manpower"}
        })),
        (status = 400, description = "Missing request ID or status"),
        (status = 404, description = "Request not found")
    ),
    tag = "Request"
)]
pub async fn update_reason(
    store: web::Data<dyn WfhStore>,
    payload: web::Json<UpdateReason>,
) -> Result<HttpResponse, LifecycleError> {
    let (Some(request_id), Some(status)) = (payload.request_id, payload.status.as_deref()) else {
        return Err(LifecycleError::InvalidInput(
            "Request ID or status not provided.".into(),
        ));
    };

    if RequestStatus::parse(status)? != RequestStatus::Rejected {
        return Err(LifecycleError::InvalidInput(
            "The request reason can only be changed by a rejection.".into(),
        ));
    }
    let reason = normalize_reason(payload.reason.as_deref())?;

    let change = store
        .replace_reject_reason(request_id, reason.as_deref())
        .await?
        .ok_or_else(|| LifecycleError::NotFound(format!("Request ID {} not found.", request_id)))?;

    info!(request_id, "Request reject_reason updated");
    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "message": format!("Reason for request ID {} updated.", request_id),
        "data": change
    })))
}
