use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::LifecycleError;
use crate::lifecycle::{apply_status_to_all_dates, apply_status_to_date_subset, auto_reject_stale};
use crate::model::request_date::{RequestStatus, Shift};
use crate::store::WfhStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChangeAllStatus {
    #[schema(example = 1)]
    pub request_id: Option<u64>,
    #[schema(example = "Rescinded")]
    pub status: Option<String>,
    #[schema(example = "Project deadline moved")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePartialStatus {
    #[schema(example = 1)]
    pub request_id: Option<u64>,
    #[schema(example = "Withdrawn")]
    pub status: Option<String>,
    pub reason: Option<String>,
    #[schema(value_type = Option<Vec<String>>, example = json!(["2024-10-01"]))]
    pub dates: Option<Vec<NaiveDate>>,
    #[schema(example = "AM")]
    pub shift: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RequestIds {
    #[schema(example = json!([1, 2]))]
    pub request_ids: Vec<u64>,
}

/// All dates of one request
#[utoipa::path(
    get,
    path = "/request_dates/get_by_request_id/{request_id}",
    params(
        ("request_id" = u64, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Dates of the request, empty when none", body = Object)
    ),
    tag = "Request Dates"
)]
pub async fn get_by_request_id(
    store: web::Data<dyn WfhStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, LifecycleError> {
    let dates = store.dates_by_request_id(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "data": dates
    })))
}

/// Dates of several requests
#[utoipa::path(
    post,
    path = "/request_dates/get_request_dates_by_request_ids",
    request_body = RequestIds,
    responses(
        (status = 200, description = "Dates of the requests", body = Object),
        (status = 400, description = "No request IDs provided", body = Object, example = json!({
            "code": 400,
            "message": "No request IDs provided."
        }))
    ),
    tag = "Request Dates"
)]
pub async fn get_request_dates_by_request_ids(
    store: web::Data<dyn WfhStore>,
    payload: web::Json<RequestIds>,
) -> Result<HttpResponse, LifecycleError> {
    if payload.request_ids.is_empty() {
        return Err(LifecycleError::InvalidInput("No request IDs provided.".into()));
    }

    let dates = store.dates_by_request_ids(&payload.request_ids).await?;
    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "data": dates
    })))
}

/// Dates still waiting on a manager decision
#[utoipa::path(
    get,
    path = "/request_dates/get_pending/{request_id}",
    params(
        ("request_id" = u64, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Pending Approval and Pending Withdrawal dates", body = Object)
    ),
    tag = "Request Dates"
)]
pub async fn get_pending(
    store: web::Data<dyn WfhStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, LifecycleError> {
    let dates = store
        .dates_by_status(
            path.into_inner(),
            &[RequestStatus::PendingApproval, RequestStatus::PendingWithdrawal],
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "data": dates
    })))
}

/// Change the status of every date of a request
///
/// Dates in `Withdrawn` or `Pending Withdrawal`, and dates already in a final
/// status, are left as they are.
#[utoipa::path(
    put,
    path = "/request_dates/change_all_status",
    request_body = ChangeAllStatus,
    responses(
        (status = 200, description = "Status applied", body = Object, example = json!({
            "code": 200,
            "message": "Request status for request ID 1 updated to Approved.",
            "data": []
        })),
        (status = 400, description = "Missing fields, missing reason or invalid transition"),
        (status = 404, description = "No request dates for the request")
    ),
    tag = "Request Dates"
)]
pub async fn change_all_status(
    store: web::Data<dyn WfhStore>,
    payload: web::Json<ChangeAllStatus>,
) -> Result<HttpResponse, LifecycleError> {
    let (Some(request_id), Some(status)) = (payload.request_id, payload.status.as_deref()) else {
        return Err(LifecycleError::InvalidInput(
            "Request ID or status not provided.".into(),
        ));
    };
    let status = RequestStatus::parse(status)?;

    let outcome =
        apply_status_to_all_dates(store.get_ref(), request_id, status, payload.reason.as_deref())
            .await?;

    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "message": format!("Request status for request ID {} updated to {}.", request_id, status),
        "data": outcome.dates
    })))
}

/// Change the status of selected dates of a request
#[utoipa::path(
    put,
    path = "/request_dates/change_partial_status",
    request_body = ChangePartialStatus,
    responses(
        (status = 200, description = "Status applied", body = Object),
        (status = 400, description = "Missing fields, missing reason or invalid transition"),
        (status = 404, description = "No matching request dates")
    ),
    tag = "Request Dates"
)]
pub async fn change_partial_status(
    store: web::Data<dyn WfhStore>,
    payload: web::Json<ChangePartialStatus>,
) -> Result<HttpResponse, LifecycleError> {
    let payload = payload.into_inner();
    let (Some(request_id), Some(status), Some(dates)) =
        (payload.request_id, payload.status, payload.dates)
    else {
        return Err(LifecycleError::InvalidInput(
            "Request ID, status or dates not provided.".into(),
        ));
    };
    let status = RequestStatus::parse(&status)?;
    let shift = payload.shift.as_deref().map(Shift::parse).transpose()?;

    let outcome = apply_status_to_date_subset(
        store.get_ref(),
        request_id,
        &dates,
        shift,
        status,
        payload.reason.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "message": format!(
            "Status of {} date(s) for request ID {} updated to {}.",
            outcome.dates.len(),
            request_id,
            status
        ),
        "data": outcome.dates
    })))
}

/// Reject requests left pending past the stale threshold
#[utoipa::path(
    put,
    path = "/request_dates/auto_reject",
    responses(
        (status = 200, description = "Sweep finished", body = Object, example = json!({
            "code": 200,
            "message": "Auto-rejected 1 request(s).",
            "count": 1,
            "requests": [3],
            "failed": []
        })),
        (status = 500, description = "One or more requests could not be rejected", body = Object)
    ),
    tag = "Request Dates"
)]
pub async fn auto_reject(
    store: web::Data<dyn WfhStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, LifecycleError> {
    let today = Local::now().date_naive();
    let report = auto_reject_stale(store.get_ref(), today, config.stale_threshold_days).await?;

    let (mut response, code, message) = if report.failed.is_empty() {
        (
            HttpResponse::Ok(),
            200,
            format!("Auto-rejected {} request(s).", report.count),
        )
    } else {
        (
            HttpResponse::InternalServerError(),
            500,
            format!(
                "Auto-rejected {} request(s); {} failed.",
                report.count,
                report.failed.len()
            ),
        )
    };

    Ok(response.json(json!({
        "code": code,
        "message": message,
        "count": report.count,
        "requests": report.requests,
        "failed": report.failed
    })))
}
