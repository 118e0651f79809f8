use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::client::LifecycleGateway;
use crate::error::LifecycleError;
use crate::lifecycle::reject_request as run_rejection;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RejectRequest {
    #[schema(example = 1)]
    pub request_id: Option<u64>,
    #[schema(example = "Insufficient manpower")]
    pub reason: Option<String>,
}

/// Reject a request on behalf of a manager or director
///
/// Sets the request reason, rejects every date, then logs the rejection.
/// When rejecting the dates fails, the earlier reason is restored.
#[utoipa::path(
    put,
    path = "/reject_requests/reject_request",
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Request rejected", body = Object, example = json!({
            "code": 200,
            "message": "Request rejection reason and status updated successfully.",
            "data": {"saga_id": "5f0c…", "request_id": 1, "steps": []}
        })),
        (status = 400, description = "Missing request ID or reason"),
        (status = 404, description = "Request or its dates not found"),
        (status = 500, description = "A collaborating service failed")
    ),
    tag = "Reject Requests"
)]
pub async fn reject_request(
    gateway: web::Data<dyn LifecycleGateway>,
    payload: web::Json<RejectRequest>,
) -> Result<HttpResponse, LifecycleError> {
    let (Some(request_id), Some(reason)) = (
        payload.request_id,
        payload.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()),
    ) else {
        return Err(LifecycleError::InvalidInput(
            "Request ID or reason not provided.".into(),
        ));
    };

    let report = run_rejection(gateway.get_ref(), request_id, reason).await?;

    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "message": "Request rejection reason and status updated successfully.",
        "data": report
    })))
}
