use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::client::IDEMPOTENCY_HEADER;
use crate::error::LifecycleError;
use crate::model::status_log::NewLogEntry;
use crate::store::WfhStore;
use crate::utils::idempotency_cache;
use crate::utils::validation::{MAX_ACTION_LEN, normalize_reason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddEvent {
    #[schema(example = 1)]
    pub request_id: Option<u64>,
    #[schema(example = "Request has been rejected by the manager/director")]
    pub action: Option<String>,
    #[schema(example = "Insufficient manpower")]
    pub reason: Option<String>,
}

/// Append an audit event
///
/// With an `Idempotency-Key` header, repeating the call returns the entry
/// written the first time instead of appending another one.
#[utoipa::path(
    post,
    path = "/status_log/add_event",
    request_body = AddEvent,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Deduplicates retried events")
    ),
    responses(
        (status = 200, description = "Event logged", body = Object, example = json!({
            "code": 200,
            "message": "Event logged successfully",
            "data": {"log_id": 1, "request_id": 1, "log_date": "2024-10-01T09:00:00", "action": "Request has been created", "reason": null}
        })),
        (status = 400, description = "Missing request ID or action, or action too long")
    ),
    tag = "Status Log"
)]
pub async fn add_event(
    req: HttpRequest,
    store: web::Data<dyn WfhStore>,
    payload: web::Json<AddEvent>,
) -> Result<HttpResponse, LifecycleError> {
    let payload = payload.into_inner();
    let (Some(request_id), Some(action)) = (
        payload.request_id,
        payload.action.filter(|a| !a.trim().is_empty()),
    ) else {
        return Err(LifecycleError::InvalidInput(
            "Invalid input. 'request_id' and 'action' are required.".into(),
        ));
    };
    if action.trim().chars().count() > MAX_ACTION_LEN {
        return Err(LifecycleError::InvalidInput(format!(
            "Action must be at most {} characters.",
            MAX_ACTION_LEN
        )));
    }
    let entry = NewLogEntry {
        request_id,
        action,
        reason: normalize_reason(payload.reason.as_deref())?,
    };

    let key = req
        .headers()
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let logged = match key {
        Some(key) => {
            if idempotency_cache::contains(&key).await {
                info!(request_id, key = %key, "Replaying logged event");
            }
            idempotency_cache::append_once(&key, store.append_log(entry)).await?
        }
        None => store.append_log(entry).await?,
    };

    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "message": "Event logged successfully",
        "data": logged
    })))
}

/// Audit trail of a request, oldest first
#[utoipa::path(
    get,
    path = "/status_log/get_logs/{request_id}",
    params(
        ("request_id" = u64, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Log entries", body = Object)
    ),
    tag = "Status Log"
)]
pub async fn get_logs(
    store: web::Data<dyn WfhStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, LifecycleError> {
    let logs = store.logs_for_request(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "code": 200,
        "data": logs
    })))
}
