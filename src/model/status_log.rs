use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "log_id": 12,
    "request_id": 1,
    "log_date": "2024-10-01T09:30:00",
    "action": "Request has been rejected by the manager/director",
    "reason": "Team offsite"
}))]
pub struct StatusLogEntry {
    pub log_id: u64,
    pub request_id: u64,
    #[schema(example = "2024-10-01T09:30:00", format = "date-time", value_type = String)]
    pub log_date: NaiveDateTime,
    pub action: String,
    pub reason: Option<String>,
}

/// An audit entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub request_id: u64,
    pub action: String,
    pub reason: Option<String>,
}
