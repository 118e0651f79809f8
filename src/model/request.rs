use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One WFH application; owns its request-dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "request_id": 1,
    "staff_id": 150488,
    "creation_date": "2024-09-20",
    "apply_reason": "Family event",
    "reject_reason": null
}))]
pub struct RequestEnvelope {
    pub request_id: u64,
    pub staff_id: u64,
    #[schema(example = "2024-09-20", format = "date", value_type = String)]
    pub creation_date: NaiveDate,
    pub apply_reason: String,
    pub reject_reason: Option<String>,
}

/// Result of the idempotent `reject_reason` setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReasonChange {
    pub request_id: u64,
    pub previous_reject_reason: Option<String>,
    pub reject_reason: Option<String>,
}
