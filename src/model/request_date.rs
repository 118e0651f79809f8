use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::error::LifecycleError;

/// Status of a single request-date. The wire form is the display string
/// (`"Pending Approval"`, `"Pending Withdrawal"`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    ToSchema,
)]
pub enum RequestStatus {
    #[serde(rename = "Pending Approval")]
    #[strum(serialize = "Pending Approval")]
    PendingApproval,
    Approved,
    Rejected,
    #[serde(rename = "Pending Withdrawal")]
    #[strum(serialize = "Pending Withdrawal")]
    PendingWithdrawal,
    #[serde(rename = "Pending Cancellation")]
    #[strum(serialize = "Pending Cancellation")]
    PendingCancellation,
    Withdrawn,
    Rescinded,
}

impl RequestStatus {
    /// Never overwritten by a bulk all-dates transition.
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Withdrawn | Self::PendingWithdrawal)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Withdrawn | Self::Rescinded | Self::Rejected)
    }

    /// Moving into these states must carry a reason.
    pub fn requires_reason(self) -> bool {
        matches!(
            self,
            Self::Rescinded | Self::Withdrawn | Self::PendingWithdrawal
        )
    }

    pub fn to_lowercase(self) -> String {
        self.as_ref().to_lowercase()
    }

    /// Parses the wire form, reporting unknown values as invalid input.
    pub fn parse(value: &str) -> Result<Self, LifecycleError> {
        value
            .parse()
            .map_err(|_| LifecycleError::InvalidInput(format!("Unknown status '{}'.", value)))
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
pub enum Shift {
    AM,
    PM,
    Full,
}

impl Shift {
    pub fn parse(value: &str) -> Result<Self, LifecycleError> {
        value
            .parse()
            .map_err(|_| LifecycleError::InvalidInput(format!("Unknown shift '{}'.", value)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "request_date_id": 1,
    "request_id": 100,
    "request_date": "2024-10-17",
    "request_shift": "PM",
    "request_status": "Pending Approval",
    "rescind_reason": null,
    "withdraw_reason": null
}))]
pub struct RequestDate {
    pub request_date_id: u64,
    pub request_id: u64,
    #[schema(example = "2024-10-17", format = "date", value_type = String)]
    pub request_date: NaiveDate,
    pub request_shift: Shift,
    pub request_status: RequestStatus,
    pub rescind_reason: Option<String>,
    pub withdraw_reason: Option<String>,
}

/// Raw `request_dates` row; enum columns are stored as VARCHAR.
#[derive(Debug, sqlx::FromRow)]
pub struct RequestDateRow {
    pub request_date_id: u64,
    pub request_id: u64,
    pub request_date: NaiveDate,
    pub request_shift: String,
    pub request_status: String,
    pub rescind_reason: Option<String>,
    pub withdraw_reason: Option<String>,
}

impl TryFrom<RequestDateRow> for RequestDate {
    type Error = LifecycleError;

    fn try_from(row: RequestDateRow) -> Result<Self, Self::Error> {
        let request_shift = row.request_shift.parse().map_err(|_| {
            LifecycleError::Persistence(format!(
                "request_date {} has unknown shift '{}'",
                row.request_date_id, row.request_shift
            ))
        })?;
        let request_status = row.request_status.parse().map_err(|_| {
            LifecycleError::Persistence(format!(
                "request_date {} has unknown status '{}'",
                row.request_date_id, row.request_status
            ))
        })?;

        Ok(RequestDate {
            request_date_id: row.request_date_id,
            request_id: row.request_id,
            request_date: row.request_date,
            request_shift,
            request_status,
            rescind_reason: row.rescind_reason,
            withdraw_reason: row.withdraw_reason,
        })
    }
}
