use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

use crate::model::request_date::RequestStatus;

/// Every failure the lifecycle services report. The response body is always
/// `{code, message}`.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[display(fmt = "{}", _0)]
    InvalidInput(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "A reason is required to change the status to {}.", _0)]
    ReasonRequired(RequestStatus),

    #[display(fmt = "Cannot change request date {} from {} to {}.", request_date_id, from, to)]
    InvalidTransition {
        request_date_id: u64,
        from: RequestStatus,
        to: RequestStatus,
    },

    /// A collaborator service answered non-2xx, timed out, or was unreachable.
    #[display(fmt = "{}", message)]
    Upstream { code: u16, message: String },

    #[display(fmt = "An error occurred while accessing the database: {}", _0)]
    Persistence(String),
}

impl LifecycleError {
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::ReasonRequired(_) | Self::InvalidTransition { .. } => 400,
            Self::NotFound(_) => 404,
            Self::Upstream { code, .. } => *code,
            Self::Persistence(_) => 500,
        }
    }
}

impl ResponseError for LifecycleError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "code": self.status_code().as_u16(),
            "message": self.to_string(),
        }))
    }
}

impl From<sqlx::Error> for LifecycleError {
    fn from(e: sqlx::Error) -> Self {
        LifecycleError::Persistence(redact_credentials(&e.to_string()))
    }
}

/// Strips `user:password@` out of any connection URL embedded in a message.
pub fn redact_credentials(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;

    while let Some(scheme_end) = rest.find("://") {
        let (head, tail) = rest.split_at(scheme_end + 3);
        out.push_str(head);

        let authority_end = tail
            .find(|c: char| c == '/' || c.is_whitespace())
            .unwrap_or(tail.len());
        match tail[..authority_end].rfind('@') {
            Some(at) => {
                out.push_str("***");
                rest = &tail[at..];
            }
            None => rest = tail,
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn redacts_userinfo_from_urls() {
        let msg = "error connecting to mysql://root:hunter2@db:3306/wfh_scheduling";
        assert_eq!(
            redact_credentials(msg),
            "error connecting to mysql://***@db:3306/wfh_scheduling"
        );
        assert_eq!(redact_credentials("http://localhost/x"), "http://localhost/x");
        assert_eq!(redact_credentials("plain message"), "plain message");
    }

    #[test]
    fn codes_follow_the_taxonomy() {
        assert_eq!(LifecycleError::InvalidInput("x".into()).code(), 400);
        assert_eq!(LifecycleError::ReasonRequired(RequestStatus::Rescinded).code(), 400);
        assert_eq!(LifecycleError::NotFound("x".into()).code(), 404);
        assert_eq!(LifecycleError::Persistence("x".into()).code(), 500);
        let upstream = LifecycleError::Upstream {
            code: 404,
            message: "No request dates found for request ID 9".into(),
        };
        assert_eq!(upstream.status_code(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn error_body_carries_code_and_message() {
        let resp = LifecycleError::NotFound("No request dates found for request ID 999".into())
            .error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 404);
        assert_eq!(json["message"], "No request dates found for request ID 999");
    }
}
