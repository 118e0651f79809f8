//! Manager/director rejection across the request, request-dates and
//! status-log services.
//!
//! The three calls commit independently. When the date update fails the
//! envelope reason written by the first call is put back; a failed audit call
//! is reported as-is since the dates are already rejected.

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::request::UpdateReason;
use crate::api::request_dates::ChangeAllStatus;
use crate::api::status_log::AddEvent;
use crate::client::{LifecycleGateway, ServiceReply};
use crate::error::LifecycleError;
use crate::model::request_date::RequestStatus;

pub const REJECTION_ACTION: &str = "Request has been rejected by the manager/director";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    Failed,
    Compensated,
    CompensationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SagaStep {
    pub step: String,
    pub outcome: StepOutcome,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RejectionReport {
    pub saga_id: String,
    pub request_id: u64,
    pub steps: Vec<SagaStep>,
    #[schema(value_type = Object)]
    pub update_reason_response: Value,
    #[schema(value_type = Object)]
    pub change_status_response: Value,
    #[schema(value_type = Object)]
    pub add_event_response: Value,
}

struct Saga {
    id: String,
    request_id: u64,
    steps: Vec<SagaStep>,
}

impl Saga {
    fn record(&mut self, step: &str, outcome: StepOutcome, message: Option<String>) {
        match outcome {
            StepOutcome::Completed | StepOutcome::Compensated => {
                info!(saga_id = %self.id, request_id = self.request_id, step, ?outcome, "Saga step")
            }
            StepOutcome::Failed | StepOutcome::CompensationFailed => {
                error!(saga_id = %self.id, request_id = self.request_id, step, ?outcome, message = ?message, "Saga step")
            }
        }
        self.steps.push(SagaStep {
            step: step.to_string(),
            outcome,
            message,
        });
    }

    fn fail(&mut self, step: &str, e: &LifecycleError) {
        self.record(step, StepOutcome::Failed, Some(e.to_string()));
    }
}

fn previous_reason(reply: &ServiceReply) -> Option<String> {
    reply
        .data
        .as_ref()
        .and_then(|data| data.get("previous_reject_reason"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Key under which the status-log service deduplicates the rejection event.
/// Retries of one rejection share it; a rejection with another reason does not.
pub fn rejection_event_key(request_id: u64, reason: &str) -> String {
    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, reason.as_bytes());
    format!("{}:rejected:{}", request_id, digest.to_simple())
}

pub async fn reject_request(
    gateway: &dyn LifecycleGateway,
    request_id: u64,
    reason: &str,
) -> Result<RejectionReport, LifecycleError> {
    let mut saga = Saga {
        id: Uuid::new_v4().to_string(),
        request_id,
        steps: Vec::new(),
    };
    let status = RequestStatus::Rejected.to_string();

    let update_reason = UpdateReason {
        request_id: Some(request_id),
        status: Some(status.clone()),
        reason: Some(reason.to_string()),
    };
    let reason_reply = match gateway.update_reason(&update_reason).await {
        Ok(reply) => reply,
        Err(e) => {
            saga.fail("update_reason", &e);
            return Err(e);
        }
    };
    saga.record("update_reason", StepOutcome::Completed, None);

    let change_status = ChangeAllStatus {
        request_id: Some(request_id),
        status: Some(status.clone()),
        reason: Some(reason.to_string()),
    };
    let status_reply = match gateway.change_all_status(&change_status).await {
        Ok(reply) => reply,
        Err(e) => {
            saga.fail("change_all_status", &e);

            let restore = UpdateReason {
                request_id: Some(request_id),
                status: Some(status),
                reason: previous_reason(&reason_reply),
            };
            match gateway.update_reason(&restore).await {
                Ok(_) => saga.record("update_reason", StepOutcome::Compensated, None),
                Err(undo) => saga.record(
                    "update_reason",
                    StepOutcome::CompensationFailed,
                    Some(undo.to_string()),
                ),
            }
            return Err(e);
        }
    };
    saga.record("change_all_status", StepOutcome::Completed, None);

    let event = AddEvent {
        request_id: Some(request_id),
        action: Some(REJECTION_ACTION.to_string()),
        reason: Some(reason.to_string()),
    };
    let key = rejection_event_key(request_id, reason);
    let event_reply = match gateway.add_event(&event, Some(&key)).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(request_id, "Dates are rejected but the rejection event was not logged");
            saga.fail("add_event", &e);
            return Err(e);
        }
    };
    saga.record("add_event", StepOutcome::Completed, None);

    Ok(RejectionReport {
        saga_id: saga.id,
        request_id,
        steps: saga.steps,
        update_reason_response: reason_reply.into_json(),
        change_status_response: status_reply.into_json(),
        add_event_response: event_reply.into_json(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        UpdateReason(UpdateReason),
        ChangeAllStatus(ChangeAllStatus),
        AddEvent(AddEvent, Option<String>),
    }

    /// Answers calls from a script, in order, and records them.
    #[derive(Default)]
    pub struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<ServiceReply, LifecycleError>>>,
        pub calls: Mutex<Vec<Call>>,
    }

    impl ScriptedGateway {
        pub fn new(replies: Vec<Result<ServiceReply, LifecycleError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn next(&self, call: Call) -> Result<ServiceReply, LifecycleError> {
            self.calls.lock().unwrap().push(call);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ok("unscripted", None)))
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LifecycleGateway for ScriptedGateway {
        async fn update_reason(&self, body: &UpdateReason) -> Result<ServiceReply, LifecycleError> {
            self.next(Call::UpdateReason(body.clone()))
        }

        async fn change_all_status(
            &self,
            body: &ChangeAllStatus,
        ) -> Result<ServiceReply, LifecycleError> {
            self.next(Call::ChangeAllStatus(body.clone()))
        }

        async fn add_event(
            &self,
            body: &AddEvent,
            idempotency_key: Option<&str>,
        ) -> Result<ServiceReply, LifecycleError> {
            self.next(Call::AddEvent(body.clone(), idempotency_key.map(str::to_string)))
        }
    }

    pub fn ok(message: &str, data: Option<Value>) -> ServiceReply {
        ServiceReply {
            code: Some(200),
            message: Some(message.to_string()),
            error: None,
            data,
        }
    }

    fn upstream(code: u16, message: &str) -> LifecycleError {
        LifecycleError::Upstream {
            code,
            message: message.to_string(),
        }
    }

    #[actix_web::test]
    async fn all_three_steps_run_in_order() {
        let gateway = ScriptedGateway::new(vec![
            Ok(ok("Reason updated", Some(json!({"previous_reject_reason": null})))),
            Ok(ok("Status updated", None)),
            Ok(ok("Event logged successfully", None)),
        ]);

        let report = reject_request(&gateway, 1, "Insufficient justification").await.unwrap();

        let outcomes: Vec<_> = report.steps.iter().map(|s| (s.step.as_str(), s.outcome)).collect();
        assert_eq!(
            outcomes,
            vec![
                ("update_reason", StepOutcome::Completed),
                ("change_all_status", StepOutcome::Completed),
                ("add_event", StepOutcome::Completed),
            ]
        );

        let calls = gateway.calls();
        assert_eq!(calls.len(), 3);
        match &calls[2] {
            Call::AddEvent(event, key) => {
                assert_eq!(event.action.as_deref(), Some(REJECTION_ACTION));
                assert_eq!(
                    key.as_deref(),
                    Some(rejection_event_key(1, "Insufficient justification").as_str())
                );
                assert!(key.as_deref().unwrap().starts_with("1:rejected:"));
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(report.change_status_response["message"], "Status updated");
    }

    #[actix_web::test]
    async fn first_failure_stops_the_saga() {
        let gateway = ScriptedGateway::new(vec![
            Err(upstream(500, "Failed to update reason.")),
            Ok(ok("Status updated", None)),
        ]);

        let err = reject_request(&gateway, 1, "Out of office quota").await.unwrap_err();

        assert_eq!(err, upstream(500, "Failed to update reason."));
        assert_eq!(gateway.calls().len(), 1);
    }

    #[actix_web::test]
    async fn date_failure_restores_the_previous_reason() {
        let gateway = ScriptedGateway::new(vec![
            Ok(ok(
                "Reason updated",
                Some(json!({"previous_reject_reason": "Earlier rejection"})),
            )),
            Err(upstream(404, "No request dates found for request ID 7")),
            Ok(ok("Reason updated", None)),
        ]);

        let err = reject_request(&gateway, 7, "Team offsite").await.unwrap_err();

        assert_eq!(err, upstream(404, "No request dates found for request ID 7"));
        let calls = gateway.calls();
        assert_eq!(calls.len(), 3);
        match &calls[2] {
            Call::UpdateReason(body) => {
                assert_eq!(body.reason.as_deref(), Some("Earlier rejection"));
                assert_eq!(body.request_id, Some(7));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[actix_web::test]
    async fn audit_failure_is_surfaced_without_compensation() {
        let gateway = ScriptedGateway::new(vec![
            Ok(ok("Reason updated", None)),
            Ok(ok("Status updated", None)),
            Err(upstream(500, "An error occurred while logging the event.")),
        ]);

        let err = reject_request(&gateway, 3, "Busy period").await.unwrap_err();

        assert_eq!(err.code(), 500);
        assert_eq!(gateway.calls().len(), 3);
    }

    #[test]
    fn event_key_separates_distinct_rejections() {
        assert_eq!(
            rejection_event_key(3, "Peak season"),
            rejection_event_key(3, "Peak season")
        );
        assert_ne!(
            rejection_event_key(3, "Peak season"),
            rejection_event_key(3, "Quota reached")
        );
        assert_ne!(
            rejection_event_key(3, "Peak season"),
            rejection_event_key(4, "Peak season")
        );
        assert!(
            rejection_event_key(3, "Équipe réduite")
                .chars()
                .all(|c| c.is_ascii_graphic())
        );
    }
}
