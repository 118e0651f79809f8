//! Calls to the request, request-dates and status-log services.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::request::UpdateReason;
use crate::api::request_dates::ChangeAllStatus;
use crate::api::status_log::AddEvent;
use crate::config::Config;
use crate::error::LifecycleError;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// The `{code, message|error, data}` envelope every service answers with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceReply {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ServiceReply {
    pub fn into_json(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[async_trait]
pub trait LifecycleGateway: Send + Sync {
    async fn update_reason(&self, body: &UpdateReason) -> Result<ServiceReply, LifecycleError>;

    async fn change_all_status(&self, body: &ChangeAllStatus)
    -> Result<ServiceReply, LifecycleError>;

    async fn add_event(
        &self,
        body: &AddEvent,
        idempotency_key: Option<&str>,
    ) -> Result<ServiceReply, LifecycleError>;
}

/// Turns a raw HTTP answer into a reply or an `Upstream` error carrying the
/// collaborator's own code and message.
pub fn interpret_reply(
    status: u16,
    body: &[u8],
    fallback_message: &str,
) -> Result<ServiceReply, LifecycleError> {
    let reply: ServiceReply = match serde_json::from_slice(body) {
        Ok(reply) => reply,
        Err(e) => {
            debug!(status, error = %e, "Unreadable reply body");
            ServiceReply::default()
        }
    };

    let code = reply.code.unwrap_or(status);
    let success = (200..300).contains(&status) && (200..300).contains(&code);
    if success {
        return Ok(reply);
    }

    let code = if (400..600).contains(&code) { code } else { 500 };
    let message = reply
        .message
        .or(reply.error)
        .unwrap_or_else(|| fallback_message.to_string());
    Err(LifecycleError::Upstream { code, message })
}

pub struct HttpGateway {
    client: Client,
    request_service_url: String,
    request_dates_service_url: String,
    status_log_service_url: String,
}

impl HttpGateway {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            request_service_url: config.request_service_url.trim_end_matches('/').to_string(),
            request_dates_service_url: config
                .request_dates_service_url
                .trim_end_matches('/')
                .to_string(),
            status_log_service_url: config.status_log_service_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        fallback_message: &str,
    ) -> Result<ServiceReply, LifecycleError> {
        let response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() { "timed out" } else { "is unreachable" };
            warn!(url, error = %e, "Upstream call failed");
            LifecycleError::Upstream {
                code: 500,
                message: format!("{} ({} {})", fallback_message, url, reason),
            }
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            warn!(url, error = %e, "Failed to read upstream body");
            LifecycleError::Upstream {
                code: 500,
                message: fallback_message.to_string(),
            }
        })?;

        interpret_reply(status, &body, fallback_message)
    }

    fn json<T: Serialize + ?Sized>(&self, method: Method, url: &str, body: &T) -> RequestBuilder {
        self.client.request(method, url).json(body)
    }
}

#[async_trait]
impl LifecycleGateway for HttpGateway {
    async fn update_reason(&self, body: &UpdateReason) -> Result<ServiceReply, LifecycleError> {
        let url = format!("{}/update_reason", self.request_service_url);
        let request = self.json(Method::PUT, &url, body);
        self.send(request, &url, "Failed to update reason for request.")
            .await
    }

    async fn change_all_status(
        &self,
        body: &ChangeAllStatus,
    ) -> Result<ServiceReply, LifecycleError> {
        let url = format!("{}/change_all_status", self.request_dates_service_url);
        let request = self.json(Method::PUT, &url, body);
        self.send(
            request,
            &url,
            "Failed to update the status for the related request dates.",
        )
        .await
    }

    async fn add_event(
        &self,
        body: &AddEvent,
        idempotency_key: Option<&str>,
    ) -> Result<ServiceReply, LifecycleError> {
        let url = format!("{}/add_event", self.status_log_service_url);
        let mut request = self.json(Method::POST, &url, body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        self.send(request, &url, "Failed to log the rejection event.")
            .await
    }
}
