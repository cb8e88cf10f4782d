//! Shared HTTP model-endpoint abstraction.
//!
//! Both remote agents (description and generation) talk to a JSON-over-HTTP
//! model service.  [`ModelEndpoint`] is the seam: production code uses
//! [`HttpEndpoint`] built from [`EndpointSettings`], tests substitute a mock
//! that returns canned [`serde_json::Value`] responses.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::EndpointSettings;

// ---------------------------------------------------------------------------
// EndpointError
// ---------------------------------------------------------------------------

/// Errors raised by a model endpoint call.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("endpoint request timed out")]
    Timeout,

    /// The service answered with a non-success HTTP status.
    #[error("endpoint returned status {status}: {message}")]
    Service { status: u16, message: String },

    /// The response body could not be parsed as expected JSON.
    #[error("failed to parse endpoint response: {0}")]
    Parse(String),
}

impl EndpointError {
    /// True for failures worth one retry: timeouts, transport drops and
    /// server-side (5xx) errors.  Client errors (4xx) and malformed
    /// responses will not improve on a second attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            EndpointError::Timeout | EndpointError::Transport(_) => true,
            EndpointError::Service { status, .. } => *status >= 500,
            EndpointError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for EndpointError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EndpointError::Timeout
        } else {
            EndpointError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ModelEndpoint trait
// ---------------------------------------------------------------------------

/// Async trait for a JSON model service.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn ModelEndpoint>`).
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
    /// Model identifier, used in logs and artifact metadata.
    fn name(&self) -> &str;

    /// Send a JSON request body and return the parsed JSON response.
    async fn invoke(&self, body: Value) -> Result<Value, EndpointError>;
}

// ---------------------------------------------------------------------------
// HttpEndpoint
// ---------------------------------------------------------------------------

/// Calls a JSON-over-HTTP model service at `base_url + path`.
///
/// All connection details (`base_url`, `api_key`, `model`, timeout) come
/// exclusively from the [`EndpointSettings`] passed at construction; nothing
/// is hardcoded.
pub struct HttpEndpoint {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEndpoint {
    /// Build an endpoint from settings and a service path such as
    /// `"/v1/chat/completions"`.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `settings.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn new(settings: &EndpointSettings, path: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: format!("{}{}", settings.base_url.trim_end_matches('/'), path),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        }
    }
}

#[async_trait]
impl ModelEndpoint for HttpEndpoint {
    fn name(&self) -> &str {
        &self.model
    }

    /// POST `body` as JSON and parse the JSON response.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `api_key` is `Some(key)` and `key` is non-empty — safe for local
    /// model servers that require no authentication.
    async fn invoke(&self, body: Value) -> Result<Value, EndpointError> {
        let mut req = self.client.post(&self.url).json(&body);

        let key = self.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EndpointError::Service {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| EndpointError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_settings(api_key: Option<&str>) -> EndpointSettings {
        EndpointSettings {
            base_url: "http://localhost:8080".into(),
            api_key: api_key.map(|s| s.to_string()),
            model: "test-model".into(),
            timeout_secs: 10,
        }
    }

    #[test]
    fn new_builds_without_panic() {
        let _endpoint = HttpEndpoint::new(&make_settings(None), "/v1/chat/completions");
    }

    #[test]
    fn new_accepts_empty_api_key() {
        let _endpoint = HttpEndpoint::new(&make_settings(Some("")), "/generate");
    }

    #[test]
    fn trailing_slash_in_base_url_is_normalized() {
        let mut settings = make_settings(None);
        settings.base_url = "http://localhost:8080/".into();
        let endpoint = HttpEndpoint::new(&settings, "/generate");
        assert_eq!(endpoint.url, "http://localhost:8080/generate");
    }

    #[test]
    fn name_reports_the_model() {
        let endpoint = HttpEndpoint::new(&make_settings(None), "/generate");
        assert_eq!(endpoint.name(), "test-model");
    }

    /// Verify that `HttpEndpoint` is object-safe (usable as `dyn ModelEndpoint`).
    #[test]
    fn endpoint_is_object_safe() {
        let endpoint: Box<dyn ModelEndpoint> =
            Box::new(HttpEndpoint::new(&make_settings(None), "/generate"));
        drop(endpoint);
    }

    // ---- is_transient ------------------------------------------------------

    #[test]
    fn timeout_and_transport_are_transient() {
        assert!(EndpointError::Timeout.is_transient());
        assert!(EndpointError::Transport("connection reset".into()).is_transient());
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let server = EndpointError::Service {
            status: 503,
            message: "overloaded".into(),
        };
        let client = EndpointError::Service {
            status: 400,
            message: "bad request".into(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!EndpointError::Parse("truncated".into()).is_transient());
    }
}
