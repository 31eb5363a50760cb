//! HTTP client for the relay endpoint.
//!
//! The advisor never talks to the upstream completion API directly — it posts
//! the routine payload to the configured relay, which holds the credential.
//! A missing endpoint is a configuration error surfaced to the user; a failed
//! or undecodable call is a transport error the user may retry by hand.

use serde_json::Value;
use tracing::debug;

use crate::advisor::RoutineRequest;
use crate::error::AdvisorError;

/// What the relay gives back on success. `result` is `None` when the
/// upstream reply carried no extractable text.
#[derive(Debug, Clone)]
pub struct RelayReply {
    pub result: Option<String>,
}

/// Short-lived client for advisor-to-relay calls.
pub struct RelayClient {
    endpoint: Option<String>,
    http: reqwest::Client,
}

impl RelayClient {
    /// `endpoint` is the relay URL, or `None` when unconfigured — every send
    /// will then fail with a configuration error instead of guessing.
    pub fn new(endpoint: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self { endpoint, http }
    }

    /// Post one payload and decode the relay's `{success, result, raw}`
    /// envelope.
    pub async fn send(&self, request: &RoutineRequest) -> Result<RelayReply, AdvisorError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            AdvisorError::Configuration(
                "no relay endpoint is set (chat.relay_url in config.toml, or GLOWD_RELAY_URL)"
                    .to_string(),
            )
        })?;

        let resp = self
            .http
            .post(endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| AdvisorError::Transport(e.to_string()))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AdvisorError::Transport(format!("relay sent a non-JSON reply: {e}")))?;

        if !status.is_success() {
            let detail = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("relay error");
            return Err(AdvisorError::Transport(format!("relay returned {status}: {detail}")));
        }

        debug!(%status, "relay reply received");
        let result = body
            .get("result")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(RelayReply { result })
    }
}
