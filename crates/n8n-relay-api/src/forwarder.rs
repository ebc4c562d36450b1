//! Outbound calls to the n8n workflow engine.
//!
//! Each inbound request results in exactly one outbound call. There is no
//! retry, no queuing and no deduplication: a failure is reported to the
//! caller as-is. Concurrent inbound requests issue independent calls.

use crate::config::N8nConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::fmt;
use tracing::{debug, instrument};

/// Content type of every JSON body sent to n8n.
pub const JSON_UTF8: &str = "application/json;charset=UTF-8";

/// The n8n webhooks the relay posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookRoute {
    /// Chat Trigger workflow answering natural-language queries
    ChatQuery,
    /// Workflow consuming relayed DingTalk messages
    DingTalk,
}

impl WebhookRoute {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatQuery => "chat_query",
            Self::DingTalk => "dingtalk",
        }
    }
}

impl fmt::Display for WebhookRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing the n8n health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthProbe {
    /// No health endpoint is configured
    NotConfigured,
    /// The endpoint answered 2xx
    Up,
    /// The endpoint answered non-2xx or could not be reached
    Down { error: Option<String> },
}

/// Errors raised while calling n8n
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("n8n returned HTTP {status}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("HTTP request to n8n failed: {message}")]
    Transport { message: String },

    #[error("Failed to encode request body: {message}")]
    Encoding { message: String },

    #[error("Failed to create HTTP client: {message}")]
    ClientBuild { message: String },
}

/// Sends relay payloads to n8n.
#[async_trait]
pub trait WebhookForwarder: Send + Sync {
    /// POST `payload` as JSON to the webhook for `route` and return the raw
    /// response body.
    ///
    /// # Errors
    ///
    /// - [`ForwardError::UnexpectedStatus`] when n8n answers non-2xx
    /// - [`ForwardError::Transport`] when the request cannot be completed
    async fn forward(&self, route: WebhookRoute, payload: &Value) -> Result<Bytes, ForwardError>;

    /// GET the n8n health endpoint, if one is configured.
    async fn probe_health(&self) -> HealthProbe;

    /// URL the given route posts to.
    fn webhook_url(&self, route: WebhookRoute) -> &str;
}

/// [`WebhookForwarder`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpWebhookForwarder {
    client: reqwest::Client,
    config: N8nConfig,
}

impl HttpWebhookForwarder {
    /// Build a forwarder for the configured n8n endpoints.
    ///
    /// A request timeout is applied only when the configuration sets one.
    pub fn new(config: N8nConfig) -> Result<Self, ForwardError> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| ForwardError::ClientBuild {
            message: e.to_string(),
        })?;

        Ok(Self { client, config })
    }
}

impl fmt::Debug for HttpWebhookForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpWebhookForwarder")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl WebhookForwarder for HttpWebhookForwarder {
    #[instrument(skip(self, payload), fields(url = %self.webhook_url(route)))]
    async fn forward(&self, route: WebhookRoute, payload: &Value) -> Result<Bytes, ForwardError> {
        let body = serde_json::to_vec(payload).map_err(|e| ForwardError::Encoding {
            message: e.to_string(),
        })?;

        let response = self
            .client
            .post(self.webhook_url(route))
            .header(CONTENT_TYPE, JSON_UTF8)
            .body(body)
            .send()
            .await
            .map_err(|e| ForwardError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ForwardError::Transport {
            message: format!("failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(ForwardError::UnexpectedStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        debug!(status = %status, body_len = bytes.len(), "n8n webhook answered");
        Ok(bytes)
    }

    #[instrument(skip(self))]
    async fn probe_health(&self) -> HealthProbe {
        let Some(url) = self.config.health_url.as_deref() else {
            return HealthProbe::NotConfigured;
        };

        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => HealthProbe::Up,
            Ok(response) => HealthProbe::Down {
                error: Some(format!(
                    "n8n health endpoint returned HTTP {}",
                    response.status().as_u16()
                )),
            },
            Err(e) => HealthProbe::Down {
                error: Some(e.to_string()),
            },
        }
    }

    fn webhook_url(&self, route: WebhookRoute) -> &str {
        match route {
            WebhookRoute::ChatQuery => &self.config.query_webhook_url,
            WebhookRoute::DingTalk => &self.config.dingtalk_webhook_url,
        }
    }
}

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod tests;
