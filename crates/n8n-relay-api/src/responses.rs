//! Response bodies returned by the relay.

use n8n_relay_core::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message of a successful chat query envelope.
pub const QUERY_SUCCESS_MESSAGE: &str = "查询成功";

/// Body returned to DingTalk for an accepted callback.
pub const DINGTALK_ACCEPTED: &str = "success";

/// Body returned to DingTalk for a callback that failed signature
/// verification. Sent with HTTP 200.
pub const DINGTALK_REJECTED: &str = "非法请求";

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "n8n-frontend-integration";

/// The `{success, message, result}` wrapper returned by the chat endpoint.
///
/// `result` is present on success (possibly as JSON `null`) and absent on
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ResultEnvelope {
    pub fn success(message: impl Into<String>, result: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            result: Some(result),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            result: None,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: Timestamp,
    pub n8n_webhook_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n8n_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n8n_error: Option<String>,
}
