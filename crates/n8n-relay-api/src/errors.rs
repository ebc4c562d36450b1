//! Error types for the HTTP service

use crate::forwarder::ForwardError;
use crate::responses::ResultEnvelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use n8n_relay_core::ValidationError;
use tracing::{error, warn};

/// Chat query failures, rendered as a `{success: false, message}` envelope.
///
/// - `400 Bad Request`: the query was empty or the body malformed; n8n was not called
/// - `500 Internal Server Error`: n8n answered non-2xx or could not be reached
///
/// The messages are fixed strings that existing front-ends display verbatim.
#[derive(Debug, thiserror::Error)]
pub enum QueryHandlerError {
    /// Missing, empty or whitespace-only query
    #[error("查询问题不能为空！")]
    EmptyQuery(#[from] ValidationError),

    /// Body is not JSON or `query` is an object or array
    #[error("请求格式错误: {message}")]
    InvalidBody { message: String },

    /// n8n answered with a non-2xx status
    #[error("n8n服务调用失败，状态码: {status}")]
    DownstreamStatus { status: u16 },

    /// Transport failure or any other unexpected error while querying n8n
    #[error("查询过程中发生异常: {message}")]
    Downstream { message: String },
}

impl QueryHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyQuery(_) | Self::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            Self::DownstreamStatus { .. } | Self::Downstream { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ForwardError> for QueryHandlerError {
    fn from(e: ForwardError) -> Self {
        match e {
            ForwardError::UnexpectedStatus { status, .. } => Self::DownstreamStatus { status },
            other => Self::Downstream {
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for QueryHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::EmptyQuery(e) => warn!(error = %e, "Rejected chat query"),
            Self::InvalidBody { message } => warn!(error = %message, "Malformed chat query body"),
            _ => error!(error = %self, "Chat query failed"),
        }

        (status, Json(ResultEnvelope::failure(self.to_string()))).into_response()
    }
}

/// DingTalk callback failures that occur after the signature was accepted.
///
/// Signature failures are deliberately not represented here: DingTalk
/// receives the `非法请求` sentinel with HTTP 200 for those.
#[derive(Debug, thiserror::Error)]
pub enum DingTalkHandlerError {
    /// Unparsable body or blank message content; n8n was not called
    #[error("消息内容不能为空: {0}")]
    InvalidMessage(#[from] ValidationError),

    /// Forwarding to n8n failed
    #[error("转发到n8n失败: {0}")]
    ForwardFailed(#[from] ForwardError),

    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl IntoResponse for DingTalkHandlerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidMessage(e) => {
                warn!(error = %e, "Rejected DingTalk message");
                StatusCode::BAD_REQUEST
            }
            Self::ForwardFailed(e) => {
                error!(error = %e, "Failed to relay DingTalk message to n8n");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InternalError { message } => {
                error!(error = %message, "Internal server error occurred");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ResultEnvelope::failure(self.to_string()))).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Loading(#[from] config::ConfigError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
