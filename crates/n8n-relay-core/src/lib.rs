//! # n8n Relay Core
//!
//! Domain logic for the relay that sits between chat front-ends / DingTalk
//! bots and an n8n workflow engine.
//!
//! This crate contains no HTTP server and no HTTP client. It provides:
//! - Inbound payload validation and outbound payload construction ([`payload`])
//! - DingTalk callback signature verification ([`signature`])
//! - Normalization of loosely-shaped n8n responses ([`normalizer`])
//!
//! ## Usage
//!
//! ```rust
//! use n8n_relay_core::normalizer::extract_result;
//! use serde_json::json;
//!
//! let result = extract_result(&json!({"output": "hello"}));
//! assert_eq!(result, json!("hello"));
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod normalizer;
pub mod payload;
pub mod signature;

pub use normalizer::{extract_result, normalize_body};
pub use payload::{ChatInput, ChatQuery, DingTalkCallback, DingTalkMessage};
pub use signature::{DingTalkSignatureVerifier, SignatureError};

// ============================================================================
// Time
// ============================================================================

/// UTC instant with millisecond precision.
///
/// The relay speaks epoch milliseconds on every wire it touches: DingTalk's
/// `Timestamp` header, the outbound `timestamp` fields, and the health
/// response. Serializes as the integer millisecond count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Build a timestamp from epoch milliseconds.
    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// Milliseconds since the Unix epoch.
    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Absolute distance to `other` in milliseconds.
    pub fn abs_diff_millis(&self, other: &Timestamp) -> u64 {
        self.epoch_millis().abs_diff(other.epoch_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.epoch_millis())
    }
}

impl From<Timestamp> for i64 {
    fn from(value: Timestamp) -> Self {
        value.epoch_millis()
    }
}

impl TryFrom<i64> for Timestamp {
    type Error = ParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_epoch_millis(value).ok_or_else(|| ParseError::InvalidFormat {
            expected: "epoch milliseconds".to_string(),
            actual: value.to_string(),
        })
    }
}

// ============================================================================
// Session Identifier
// ============================================================================

/// Conversation identifier handed to the n8n chat trigger.
///
/// Format: `session-{epoch_millis}`. Two requests in the same millisecond
/// share an id; n8n treats them as one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    const PREFIX: &'static str = "session-";

    /// Derive the session id for a request received at `at`.
    pub fn at(at: Timestamp) -> Self {
        Self(format!("{}{}", Self::PREFIX, at.epoch_millis()))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Inbound payload validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
