//! DingTalk outgoing-robot signature verification.
//!
//! DingTalk signs each callback with two headers:
//!
//! - `Timestamp`: epoch milliseconds at which DingTalk sent the request
//! - `Sign`: `base64(HMAC-SHA256(key = app_secret, msg = timestamp + "\n" + app_secret))`
//!
//! A callback is accepted only when the timestamp lies strictly inside the
//! configured clock-skew window around "now" AND the signature matches. The
//! signature comparison is constant-time.

use crate::Timestamp;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::instrument;

type HmacSha256 = Hmac<Sha256>;

/// Default acceptance window around the current time: one hour.
pub const DEFAULT_MAX_CLOCK_SKEW_MS: u64 = 3_600_000;

/// Reasons a DingTalk callback fails verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing required header: {header}")]
    MissingHeader { header: String },

    #[error("Timestamp header is not epoch milliseconds: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("Timestamp is {skew_ms}ms away from now (limit {max_skew_ms}ms)")]
    TimestampOutOfWindow { skew_ms: u64, max_skew_ms: u64 },

    #[error("Signature does not match")]
    Mismatch,

    #[error("Secret cannot be used as HMAC key")]
    InvalidKey,
}

impl SignatureError {
    /// Whether the failure was caused by the request rather than by the
    /// relay's own configuration.
    pub fn is_caller_fault(&self) -> bool {
        !matches!(self, Self::InvalidKey)
    }
}

/// Verifies DingTalk callback signatures against a shared app secret.
#[derive(Clone)]
pub struct DingTalkSignatureVerifier {
    app_secret: String,
    max_skew_ms: u64,
}

impl DingTalkSignatureVerifier {
    /// Construct a verifier with the default one-hour window.
    pub fn new(app_secret: impl Into<String>) -> Self {
        Self::with_max_skew(app_secret, DEFAULT_MAX_CLOCK_SKEW_MS)
    }

    /// Construct a verifier with a custom clock-skew window.
    pub fn with_max_skew(app_secret: impl Into<String>, max_skew_ms: u64) -> Self {
        Self {
            app_secret: app_secret.into(),
            max_skew_ms,
        }
    }

    pub fn max_skew_ms(&self) -> u64 {
        self.max_skew_ms
    }

    /// Compute the signature DingTalk would send for `timestamp`.
    ///
    /// `timestamp` is signed verbatim, exactly as it appeared in the header.
    pub fn generate_sign(&self, timestamp: &str) -> Result<String, SignatureError> {
        let string_to_sign = format!("{}\n{}", timestamp, self.app_secret);

        let mut mac = HmacSha256::new_from_slice(self.app_secret.as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(string_to_sign.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Verify a callback's `Sign` and `Timestamp` headers against `now`.
    ///
    /// # Errors
    ///
    /// - [`SignatureError::MissingHeader`] if either header is absent
    /// - [`SignatureError::InvalidTimestamp`] if `Timestamp` is not an integer
    ///   or lies outside the representable date range
    /// - [`SignatureError::TimestampOutOfWindow`] if the skew is at or beyond the window
    /// - [`SignatureError::Mismatch`] if the signature differs
    #[instrument(skip(self, sign), fields(max_skew_ms = self.max_skew_ms))]
    pub fn verify(
        &self,
        sign: Option<&str>,
        timestamp: Option<&str>,
        now: Timestamp,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or_else(|| SignatureError::MissingHeader {
            header: "Timestamp".to_string(),
        })?;
        let sign = sign.ok_or_else(|| SignatureError::MissingHeader {
            header: "Sign".to_string(),
        })?;

        let sent_at = timestamp
            .parse::<i64>()
            .ok()
            .and_then(Timestamp::from_epoch_millis)
            .ok_or_else(|| SignatureError::InvalidTimestamp {
                value: timestamp.to_string(),
            })?;

        let skew_ms = sent_at.abs_diff_millis(&now);
        if skew_ms >= self.max_skew_ms {
            return Err(SignatureError::TimestampOutOfWindow {
                skew_ms,
                max_skew_ms: self.max_skew_ms,
            });
        }

        let expected = self.generate_sign(timestamp)?;
        if bool::from(expected.as_bytes().ct_eq(sign.as_bytes())) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

impl std::fmt::Debug for DingTalkSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingTalkSignatureVerifier")
            .field("app_secret", &"<REDACTED>")
            .field("max_skew_ms", &self.max_skew_ms)
            .finish()
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
