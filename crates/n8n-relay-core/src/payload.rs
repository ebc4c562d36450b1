//! Inbound request payloads and the outbound bodies built from them.
//!
//! Inbound types are deliberately permissive (every field optional) so that
//! a missing field reaches validation and produces the relay's own error
//! message instead of a deserializer rejection. Validation yields a small
//! validated type ([`ChatInput`], [`DingTalkMessage`]) from which the
//! outbound n8n payload is built.

use crate::{SessionId, Timestamp, ValidationError};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Action reported to the n8n Chat Trigger node.
pub const CHAT_ACTION: &str = "message";

// ============================================================================
// Chat query
// ============================================================================

/// Body of a chat query request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatQuery {
    /// Numbers and booleans are accepted and read as their text form.
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub query: Option<String>,
}

impl ChatQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
        }
    }

    /// Validate the query and return its trimmed text.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`] when the query is absent, empty,
    /// or whitespace only.
    pub fn validate(&self) -> Result<ChatInput, ValidationError> {
        ChatInput::new(self.query.as_deref().unwrap_or_default())
    }
}

fn scalar_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(scalar.to_string())),
        Some(_) => Err(de::Error::custom("expected a string, number or boolean")),
    }
}

/// A chat query that has passed validation: trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatInput(String);

impl ChatInput {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "query".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Body posted to the n8n chat webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundChatPayload {
    pub chat_input: String,
    pub session_id: SessionId,
    pub action: String,
    pub timestamp: Timestamp,
}

impl OutboundChatPayload {
    /// Build the n8n request for `input`, received at `at`.
    pub fn new(input: &ChatInput, at: Timestamp) -> Self {
        Self {
            chat_input: input.as_str().to_string(),
            session_id: SessionId::at(at),
            action: CHAT_ACTION.to_string(),
            timestamp: at,
        }
    }
}

// ============================================================================
// DingTalk callback
// ============================================================================

/// The subset of DingTalk's outgoing-robot callback the relay reads.
///
/// Unknown fields (`msgtype`, `chatbotUserId`, `sessionWebhook`, ...) are
/// accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DingTalkCallback {
    #[serde(default)]
    pub sender_staff_id: Option<String>,

    #[serde(default)]
    pub sender_nick: Option<String>,

    #[serde(default)]
    pub text: Option<DingTalkText>,

    #[serde(default)]
    pub conversation_title: Option<String>,
}

/// Text body of a DingTalk message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DingTalkText {
    #[serde(default)]
    pub content: Option<String>,
}

impl DingTalkCallback {
    /// Validate the callback and extract the message it carries.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`] for `text.content` when the text
    /// block is missing or its content is blank.
    pub fn message(&self) -> Result<DingTalkMessage, ValidationError> {
        let content = self
            .text
            .as_ref()
            .and_then(|text| text.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ValidationError::Required {
                field: "text.content".to_string(),
            });
        }

        Ok(DingTalkMessage {
            sender_staff_id: self.sender_staff_id.clone(),
            sender_nick: self.sender_nick.clone(),
            content: content.to_string(),
            conversation_title: self.conversation_title.clone(),
        })
    }
}

/// A validated DingTalk message: trimmed, non-empty content plus sender context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DingTalkMessage {
    pub sender_staff_id: Option<String>,
    pub sender_nick: Option<String>,
    pub content: String,
    pub conversation_title: Option<String>,
}

impl DingTalkMessage {
    /// Build the body forwarded to the n8n DingTalk webhook.
    pub fn to_relay_payload(&self, at: Timestamp) -> DingTalkRelayPayload {
        DingTalkRelayPayload {
            user_id: self.sender_staff_id.clone(),
            user_name: self.sender_nick.clone(),
            content: self.content.clone(),
            group_name: self.conversation_title.clone(),
            timestamp: at,
        }
    }
}

/// Body posted to the n8n DingTalk webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DingTalkRelayPayload {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub content: String,
    pub group_name: Option<String>,
    pub timestamp: Timestamp,
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
