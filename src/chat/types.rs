use crate::session::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const MAX_CONTENT_LENGTH: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: String,
    /// Who sent it; the Telegram chat id
    pub identity: Identity,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        identity: impl Into<Identity>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            identity: identity.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Trims the content and caps it at `MAX_CONTENT_LENGTH` characters.
    /// Returns false for empty or whitespace-only messages.
    pub fn sanitize(&mut self) -> bool {
        let trimmed = self.content.trim();
        if trimmed.is_empty() {
            return false;
        }

        let chars = trimmed.chars().count();
        if chars > MAX_CONTENT_LENGTH {
            tracing::warn!(
                channel = %self.channel,
                identity = %self.identity,
                original_length = chars,
                "Message too long, truncating to {}",
                MAX_CONTENT_LENGTH
            );
            self.content = trimmed.chars().take(MAX_CONTENT_LENGTH).collect();
        } else if trimmed.len() != self.content.len() {
            self.content = trimmed.to_string();
        }

        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub identity: Identity,
    pub content: String,
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    pub fn new(
        channel: impl Into<String>,
        identity: impl Into<Identity>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            identity: identity.into(),
            content: content.into(),
            reply_to: None,
        }
    }

    pub fn reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_message_creation() {
        let msg = InboundMessage::new("telegram", "123456789", "Is this SMS a scam?");
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.identity, Identity::from("123456789"));
        assert!(msg.metadata.is_empty());
        let now = Utc::now();
        assert!(now.signed_duration_since(msg.timestamp).num_seconds() < 5);
    }

    #[test]
    fn test_sanitize_rejects_whitespace() {
        let mut msg = InboundMessage::new("telegram", "123", " \n\t ");
        assert!(!msg.sanitize());
    }

    #[test]
    fn test_sanitize_trims_and_truncates() {
        let mut msg = InboundMessage::new("telegram", "123", "  /login alice pw1  ");
        assert!(msg.sanitize());
        assert_eq!(msg.content, "/login alice pw1");

        let mut long = InboundMessage::new("telegram", "123", "é".repeat(MAX_CONTENT_LENGTH + 10));
        assert!(long.sanitize());
        assert_eq!(long.content.chars().count(), MAX_CONTENT_LENGTH);
    }

    #[test]
    fn test_identity_serializes_as_plain_string() {
        let msg = InboundMessage::new("telegram", "42", "hi").with_metadata("username", json!("tg_alice"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["identity"], json!("42"));
        assert_eq!(value["metadata"]["username"], json!("tg_alice"));
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_outbound_message_with_reply() {
        let msg = OutboundMessage::new("telegram", "42", "Logged out.").reply_to("mid_7");
        assert_eq!(msg.identity.as_str(), "42");
        assert_eq!(msg.reply_to.as_deref(), Some("mid_7"));
    }
}
