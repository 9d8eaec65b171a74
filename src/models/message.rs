//! Inbound chat message model.

use serde::{Deserialize, Serialize};

/// Kind of an inbound message as reported by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text typed by the user.
    Text,
    /// Picture message.
    Image,
    /// Voice note.
    Voice,
    /// Video message.
    Video,
    /// Platform event (subscribe, menu click, ...).
    Event,
    /// Anything else, with the raw type kept for logging.
    Other(String),
}

impl MessageKind {
    /// Map the platform's `MsgType` value onto a kind.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "text" => Self::Text,
            "image" => Self::Image,
            "voice" => Self::Voice,
            "video" => Self::Video,
            "event" => Self::Event,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Platform name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Event => "event",
            Self::Other(raw) => raw,
        }
    }
}

/// Decoded inbound message delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message kind.
    pub kind: MessageKind,
    /// Stable sender identifier.
    pub from_user: String,
    /// Platform message id (may be empty for events).
    pub msg_id: String,
    /// Platform creation timestamp, kept verbatim.
    pub create_time: String,
    /// Body text for text messages.
    pub content: Option<String>,
}

impl InboundMessage {
    /// Build a text message.
    pub fn text(
        from_user: impl Into<String>,
        msg_id: impl Into<String>,
        create_time: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: MessageKind::Text,
            from_user: from_user.into(),
            msg_id: msg_id.into(),
            create_time: create_time.into(),
            content: Some(content.into()),
        }
    }

    /// Composite key used to recognise redelivery of the same message.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!("{}_{}", self.msg_id, self.create_time)
    }
}
