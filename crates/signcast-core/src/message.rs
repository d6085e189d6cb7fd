//! Deliverable message model
//!
//! A `SignMessage` is one unit of content the appliance can deliver: a body
//! (or URL), a priority, a content modality, and an optional light cue for
//! the attached light hardware. Messages are value objects; the shared board
//! in `board` owns the live set.

use core::fmt;
use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::MessageError;
use crate::types::{MessageId, Priority, Timestamp};

// ----------------------------------------------------------------------------
// Modality
// ----------------------------------------------------------------------------

/// Content modality of a deliverable message
///
/// Only `Text` and `WebPage` currently have delivery paths. The remaining
/// variants are accepted into the board but skipped at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    Text,
    WebPage,
    Image,
    AudioFile,
    AudioStream,
    VideoFile,
    VideoStream,
    LocationMap,
    Unknown,
}

impl Modality {
    /// True when the engine has a delivery path for this modality
    pub fn is_deliverable(&self) -> bool {
        matches!(self, Modality::Text | Modality::WebPage)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modality::Text => "text",
            Modality::WebPage => "web-page",
            Modality::Image => "image",
            Modality::AudioFile => "audio-file",
            Modality::AudioStream => "audio-stream",
            Modality::VideoFile => "video-file",
            Modality::VideoStream => "video-stream",
            Modality::LocationMap => "location-map",
            Modality::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

// ----------------------------------------------------------------------------
// Light Code
// ----------------------------------------------------------------------------

/// Light cue attached to a message
///
/// `None` and `Unknown` both suppress the light command; only `Code` drives
/// the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightCode {
    None,
    Unknown,
    Code(u8),
}

impl LightCode {
    /// True when this cue should produce a light command
    pub fn is_actionable(&self) -> bool {
        matches!(self, LightCode::Code(_))
    }

    /// Get the raw code, if any
    pub fn code(&self) -> Option<u8> {
        match self {
            LightCode::Code(code) => Some(*code),
            _ => None,
        }
    }
}

impl Default for LightCode {
    fn default() -> Self {
        LightCode::None
    }
}

impl fmt::Display for LightCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightCode::None => write!(f, "none"),
            LightCode::Unknown => write!(f, "unknown"),
            LightCode::Code(code) => write!(f, "code({})", code),
        }
    }
}

// ----------------------------------------------------------------------------
// Sign Message
// ----------------------------------------------------------------------------

/// One deliverable unit of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignMessage {
    /// Stable unique id; rotation lists refer to messages only by id
    pub id: MessageId,
    /// Delivery priority; higher rotates first
    pub priority: Priority,
    /// Content modality, selects the delivery path
    pub modality: Modality,
    /// Message body for text, URL for web pages
    pub content: String,
    /// Optional light cue delivered ahead of the content
    pub light_code: LightCode,
    /// How long the light cue should stay active
    pub light_duration: Duration,
    /// Arrival time on this appliance
    pub created_at: Timestamp,
    /// Absolute expiry, if the message is time-limited
    pub expires_at: Option<Timestamp>,
    /// Completed delivery count, maintained by the engine
    pub times_delivered: u32,
}

impl SignMessage {
    /// Create a new message with a fresh id, stamped now
    pub fn new<S: Into<String>>(priority: Priority, modality: Modality, content: S) -> Self {
        Self {
            id: MessageId::random(),
            priority,
            modality,
            content: content.into(),
            light_code: LightCode::None,
            light_duration: Duration::from_secs(30),
            created_at: Timestamp::now(),
            expires_at: None,
            times_delivered: 0,
        }
    }

    /// Set the light cue
    pub fn with_light(mut self, code: LightCode, duration: Duration) -> Self {
        self.light_code = code;
        self.light_duration = duration;
        self
    }

    /// Set an absolute expiry
    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Replace the generated id (used when an upstream system assigns ids)
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// True when the message has passed its expiry
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Validate message content ahead of board insertion
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.modality.is_deliverable() && self.content.trim().is_empty() {
            return Err(MessageError::EmptyContent {
                modality: self.modality,
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_delivery_paths() {
        assert!(Modality::Text.is_deliverable());
        assert!(Modality::WebPage.is_deliverable());
        assert!(!Modality::VideoStream.is_deliverable());
        assert!(!Modality::Unknown.is_deliverable());
    }

    #[test]
    fn test_light_code_actionable() {
        assert!(LightCode::Code(3).is_actionable());
        assert!(!LightCode::None.is_actionable());
        assert!(!LightCode::Unknown.is_actionable());
        assert_eq!(LightCode::Code(3).code(), Some(3));
        assert_eq!(LightCode::Unknown.code(), None);
    }

    #[test]
    fn test_message_expiry() {
        let now = Timestamp::new(10_000);
        let msg = SignMessage::new(Priority::NORMAL, Modality::Text, "hello")
            .with_expiry(Timestamp::new(12_000));
        assert!(!msg.is_expired(now));
        assert!(msg.is_expired(Timestamp::new(12_000)));
        assert!(msg.is_expired(Timestamp::new(20_000)));

        let forever = SignMessage::new(Priority::NORMAL, Modality::Text, "hello");
        assert!(!forever.is_expired(Timestamp::new(u64::MAX)));
    }

    #[test]
    fn test_message_validation() {
        let ok = SignMessage::new(Priority::NORMAL, Modality::Text, "body");
        assert!(ok.validate().is_ok());

        let empty = SignMessage::new(Priority::NORMAL, Modality::WebPage, "   ");
        assert!(matches!(
            empty.validate(),
            Err(MessageError::EmptyContent { .. })
        ));

        // Placeholder modalities carry no content requirement
        let placeholder = SignMessage::new(Priority::NORMAL, Modality::Unknown, "");
        assert!(placeholder.validate().is_ok());
    }
}
