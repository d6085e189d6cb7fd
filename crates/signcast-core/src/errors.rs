//! Error types for the signcast engine
//!
//! This module contains all error types used throughout the core engine,
//! including dispatch errors, device errors, notification errors, and the
//! main SigncastError type that unifies them all.

use crate::message::Modality;
use crate::types::MessageId;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Message validation error types
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message content is empty for modality {modality}")]
    EmptyContent { modality: Modality },
    #[error("{message}")]
    Generic { message: String },
}

impl From<String> for MessageError {
    fn from(message: String) -> Self {
        MessageError::Generic { message }
    }
}

impl From<&str> for MessageError {
    fn from(message: &str) -> Self {
        MessageError::Generic {
            message: message.to_string(),
        }
    }
}

/// Specific dispatch error types
///
/// Dispatch failures abandon the current attempt only; the message stays in
/// rotation and the next tick proceeds normally.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Message {id} vanished from the board before dispatch")]
    MessageVanished { id: MessageId },
    #[error("No delivery path for modality {modality}")]
    UnhandledModality { modality: Modality },
}

/// Specific device task error types
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device link not ready: {device}")]
    LinkNotReady { device: String },
    #[error("Device {device} send failed: {reason}")]
    SendFailed { device: String, reason: String },
    #[error("Device task started without channels attached: {device}")]
    ChannelsNotAttached { device: String },
    #[error("Device timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("Duplicate device kind registered: {device}")]
    DuplicateKind { device: String },
    #[error("Device shutdown: {reason}")]
    Shutdown { reason: String },
}

/// Specific button report notification error types
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid notify endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Button report request failed: {reason}")]
    RequestFailed { reason: String },
    #[error("Button report rejected with HTTP status {status}")]
    RejectedStatus { status: u16 },
    #[error("Button report abandoned after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error types for the signcast engine
#[derive(Debug, thiserror::Error)]
pub enum SigncastError {
    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] MessageError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    /// Channel communication error (internal to CSP architecture)
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Supervision escalation: a worker died and could not be restarted
    #[error("Supervision error: {reason}")]
    Supervision { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl SigncastError {
    /// Create an invalid message error with a message
    pub fn invalid_message<T: Into<String>>(message: T) -> Self {
        SigncastError::InvalidMessage(MessageError::Generic {
            message: message.into(),
        })
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        SigncastError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        SigncastError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a supervision escalation error with a reason
    pub fn supervision_error<T: Into<String>>(reason: T) -> Self {
        SigncastError::Supervision {
            reason: reason.into(),
        }
    }

    /// Create a vanished message dispatch error
    pub fn message_vanished(id: MessageId) -> Self {
        SigncastError::Dispatch(DispatchError::MessageVanished { id })
    }

    /// Create an unhandled modality dispatch error
    pub fn unhandled_modality(modality: Modality) -> Self {
        SigncastError::Dispatch(DispatchError::UnhandledModality { modality })
    }

    /// True for errors that must stop the engine loop rather than be logged
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SigncastError::Channel { .. }
                | SigncastError::Configuration { .. }
                | SigncastError::Supervision { .. }
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, SigncastError>;
pub type SigncastResult<T> = Result<T>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
