//! CSP Channel Communication Protocol Types
//!
//! This module defines the typed communication protocol of the engine.
//! All inter-task communication flows through these channel message types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::message::SignMessage;
use crate::types::{DeviceAddr, MessageId, Timestamp};

// ----------------------------------------------------------------------------
// Command: Operator/External → Engine
// ----------------------------------------------------------------------------

/// Commands sent from operator surfaces and external systems to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Insert or supersede a message on the deliverable board
    PostMessage { message: SignMessage },
    /// Remove a message from the deliverable board
    RemoveMessage { id: MessageId },
    /// Clear the board and stop all running deliveries
    ClearAllMessages,
    /// Run a reconciliation pass outside the timer cadence
    SyncNow,
    /// Request a detailed system status report
    GetSystemStatus,
    /// Shutdown the engine gracefully
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Device Tasks → Engine
// ----------------------------------------------------------------------------

/// Events sent from device tasks back to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// The renderer put a message on screen
    DeliveryStarted { message_id: MessageId },
    /// The renderer finished a message
    DeliveryCompleted {
        message_id: MessageId,
        skip_write: bool,
    },
    /// The speech synthesizer finished preparing an utterance
    SpeechReady { message_id: MessageId },
    /// A hardware button was pressed
    ButtonPressed {
        device_type: String,
        addr: DeviceAddr,
        button: u8,
    },
    /// The button report left for the backend, or gave up
    ButtonReportFinished {
        addr: DeviceAddr,
        button: u8,
        delivered: bool,
    },
    /// Device-specific error occurred
    DeviceError { device: DeviceKind, error: String },
}

// ----------------------------------------------------------------------------
// Effect: Engine → Device Tasks (External Side Effects Only)
// ----------------------------------------------------------------------------

/// Effects sent from the engine to device tasks
/// Effects describe external side effects only, never engine state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Effect {
    /// Drive the light hardware with a cue
    StartLight { code: u8, duration: Duration },
    /// Return the light hardware to its idle pattern
    LightsStandby,
    /// Bring a delivery activity to the foreground
    LaunchActivity {
        kind: ActivityKind,
        message_id: MessageId,
        content: String,
        skip_write: bool,
    },
    /// Dismiss one activity kind
    FinishActivity { kind: ActivityKind },
    /// Dismiss every delivery activity
    FinishAllActivities,
    /// Pre-synthesize speech for a text message
    PrepareSpeech { message_id: MessageId, text: String },
    /// Play an audio feedback tone
    PlayTone { tone: Tone },
    /// Hand a button report to the notifier
    PostButtonReport {
        device_type: String,
        addr: DeviceAddr,
        button: u8,
        pressed_at: Timestamp,
    },
}

// ----------------------------------------------------------------------------
// AppEvent: Engine → Observers (State Changes Only)
// ----------------------------------------------------------------------------

/// Application events sent from the engine to observer surfaces
/// AppEvents describe state changes observers need to know about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// The deliverable count changed, broadcast at the top of every sync
    DeliverableCountChanged { count: usize },
    /// The delivery slots changed
    DeliveryStateChanged {
        loading: Option<MessageId>,
        current: Option<MessageId>,
        last_completed: Option<MessageId>,
    },
    /// An in-flight delivery exceeded the stall limit and was forced forward
    RotationStalled {
        message_id: MessageId,
        stalled_for: Duration,
    },
    /// A device task stopped and will not be restarted
    DeviceTaskStopped { device: DeviceKind },
    /// System error occurred
    SystemError { error: String },
    /// System status report in response to GetSystemStatus command
    SystemStatusReport {
        deliverable_count: usize,
        rotation_len: usize,
        incoming_len: usize,
        current: Option<MessageId>,
        last_completed: Option<MessageId>,
        uptime_seconds: u64,
        sync_passes: u64,
        deliveries_completed: u64,
    },
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Foreground activity identifier on the appliance display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    /// Scrolling text renderer for text messages
    ScrollingText,
    /// Embedded browser for web page messages
    WebPage,
    /// Idle clock screen shown when nothing is deliverable
    Clock,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::ScrollingText => write!(f, "scrolling-text"),
            ActivityKind::WebPage => write!(f, "web-page"),
            ActivityKind::Clock => write!(f, "clock"),
        }
    }
}

/// Audio feedback tone played after a button report settles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Success,
    Failure,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tone::Success => write!(f, "success"),
            Tone::Failure => write!(f, "failure"),
        }
    }
}

/// Device task discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Screen renderer driving delivery activities
    Renderer,
    /// Light hardware controller
    Lights,
    /// Button receiver hardware
    Buttons,
    /// Speech synthesizer
    Speech,
    /// Tone and audio playback
    Audio,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Renderer => write!(f, "renderer"),
            DeviceKind::Lights => write!(f, "lights"),
            DeviceKind::Buttons => write!(f, "buttons"),
            DeviceKind::Speech => write!(f, "speech"),
            DeviceKind::Audio => write!(f, "audio"),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
