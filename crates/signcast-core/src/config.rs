//! Centralized Configuration Management
//!
//! This module consolidates all configuration structures used throughout the
//! signcast core to provide a unified, consistent configuration interface.

use std::sync::Arc;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Engine Configuration
// ----------------------------------------------------------------------------

/// Configuration for the rotation engine cadence
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Period between reconciliation passes against the board
    pub sync_interval: Duration,
    /// Period between rotator ticks
    pub rotate_interval: Duration,
    /// Lead time between the light command and the activity launch
    pub light_lead_delay: Duration,
    /// Stall limit: an in-flight delivery older than this is forced forward
    pub delivery_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(5),
            rotate_interval: Duration::from_secs(15),
            light_lead_delay: Duration::from_millis(900),
            delivery_timeout: Duration::from_secs(120),
        }
    }
}

impl EngineConfig {
    /// Create configuration optimized for testing (millisecond cadence)
    pub fn testing() -> Self {
        Self {
            sync_interval: Duration::from_millis(20),
            rotate_interval: Duration::from_millis(40),
            light_lead_delay: Duration::from_millis(1),
            delivery_timeout: Duration::from_millis(500),
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Configuration for CSP channel buffer sizes
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (Operator → Engine)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (Device Tasks → Engine)
    pub event_buffer_size: usize,
    /// Buffer size for Effect channels (Engine → Device Tasks)
    pub effect_buffer_size: usize,
    /// Buffer size for AppEvent channels (Engine → Observers)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,   // Operator commands are infrequent
            event_buffer_size: 128,    // Device events can be bursty
            effect_buffer_size: 64,    // Effects are processed quickly
            app_event_buffer_size: 64, // Observer updates need responsiveness
        }
    }
}

impl ChannelConfig {
    /// Create configuration for low-memory appliance hardware
    pub fn low_memory() -> Self {
        Self {
            command_buffer_size: 10,
            event_buffer_size: 25,
            effect_buffer_size: 25,
            app_event_buffer_size: 50,
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 100,
            effect_buffer_size: 100,
            app_event_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Notify Configuration
// ----------------------------------------------------------------------------

/// Configuration for button-press report delivery
///
/// Retries are a fixed count with a constant delay between attempts; there is
/// no backoff growth.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NotifyConfig {
    /// Backend endpoint receiving button reports; None disables reporting
    pub endpoint: Option<String>,
    /// Attempts per report before giving up
    pub max_retries: u32,
    /// Constant delay between attempts
    pub retry_delay: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Window during which repeat presses of the same button are ignored
    pub button_lockout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            button_lockout: Duration::from_secs(5),
        }
    }
}

impl NotifyConfig {
    /// Create configuration optimized for testing (fast retries)
    pub fn testing() -> Self {
        Self {
            endpoint: None,
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
            request_timeout: Duration::from_millis(250),
            button_lockout: Duration::from_millis(50),
        }
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Master configuration struct that consolidates all signcast configurations
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SigncastConfig {
    /// Engine cadence configuration
    pub engine: EngineConfig,
    /// Channel buffer configuration
    pub channels: ChannelConfig,
    /// Button report configuration
    pub notify: NotifyConfig,
}

impl SigncastConfig {
    /// Create new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            engine: EngineConfig::testing(),
            channels: ChannelConfig::testing(),
            notify: NotifyConfig::testing(),
        }
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<(), String> {
        // Validate channel buffer sizes
        if self.channels.command_buffer_size == 0 {
            return Err("Command buffer size cannot be zero".into());
        }
        if self.channels.event_buffer_size == 0 {
            return Err("Event buffer size cannot be zero".into());
        }
        if self.channels.effect_buffer_size == 0 {
            return Err("Effect buffer size cannot be zero".into());
        }
        if self.channels.app_event_buffer_size == 0 {
            return Err("App event buffer size cannot be zero".into());
        }

        // Validate engine cadence
        if self.engine.sync_interval.is_zero() {
            return Err("Sync interval cannot be zero".into());
        }
        if self.engine.rotate_interval.is_zero() {
            return Err("Rotate interval cannot be zero".into());
        }
        if self.engine.delivery_timeout <= self.engine.rotate_interval {
            return Err("Delivery timeout must exceed the rotate interval".into());
        }
        if self.engine.light_lead_delay >= self.engine.delivery_timeout {
            return Err("Light lead delay must stay below the delivery timeout".into());
        }

        // Validate notify behavior
        if self.notify.max_retries == 0 {
            return Err("Notify retries cannot be zero".into());
        }
        if let Some(endpoint) = &self.notify.endpoint {
            let parsed = url::Url::parse(endpoint)
                .map_err(|e| format!("Invalid notify endpoint {}: {}", endpoint, e))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(format!(
                    "Notify endpoint must be http or https, got {}",
                    parsed.scheme()
                ));
            }
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Arc-wrapped Configuration for Efficient Sharing
// ----------------------------------------------------------------------------

/// Arc-wrapped SigncastConfig for efficient sharing across tasks
pub type SharedSigncastConfig = Arc<SigncastConfig>;

impl SigncastConfig {
    /// Convert to Arc-wrapped config for efficient sharing
    pub fn into_shared(self) -> SharedSigncastConfig {
        Arc::new(self)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
