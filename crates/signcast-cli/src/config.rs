//! Signcast CLI Configuration Management
//!
//! Loads appliance configuration from a TOML file and converts it into the
//! runtime's `SigncastConfig`. Durations are written as millisecond fields so
//! the file stays flat and greppable on the appliance image; missing sections
//! and fields fall back to the engine defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use signcast_core::{ChannelConfig, EngineConfig, NotifyConfig, SigncastConfig};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Appliance Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the signcast appliance binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Engine cadence
    pub engine: EngineSection,
    /// Button report delivery
    pub notify: NotifySection,
    /// Channel buffer sizes
    pub channels: ChannelSection,
    /// Behavior outside the engine
    pub appliance: ApplianceSection,
}

/// Engine cadence in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub sync_interval_ms: u64,
    pub rotate_interval_ms: u64,
    pub light_lead_delay_ms: u64,
    pub delivery_timeout_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            sync_interval_ms: defaults.sync_interval.as_millis() as u64,
            rotate_interval_ms: defaults.rotate_interval.as_millis() as u64,
            light_lead_delay_ms: defaults.light_lead_delay.as_millis() as u64,
            delivery_timeout_ms: defaults.delivery_timeout.as_millis() as u64,
        }
    }
}

/// Button report delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySection {
    /// Backend endpoint receiving button reports; omit to disable reporting
    pub endpoint: Option<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub button_lockout_ms: u64,
}

impl Default for NotifySection {
    fn default() -> Self {
        let defaults = NotifyConfig::default();
        Self {
            endpoint: None,
            max_retries: defaults.max_retries,
            retry_delay_ms: defaults.retry_delay.as_millis() as u64,
            request_timeout_ms: defaults.request_timeout.as_millis() as u64,
            button_lockout_ms: defaults.button_lockout.as_millis() as u64,
        }
    }
}

/// Channel buffer sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSection {
    pub command_buffer_size: usize,
    pub event_buffer_size: usize,
    pub effect_buffer_size: usize,
    pub app_event_buffer_size: usize,
}

impl Default for ChannelSection {
    fn default() -> Self {
        let defaults = ChannelConfig::default();
        Self {
            command_buffer_size: defaults.command_buffer_size,
            event_buffer_size: defaults.event_buffer_size,
            effect_buffer_size: defaults.effect_buffer_size,
            app_event_buffer_size: defaults.app_event_buffer_size,
        }
    }
}

/// Appliance behavior outside the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplianceSection {
    /// How long the console renderer holds each message on screen
    pub display_hold_ms: u64,
    /// Period between expiry sweeps of the board
    pub housekeeping_interval_ms: u64,
    /// Pause before rebuilding the runtime after a supervision failure
    pub restart_delay_ms: u64,
}

impl Default for ApplianceSection {
    fn default() -> Self {
        Self {
            display_hold_ms: 8_000,
            housekeeping_interval_ms: 30_000,
            restart_delay_ms: 3_000,
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Conversion
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Convert the millisecond fields into the runtime configuration
    pub fn to_runtime_config(&self) -> SigncastConfig {
        SigncastConfig {
            engine: EngineConfig {
                sync_interval: Duration::from_millis(self.engine.sync_interval_ms),
                rotate_interval: Duration::from_millis(self.engine.rotate_interval_ms),
                light_lead_delay: Duration::from_millis(self.engine.light_lead_delay_ms),
                delivery_timeout: Duration::from_millis(self.engine.delivery_timeout_ms),
            },
            channels: ChannelConfig {
                command_buffer_size: self.channels.command_buffer_size,
                event_buffer_size: self.channels.event_buffer_size,
                effect_buffer_size: self.channels.effect_buffer_size,
                app_event_buffer_size: self.channels.app_event_buffer_size,
            },
            notify: NotifyConfig {
                endpoint: self.notify.endpoint.clone(),
                max_retries: self.notify.max_retries,
                retry_delay: Duration::from_millis(self.notify.retry_delay_ms),
                request_timeout: Duration::from_millis(self.notify.request_timeout_ms),
                button_lockout: Duration::from_millis(self.notify.button_lockout_ms),
            },
        }
    }

    pub fn display_hold(&self) -> Duration {
        Duration::from_millis(self.appliance.display_hold_ms)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_millis(self.appliance.housekeeping_interval_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.appliance.restart_delay_ms)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.to_runtime_config()
            .validate()
            .map_err(CliError::Config)?;

        if self.appliance.display_hold_ms == 0 {
            return Err(CliError::Config("Display hold cannot be zero".into()));
        }
        if self.appliance.housekeeping_interval_ms == 0 {
            return Err(CliError::Config(
                "Housekeeping interval cannot be zero".into(),
            ));
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
