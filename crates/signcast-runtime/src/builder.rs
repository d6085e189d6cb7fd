//! Runtime Builder API
//!
//! Provides a builder-style API for consumers (CLI/tests) to assemble a
//! runtime, register device tasks, and get command/app-event handles.

use std::time::Duration;

use signcast_core::channel::{AppEventReceiver, CommandSender, EffectReceiver};
use signcast_core::{Command, DeviceTask, MessageBoard, SigncastConfig, SigncastResult};
use tracing::info;

use crate::runtime::SigncastRuntime;

// ----------------------------------------------------------------------------
// Supervisor Configuration
// ----------------------------------------------------------------------------

/// Monitoring and restart settings for the supervisor
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub health_check_interval: Duration,
    pub restart_failed_workers: bool,
    pub max_restart_attempts: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(5),
            restart_failed_workers: true,
            max_restart_attempts: 3,
        }
    }
}

impl SupervisorConfig {
    /// Fast monitoring, no restarts, for tests
    pub fn testing() -> Self {
        Self {
            health_check_interval: Duration::from_millis(10),
            restart_failed_workers: false,
            max_restart_attempts: 3,
        }
    }
}

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for assembling and starting a signcast runtime
pub struct RuntimeBuilder {
    config: SigncastConfig,
    supervisor_config: SupervisorConfig,
    board: Option<MessageBoard>,
    devices: Vec<Box<dyn DeviceTask>>,
}

impl RuntimeBuilder {
    /// Create a new runtime builder with default configuration
    pub fn new() -> Self {
        Self {
            config: SigncastConfig::default(),
            supervisor_config: SupervisorConfig::default(),
            board: None,
            devices: Vec::new(),
        }
    }

    /// Set the runtime configuration
    pub fn with_config(mut self, config: SigncastConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a pre-populated deliverable board
    pub fn with_board(mut self, board: MessageBoard) -> Self {
        self.board = Some(board);
        self
    }

    /// Add a device task
    pub fn add_device(mut self, device: Box<dyn DeviceTask>) -> Self {
        self.devices.push(device);
        self
    }

    /// Configure supervision behavior
    pub fn with_supervisor(mut self, config: SupervisorConfig) -> Self {
        self.supervisor_config = config;
        self
    }

    /// Set the supervisor health check interval
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.supervisor_config.health_check_interval = interval;
        self
    }

    /// Enable or disable automatic worker restart
    pub fn restart_failed_workers(mut self, enabled: bool) -> Self {
        self.supervisor_config.restart_failed_workers = enabled;
        self
    }

    /// Cap the restart attempts per worker
    pub fn max_restart_attempts(mut self, attempts: u32) -> Self {
        self.supervisor_config.max_restart_attempts = attempts;
        self
    }

    /// Build and start the runtime
    pub async fn build_and_start(self) -> SigncastResult<RuntimeHandle> {
        info!("Building signcast runtime");

        let board = self.board.unwrap_or_else(MessageBoard::new);
        let mut runtime = SigncastRuntime::with_board(self.config, self.supervisor_config, board);
        for device in self.devices {
            runtime.add_boxed_device(device)?;
        }
        runtime.start().await?;

        Ok(RuntimeHandle { runtime })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running signcast runtime instance
pub struct RuntimeHandle {
    runtime: SigncastRuntime,
}

impl RuntimeHandle {
    /// Get a command sender for sending commands to the engine
    pub fn command_sender(&self) -> Option<CommandSender> {
        self.runtime.command_sender().cloned()
    }

    /// Take the app event receiver (can only be taken once)
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.runtime.take_app_event_receiver()
    }

    /// Subscribe to the effect broadcast
    pub fn subscribe_effects(&self) -> Option<EffectReceiver> {
        self.runtime.subscribe_effects()
    }

    /// Get a handle to the shared deliverable board
    pub fn board(&self) -> MessageBoard {
        self.runtime.board().clone()
    }

    /// Send a command to the engine
    pub async fn send_command(&self, command: Command) -> SigncastResult<()> {
        self.runtime.send_command(command).await
    }

    /// Check if the runtime is still running
    pub fn is_running(&self) -> bool {
        self.runtime.is_running()
    }

    /// Wait for the runtime to complete
    pub async fn wait(&mut self) -> SigncastResult<()> {
        self.runtime.wait().await
    }

    /// Shutdown the runtime gracefully
    pub async fn shutdown(&mut self) -> SigncastResult<()> {
        self.runtime.stop().await
    }
}

// ----------------------------------------------------------------------------
// Convenience Functions
// ----------------------------------------------------------------------------

/// Create a started runtime with fast cadences for tests
pub async fn create_test_runtime() -> SigncastResult<RuntimeHandle> {
    RuntimeBuilder::new()
        .with_config(SigncastConfig::testing())
        .with_supervisor(SupervisorConfig::testing())
        .build_and_start()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use signcast_core::{AppEvent, Modality, Priority, SignMessage};

    #[tokio::test]
    async fn test_runtime_builder() {
        let mut runtime = RuntimeBuilder::new()
            .with_config(SigncastConfig::testing())
            .with_supervisor(SupervisorConfig::testing())
            .build_and_start()
            .await
            .expect("Failed to build runtime");

        assert!(runtime.is_running());

        runtime
            .send_command(Command::SyncNow)
            .await
            .expect("Failed to send command");

        runtime.shutdown().await.expect("Failed to shutdown");
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_app_event_receiver() {
        let mut runtime = create_test_runtime().await.expect("Failed to create runtime");

        let mut app_events = runtime
            .take_app_event_receiver()
            .expect("Failed to get app event receiver");
        assert!(runtime.take_app_event_receiver().is_none());

        let message = SignMessage::new(Priority::new(5), Modality::Text, "builder test");
        runtime
            .send_command(Command::PostMessage { message })
            .await
            .expect("Failed to send command");

        // Timer syncs report count 0 until the post lands
        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), app_events.recv())
                .await
                .expect("Timed out waiting for app event")
                .expect("App event channel closed");
            if matches!(event, AppEvent::DeliverableCountChanged { count: 1 }) {
                break;
            }
        }

        runtime.shutdown().await.expect("Failed to shutdown");
    }

    #[tokio::test]
    async fn test_board_is_shared() {
        let board = MessageBoard::new();
        let message = SignMessage::new(Priority::new(3), Modality::Text, "pre-seeded");
        let id = message.id;
        board.insert(message).unwrap();

        let mut runtime = RuntimeBuilder::new()
            .with_config(SigncastConfig::testing())
            .with_supervisor(SupervisorConfig::testing())
            .with_board(board)
            .build_and_start()
            .await
            .expect("Failed to build runtime");

        assert!(runtime.board().contains(&id));
        runtime.shutdown().await.expect("Failed to shutdown");
    }
}
