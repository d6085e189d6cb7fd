//! Signcast Runtime
//!
//! Wires the engine, drivers, notifier, and device tasks together and puts
//! the whole tree under one supervisor. Applications register the device
//! tasks they have (renderer, lights, buttons, speech, audio) and start the
//! runtime; everything after that flows through the typed channels.
//!
//! ```rust,no_run
//! use signcast_core::{Command, Modality, Priority, SigncastConfig, SignMessage};
//! use signcast_runtime::{SigncastRuntime, SupervisorConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut runtime = SigncastRuntime::new(SigncastConfig::default(), SupervisorConfig::default());
//! runtime.start().await?;
//!
//! let message = SignMessage::new(Priority::new(5), Modality::Text, "door code is 4711");
//! runtime.send_command(Command::PostMessage { message }).await?;
//!
//! runtime.wait().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use signcast_core::channel::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_effect_receiver, create_event_channel, AppEventReceiver, CommandSender, EffectReceiver,
    EffectSender, NonBlockingSend,
};
use signcast_core::{
    Command, DeviceError, DeviceKind, DeviceTask, MessageBoard, SigncastConfig, SigncastError,
    SigncastResult,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::builder::SupervisorConfig;
use crate::drivers::{create_tick_channel, PeriodicDriver};
use crate::engine::{EngineState, EngineTask};
use crate::notify::ButtonNotifier;
use crate::supervisor::{SupervisorTask, WorkerFactory, WorkerKind};

/// How long `stop` waits for the tree to wind down before aborting it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

// ----------------------------------------------------------------------------
// Signcast Runtime
// ----------------------------------------------------------------------------

/// Coordinates the engine and its worker tasks
///
/// All task handles live inside the supervisor; the runtime keeps the
/// supervisor handle and the channel ends meant for the embedding
/// application. Dropping the runtime aborts the whole tree.
pub struct SigncastRuntime {
    /// Cadence, channel, and notify configuration
    config: SigncastConfig,
    /// Monitoring and restart settings
    supervisor_config: SupervisorConfig,
    /// Shared deliverable board, readable from outside the engine
    board: MessageBoard,
    /// Registered device tasks (before start)
    pending_devices: Vec<Box<dyn DeviceTask>>,
    /// Supervisor handle (after start); owns every other handle
    supervisor_handle: Option<JoinHandle<SigncastResult<()>>>,
    /// Command sender for external use
    command_sender: Option<CommandSender>,
    /// App event receiver for external use
    app_event_receiver: Option<AppEventReceiver>,
    /// Effect sender kept for late subscriptions
    effect_sender: Option<EffectSender>,
    /// Running state
    running: bool,
}

impl SigncastRuntime {
    /// Create a new runtime with the given configuration
    pub fn new(config: SigncastConfig, supervisor_config: SupervisorConfig) -> Self {
        Self::with_board(config, supervisor_config, MessageBoard::new())
    }

    /// Create a runtime around an existing board
    pub fn with_board(
        config: SigncastConfig,
        supervisor_config: SupervisorConfig,
        board: MessageBoard,
    ) -> Self {
        Self {
            config,
            supervisor_config,
            board,
            pending_devices: Vec::new(),
            supervisor_handle: None,
            command_sender: None,
            app_event_receiver: None,
            effect_sender: None,
            running: false,
        }
    }

    /// Create a runtime with fast cadences for tests
    pub fn for_testing() -> Self {
        Self::new(SigncastConfig::testing(), SupervisorConfig::testing())
    }

    /// Register a device task
    ///
    /// Device tasks must be added before `start`. Each kind can only be
    /// registered once.
    pub fn add_device<D: DeviceTask + 'static>(&mut self, device: D) -> SigncastResult<()> {
        self.add_boxed_device(Box::new(device))
    }

    pub(crate) fn add_boxed_device(&mut self, device: Box<dyn DeviceTask>) -> SigncastResult<()> {
        if self.running {
            return Err(SigncastError::config_error(
                "Cannot add devices to a running runtime",
            ));
        }

        let kind = device.kind();
        if self.pending_devices.iter().any(|d| d.kind() == kind) {
            return Err(DeviceError::DuplicateKind {
                device: kind.to_string(),
            }
            .into());
        }

        self.pending_devices.push(device);
        Ok(())
    }

    /// Start the engine, drivers, notifier, and device tasks
    pub async fn start(&mut self) -> SigncastResult<()> {
        if self.running {
            return Err(SigncastError::config_error("Runtime already running"));
        }

        self.config
            .validate()
            .map_err(SigncastError::config_error)?;

        // Channels between the engine, its workers, and the application
        let (command_sender, command_receiver) = create_command_channel(&self.config.channels);
        let (event_sender, event_receiver) = create_event_channel(&self.config.channels);
        let (effect_sender, _initial_effect_receiver) =
            create_effect_channel(&self.config.channels);
        let (app_event_sender, app_event_receiver) =
            create_app_event_channel(&self.config.channels);
        let (sync_tick_sender, sync_tick_receiver) = create_tick_channel();
        let (rotate_tick_sender, rotate_tick_receiver) = create_tick_channel();

        self.command_sender = Some(command_sender);
        self.app_event_receiver = Some(app_event_receiver);
        self.effect_sender = Some(effect_sender.clone());

        // Engine task
        let mut engine = EngineTask::new(
            EngineState::new(self.board.clone()),
            self.config.engine.clone(),
            self.config.notify.clone(),
            command_receiver,
            event_receiver,
            sync_tick_receiver,
            rotate_tick_receiver,
            effect_sender.clone(),
            app_event_sender.clone(),
        );
        let engine_handle = tokio::spawn(async move { engine.run().await });

        let mut supervisor = SupervisorTask::new(
            self.supervisor_config.health_check_interval,
            self.supervisor_config.restart_failed_workers,
            self.supervisor_config.max_restart_attempts,
            app_event_sender,
        );
        supervisor.attach_engine(engine_handle);

        // Timer drivers, rebuilt from their factories on restart
        let sync_interval = self.config.engine.sync_interval;
        let sync_factory: WorkerFactory = Box::new(move || {
            let driver = PeriodicDriver::new("reconciler", sync_interval, sync_tick_sender.clone());
            tokio::spawn(async move { driver.run().await })
        });
        let sync_handle = (sync_factory)();
        supervisor.supervise("reconciler", WorkerKind::Driver, sync_handle, Some(sync_factory));

        let rotate_interval = self.config.engine.rotate_interval;
        let rotate_factory: WorkerFactory = Box::new(move || {
            let driver = PeriodicDriver::new("rotator", rotate_interval, rotate_tick_sender.clone());
            tokio::spawn(async move { driver.run().await })
        });
        let rotate_handle = (rotate_factory)();
        supervisor.supervise("rotator", WorkerKind::Driver, rotate_handle, Some(rotate_factory));

        // Button notifier
        let notify_config = self.config.notify.clone();
        let notifier_event_sender = event_sender.clone();
        let notifier_effect_sender = effect_sender.clone();
        let notifier_factory: WorkerFactory = Box::new(move || {
            let config = notify_config.clone();
            let event_sender = notifier_event_sender.clone();
            let effect_receiver = create_effect_receiver(&notifier_effect_sender);
            tokio::spawn(async move {
                ButtonNotifier::new(config, event_sender, effect_receiver)?
                    .run()
                    .await
            })
        });
        let notifier_handle = (notifier_factory)();
        supervisor.supervise(
            "button-notifier",
            WorkerKind::Notifier,
            notifier_handle,
            Some(notifier_factory),
        );

        // Device tasks; these run what they were handed, no restart
        let devices = std::mem::take(&mut self.pending_devices);
        let device_count = devices.len();
        for mut device in devices {
            let kind = device.kind();
            device.attach_channels(
                event_sender.clone(),
                create_effect_receiver(&effect_sender),
            )?;
            let handle = tokio::spawn(async move { device.run().await });
            supervisor.supervise(worker_name(kind), WorkerKind::Device(kind), handle, None);
        }

        self.supervisor_handle = Some(tokio::spawn(async move { supervisor.run().await }));
        self.running = true;

        info!("Signcast runtime started with {} device task(s)", device_count);
        Ok(())
    }

    /// Stop the runtime, winding down gracefully where possible
    pub async fn stop(&mut self) -> SigncastResult<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        if let Some(sender) = &mut self.command_sender {
            if sender.try_send_non_blocking(Command::Shutdown).is_err() {
                warn!("Engine unreachable during stop; aborting the task tree");
            }
        }

        if let Some(mut handle) = self.supervisor_handle.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
        }

        self.command_sender = None;
        self.app_event_receiver = None;
        self.effect_sender = None;

        info!("Signcast runtime stopped");
        Ok(())
    }

    /// Block until the supervisor finishes
    ///
    /// Returns the supervisor's verdict: Ok after a clean shutdown, Err when
    /// the engine failed or a critical worker ran out of restarts.
    pub async fn wait(&mut self) -> SigncastResult<()> {
        let handle = self
            .supervisor_handle
            .take()
            .ok_or_else(|| SigncastError::config_error("Runtime is not running"))?;

        self.running = false;
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(SigncastError::supervision_error(format!(
                "Supervisor task panicked: {}",
                e
            ))),
        }
    }

    /// Send a command to the engine
    pub async fn send_command(&self, command: Command) -> SigncastResult<()> {
        match &self.command_sender {
            Some(sender) => sender
                .send(command)
                .await
                .map_err(|_| SigncastError::channel_error("Engine command channel closed")),
            None => Err(SigncastError::config_error("Runtime is not running")),
        }
    }

    /// Get command sender for external use
    pub fn command_sender(&self) -> Option<&CommandSender> {
        self.command_sender.as_ref()
    }

    /// Take app event receiver for external use
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    /// Subscribe to the effect broadcast
    pub fn subscribe_effects(&self) -> Option<EffectReceiver> {
        self.effect_sender.as_ref().map(create_effect_receiver)
    }

    /// Get the shared deliverable board
    pub fn board(&self) -> &MessageBoard {
        &self.board
    }

    /// Check if the runtime is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get configuration
    pub fn config(&self) -> &SigncastConfig {
        &self.config
    }
}

impl Drop for SigncastRuntime {
    fn drop(&mut self) {
        // Dropping the supervisor task aborts every handle it owns
        if let Some(handle) = &self.supervisor_handle {
            handle.abort();
        }
    }
}

/// Static worker name for a device kind
fn worker_name(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Renderer => "renderer",
        DeviceKind::Lights => "lights",
        DeviceKind::Buttons => "buttons",
        DeviceKind::Speech => "speech",
        DeviceKind::Audio => "audio",
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingDevice;

    #[tokio::test]
    async fn test_runtime_rejects_duplicate_device_kinds() {
        let mut runtime = SigncastRuntime::for_testing();
        runtime
            .add_device(RecordingDevice::new(DeviceKind::Lights))
            .unwrap();

        let err = runtime
            .add_device(RecordingDevice::new(DeviceKind::Lights))
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate device kind"));
    }

    #[tokio::test]
    async fn test_runtime_starts_and_stops() {
        let mut runtime = SigncastRuntime::for_testing();
        runtime
            .add_device(RecordingDevice::new(DeviceKind::Renderer))
            .unwrap();

        assert!(!runtime.is_running());
        runtime.start().await.unwrap();
        assert!(runtime.is_running());
        assert!(runtime.command_sender().is_some());

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
        assert!(runtime.command_sender().is_none());
    }

    #[tokio::test]
    async fn test_runtime_rejects_double_start() {
        let mut runtime = SigncastRuntime::for_testing();
        runtime.start().await.unwrap();

        let err = runtime.start().await.unwrap_err();
        assert!(err.to_string().contains("already running"));

        runtime.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_runtime_rejects_invalid_config() {
        let mut config = SigncastConfig::testing();
        config.channels.command_buffer_size = 0;

        let mut runtime = SigncastRuntime::new(config, SupervisorConfig::testing());
        let err = runtime.start().await.unwrap_err();
        assert!(err.to_string().contains("buffer size"));
    }
}
