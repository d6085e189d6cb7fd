//! Appliance application wiring
//!
//! Builds the runtime with the console devices, keeps the board swept of
//! expired messages, and rebuilds the whole subsystem when supervision
//! escalates. The rotation lists rebuild themselves from the board on the
//! first reconciliation pass after a rebuild, so no delivery state needs to
//! survive the restart.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use signcast_core::channel::CommandSender;
use signcast_core::{
    Command, LightCode, MessageBoard, Modality, Priority, SignMessage, Timestamp,
};
use signcast_runtime::{RuntimeBuilder, RuntimeHandle};

use crate::config::AppConfig;
use crate::devices::{ConsoleAudio, ConsoleRenderer, LoggingLights};
use crate::error::Result;

// ----------------------------------------------------------------------------
// Appliance Application
// ----------------------------------------------------------------------------

/// The long-running appliance application
pub struct ApplianceApp {
    config: AppConfig,
}

impl ApplianceApp {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run until shutdown, rebuilding the runtime when supervision escalates
    pub async fn run(&self) -> Result<()> {
        loop {
            let mut handle = self.build_runtime().await?;
            let watcher = spawn_signal_watcher(handle.command_sender());
            let housekeeping = spawn_housekeeping(
                handle.board(),
                handle.command_sender(),
                self.config.housekeeping_interval(),
            );

            let result = handle.wait().await;
            watcher.abort();
            housekeeping.abort();

            match result {
                Ok(()) => {
                    info!("Signcast appliance stopped");
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        "Supervision escalated: {}; rebuilding the runtime in {:?}",
                        e,
                        self.config.restart_delay()
                    );
                    tokio::time::sleep(self.config.restart_delay()).await;
                }
            }
        }
    }

    /// Run the self-driving demo: a seeded board plus a feeder that
    /// exercises injection, preemption, and expiry
    pub async fn demo(&self, step: Duration) -> Result<()> {
        let mut config = self.config.clone();
        // Demo cadence: quick enough to watch, slow enough to read
        config.engine.sync_interval_ms = 2_000;
        config.engine.rotate_interval_ms = 4_000;
        config.appliance.display_hold_ms = 2_500;
        config.appliance.housekeeping_interval_ms = 3_000;
        let app = ApplianceApp::new(config);

        let mut handle = app.build_runtime().await?;
        let watcher = spawn_signal_watcher(handle.command_sender());
        let housekeeping = spawn_housekeeping(
            handle.board(),
            handle.command_sender(),
            app.config.housekeeping_interval(),
        );
        let feeder = spawn_feeder(handle.command_sender(), step);

        info!("Demo running; press ctrl-c to stop");
        let result = handle.wait().await;
        watcher.abort();
        housekeeping.abort();
        feeder.abort();

        result?;
        Ok(())
    }

    async fn build_runtime(&self) -> Result<RuntimeHandle> {
        let handle = RuntimeBuilder::new()
            .with_config(self.config.to_runtime_config())
            .add_device(Box::new(ConsoleRenderer::new(self.config.display_hold())))
            .add_device(Box::new(LoggingLights::new()))
            .add_device(Box::new(ConsoleAudio::new()))
            .build_and_start()
            .await?;
        Ok(handle)
    }
}

// ----------------------------------------------------------------------------
// Background Tasks
// ----------------------------------------------------------------------------

/// Turn ctrl-c into a graceful engine shutdown
fn spawn_signal_watcher(command_sender: Option<CommandSender>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(sender) = command_sender else { return };
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-c received, shutting the appliance down");
            let _ = sender.send(Command::Shutdown).await;
        }
    })
}

/// Sweep expired messages and trigger reconciliation when any fall off
fn spawn_housekeeping(
    board: MessageBoard,
    command_sender: Option<CommandSender>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(sender) = command_sender else { return };
        loop {
            tokio::time::sleep(interval).await;
            let purged = board.remove_expired(Timestamp::now());
            if purged > 0 {
                info!("Housekeeping expired {} message(s)", purged);
                if sender.send(Command::SyncNow).await.is_err() {
                    return;
                }
            }
        }
    })
}

/// Post a rotating mix of routine notes and short-lived takeovers
fn spawn_feeder(command_sender: Option<CommandSender>, step: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(sender) = command_sender else { return };

        let seeded = [
            SignMessage::new(Priority::new(3), Modality::Text, "Welcome to building C"),
            SignMessage::new(Priority::new(3), Modality::Text, "Canteen opens at 11:30"),
            SignMessage::new(
                Priority::new(3),
                Modality::WebPage,
                "https://status.example/board",
            ),
        ];
        for message in seeded {
            if sender.send(Command::PostMessage { message }).await.is_err() {
                return;
            }
        }

        let mut cycle: u32 = 0;
        loop {
            tokio::time::sleep(step).await;
            cycle += 1;

            // A same-class arrival that jumps the rotation queue, gone again
            // after a few rounds so the board stays small
            let note = SignMessage::new(
                Priority::new(3),
                Modality::Text,
                format!("Shuttle departure #{} boarding now", cycle),
            )
            .with_expiry(expiry_in(step * 4));
            info!("Feeder: posting a routine arrival");
            if sender.send(Command::PostMessage { message: note }).await.is_err() {
                return;
            }

            // Every third cycle a higher class takes the board over until
            // its expiry hands the rotation back
            if cycle % 3 == 0 {
                tokio::time::sleep(step).await;
                let takeover = SignMessage::new(
                    Priority::new(8),
                    Modality::Text,
                    "Fire drill in 5 minutes, use the east stairs",
                )
                .with_light(LightCode::Code(2), Duration::from_secs(10))
                .with_expiry(expiry_in(step * 2));
                info!("Feeder: posting a high-priority takeover");
                if sender
                    .send(Command::PostMessage { message: takeover })
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }
    })
}

fn expiry_in(window: Duration) -> Timestamp {
    Timestamp::now() + window.as_millis() as u64
}
