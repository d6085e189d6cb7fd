//! Supervisor Task
//!
//! Watches over the engine and its worker tasks, providing:
//! - Failure detection by polling join handles
//! - Restart of restartable workers, up to a configured attempt limit
//! - Escalation when a critical worker is out of restarts
//! - Abort of the whole task tree on drop

use std::collections::HashMap;
use std::time::Duration;

use signcast_core::channel::{AppEventSender, NonBlockingSend};
use signcast_core::{AppEvent, DeviceKind, SigncastError, SigncastResult};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

// ----------------------------------------------------------------------------
// Worker Classification
// ----------------------------------------------------------------------------

/// Builds a fresh join handle for a worker that died
pub type WorkerFactory = Box<dyn Fn() -> JoinHandle<SigncastResult<()>> + Send>;

/// What kind of worker a supervised handle belongs to
///
/// Drivers are critical: the engine is deaf without its timers, so a driver
/// that cannot be brought back takes the runtime down. Device workers and the
/// notifier degrade the system but do not stop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Driver,
    Device(DeviceKind),
    Notifier,
}

/// Health of a supervised worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskHealthStatus {
    Healthy,
    Stopped,
    Failed,
}

impl std::fmt::Display for TaskHealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskHealthStatus::Healthy => write!(f, "healthy"),
            TaskHealthStatus::Stopped => write!(f, "stopped"),
            TaskHealthStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One worker under supervision
struct SupervisedWorker {
    name: &'static str,
    kind: WorkerKind,
    handle: JoinHandle<SigncastResult<()>>,
    /// None means the worker cannot be restarted
    factory: Option<WorkerFactory>,
    restarts: u32,
    status: TaskHealthStatus,
    last_error: Option<String>,
}

// ----------------------------------------------------------------------------
// Supervisor Task
// ----------------------------------------------------------------------------

/// Supervises the engine task and all worker tasks
pub struct SupervisorTask {
    engine_handle: Option<JoinHandle<SigncastResult<()>>>,
    workers: Vec<SupervisedWorker>,
    health_check_interval: Duration,
    restart_failed_workers: bool,
    max_restart_attempts: u32,
    app_event_sender: AppEventSender,
}

impl SupervisorTask {
    /// Create a new supervisor with the given monitoring settings
    pub fn new(
        health_check_interval: Duration,
        restart_failed_workers: bool,
        max_restart_attempts: u32,
        app_event_sender: AppEventSender,
    ) -> Self {
        Self {
            engine_handle: None,
            workers: Vec::new(),
            health_check_interval,
            restart_failed_workers,
            max_restart_attempts,
            app_event_sender,
        }
    }

    /// Put the engine handle under supervision
    ///
    /// The engine is never restarted here: when it stops, the supervisor
    /// stops with it and the caller decides what comes next.
    pub fn attach_engine(&mut self, handle: JoinHandle<SigncastResult<()>>) {
        self.engine_handle = Some(handle);
    }

    /// Put a worker handle under supervision
    pub fn supervise(
        &mut self,
        name: &'static str,
        kind: WorkerKind,
        handle: JoinHandle<SigncastResult<()>>,
        factory: Option<WorkerFactory>,
    ) {
        self.workers.push(SupervisedWorker {
            name,
            kind,
            handle,
            factory,
            restarts: 0,
            status: TaskHealthStatus::Healthy,
            last_error: None,
        });
    }

    /// Run the supervisor main loop
    ///
    /// Returns Ok when the engine finishes cleanly, Err when the engine fails
    /// or a critical worker is out of restarts.
    pub async fn run(&mut self) -> SigncastResult<()> {
        info!("Supervisor task starting ({} workers)", self.workers.len());

        let mut health_check = interval(self.health_check_interval);
        // The first interval tick fires immediately
        health_check.tick().await;

        loop {
            health_check.tick().await;

            let engine_finished = self
                .engine_handle
                .as_ref()
                .map(|handle| handle.is_finished())
                .unwrap_or(false);
            if engine_finished {
                if let Some(handle) = self.engine_handle.take() {
                    return match handle.await {
                        Ok(Ok(())) => {
                            info!("Engine task finished; supervisor stopping");
                            Ok(())
                        }
                        Ok(Err(e)) => Err(SigncastError::supervision_error(format!(
                            "Engine task failed: {}",
                            e
                        ))),
                        Err(e) => Err(SigncastError::supervision_error(format!(
                            "Engine task panicked: {}",
                            e
                        ))),
                    };
                }
            }

            self.check_workers().await?;
        }
    }

    /// Inspect finished workers and restart or retire them
    async fn check_workers(&mut self) -> SigncastResult<()> {
        for worker in &mut self.workers {
            if worker.status != TaskHealthStatus::Healthy || !worker.handle.is_finished() {
                continue;
            }

            let error = match (&mut worker.handle).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(format!("panicked: {}", e)),
            };
            if let Some(e) = &error {
                worker.last_error = Some(e.clone());
            }

            let can_restart = self.restart_failed_workers
                && worker.restarts < self.max_restart_attempts
                && worker.factory.is_some();

            if can_restart {
                worker.restarts += 1;
                warn!(
                    "Worker {} went down ({}); restarting (attempt {}/{})",
                    worker.name,
                    error.as_deref().unwrap_or("finished"),
                    worker.restarts,
                    self.max_restart_attempts
                );
                if let Some(factory) = &worker.factory {
                    worker.handle = (factory)();
                }
                continue;
            }

            match worker.kind {
                WorkerKind::Driver => {
                    worker.status = TaskHealthStatus::Failed;
                    error!(
                        "Critical worker {} is down and out of restarts ({})",
                        worker.name,
                        error.as_deref().unwrap_or("finished")
                    );
                    return Err(SigncastError::supervision_error(format!(
                        "critical worker {} stopped: {}",
                        worker.name,
                        error.as_deref().unwrap_or("finished")
                    )));
                }
                WorkerKind::Device(device) => {
                    worker.status = TaskHealthStatus::Stopped;
                    warn!(
                        "Device worker {} stopped ({}); running without it",
                        worker.name,
                        error.as_deref().unwrap_or("finished")
                    );
                    if let Err(e) = self
                        .app_event_sender
                        .try_send_non_blocking(AppEvent::DeviceTaskStopped { device })
                    {
                        debug!("Observer channel unavailable ({}); app event dropped", e);
                    }
                }
                WorkerKind::Notifier => {
                    worker.status = TaskHealthStatus::Stopped;
                    warn!(
                        "Notifier stopped ({}); button reports will not go out",
                        error.as_deref().unwrap_or("finished")
                    );
                }
            }
        }

        Ok(())
    }

    /// Current health of every supervised worker by name
    pub fn health_summary(&self) -> HashMap<&'static str, TaskHealthStatus> {
        self.workers
            .iter()
            .map(|worker| (worker.name, worker.status))
            .collect()
    }

    /// Check if every supervised worker is healthy
    pub fn is_healthy(&self) -> bool {
        self.workers
            .iter()
            .all(|worker| worker.status == TaskHealthStatus::Healthy)
    }
}

impl Drop for SupervisorTask {
    fn drop(&mut self) {
        if let Some(handle) = &self.engine_handle {
            handle.abort();
        }
        for worker in &self.workers {
            worker.handle.abort();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use signcast_core::channel::create_app_event_channel;
    use signcast_core::ChannelConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn supervisor_with_channel() -> (
        SupervisorTask,
        signcast_core::channel::AppEventReceiver,
    ) {
        let (sender, receiver) = create_app_event_channel(&ChannelConfig::testing());
        (
            SupervisorTask::new(Duration::from_millis(10), true, 3, sender),
            receiver,
        )
    }

    fn failing_worker() -> JoinHandle<SigncastResult<()>> {
        tokio::spawn(async { Err(SigncastError::channel_error("worker lost its channel")) })
    }

    async fn until_finished(supervisor: &SupervisorTask) {
        while !supervisor.workers.iter().all(|w| w.handle.is_finished()) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_supervisor_starts_healthy() {
        let (supervisor, _receiver) = supervisor_with_channel();
        assert!(supervisor.is_healthy());
        assert!(supervisor.health_summary().is_empty());
    }

    #[tokio::test]
    async fn test_failed_worker_restarts_through_factory() {
        let (mut supervisor, _receiver) = supervisor_with_channel();

        let spawned = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&spawned);
        let factory: WorkerFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async { Ok(()) })
        });

        supervisor.supervise("rotator", WorkerKind::Driver, failing_worker(), Some(factory));
        until_finished(&supervisor).await;

        supervisor.check_workers().await.unwrap();

        assert_eq!(spawned.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.workers[0].restarts, 1);
        assert!(supervisor.is_healthy());
        assert!(supervisor.workers[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("worker lost its channel"));
    }

    #[tokio::test]
    async fn test_critical_worker_without_restarts_escalates() {
        let (mut supervisor, _receiver) = supervisor_with_channel();
        supervisor.restart_failed_workers = false;

        supervisor.supervise("rotator", WorkerKind::Driver, failing_worker(), None);
        until_finished(&supervisor).await;

        let err = supervisor.check_workers().await.unwrap_err();
        assert!(err.to_string().contains("rotator"));
        assert!(!supervisor.is_healthy());
        assert_eq!(
            supervisor.health_summary().get("rotator"),
            Some(&TaskHealthStatus::Failed)
        );
    }

    #[tokio::test]
    async fn test_device_worker_stop_is_reported_not_fatal() {
        let (mut supervisor, mut receiver) = supervisor_with_channel();
        supervisor.restart_failed_workers = false;

        supervisor.supervise(
            "lights",
            WorkerKind::Device(DeviceKind::Lights),
            failing_worker(),
            None,
        );
        until_finished(&supervisor).await;

        supervisor.check_workers().await.unwrap();

        assert_eq!(
            supervisor.health_summary().get("lights"),
            Some(&TaskHealthStatus::Stopped)
        );
        match receiver.try_recv() {
            Ok(AppEvent::DeviceTaskStopped { device }) => {
                assert_eq!(device, DeviceKind::Lights)
            }
            other => panic!("Expected DeviceTaskStopped, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_restart_attempts_are_bounded() {
        let (mut supervisor, _receiver) = supervisor_with_channel();
        supervisor.max_restart_attempts = 1;

        let factory: WorkerFactory = Box::new(failing_worker);
        supervisor.supervise("rotator", WorkerKind::Driver, failing_worker(), Some(factory));

        // First failure consumes the only restart
        until_finished(&supervisor).await;
        supervisor.check_workers().await.unwrap();
        assert_eq!(supervisor.workers[0].restarts, 1);

        // Second failure has nowhere to go
        until_finished(&supervisor).await;
        let err = supervisor.check_workers().await.unwrap_err();
        assert!(err.to_string().contains("critical worker"));
    }
}
