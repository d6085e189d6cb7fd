//! Periodic Driver Tasks
//!
//! The engine is paced by two independent periodic drivers: one fires the
//! reconciliation pass, the other fires the rotator tick. A driver sleeps its
//! interval, fires once into a capacity-one tick channel, and repeats. A tick
//! that arrives while the engine is still working the previous one finds the
//! channel full and is dropped silently; ticks coalesce instead of queueing.

use signcast_core::SigncastResult;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Tick Channels
// ----------------------------------------------------------------------------

pub type TickSender = mpsc::Sender<()>;
pub type TickReceiver = mpsc::Receiver<()>;

/// Create a tick channel
///
/// Capacity is fixed at one: at most a single pending tick, so a slow engine
/// pass absorbs bursts instead of replaying them.
pub fn create_tick_channel() -> (TickSender, TickReceiver) {
    mpsc::channel(1)
}

// ----------------------------------------------------------------------------
// Periodic Driver
// ----------------------------------------------------------------------------

/// Long-lived loop that fires a tick at a fixed cadence
pub struct PeriodicDriver {
    name: &'static str,
    interval: Duration,
    tick_sender: TickSender,
}

impl PeriodicDriver {
    /// Create a new driver firing into the given tick channel
    pub fn new(name: &'static str, interval: Duration, tick_sender: TickSender) -> Self {
        Self {
            name,
            interval,
            tick_sender,
        }
    }

    /// Run the driver loop until the tick channel closes
    ///
    /// Channel closure is the stop signal: when the engine task goes away its
    /// receiver drops and the driver winds down on its next fire.
    pub async fn run(self) -> SigncastResult<()> {
        info!(
            "{} driver starting with a {:?} interval",
            self.name, self.interval
        );

        loop {
            tokio::time::sleep(self.interval).await;

            match self.tick_sender.try_send(()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(())) => {
                    debug!(
                        "{} tick dropped; the engine is still working the previous one",
                        self.name
                    );
                }
                Err(mpsc::error::TrySendError::Closed(())) => {
                    info!("{} tick channel closed; driver stopping", self.name);
                    return Ok(());
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_driver_fires_ticks() {
        let (sender, mut receiver) = create_tick_channel();
        let driver = PeriodicDriver::new("test", Duration::from_millis(5), sender);
        let handle = tokio::spawn(driver.run());

        let tick = timeout(Duration::from_millis(200), receiver.recv()).await;
        assert!(tick.is_ok());

        handle.abort();
    }

    #[tokio::test]
    async fn test_late_ticks_coalesce() {
        let (sender, mut receiver) = create_tick_channel();
        let driver = PeriodicDriver::new("test", Duration::from_millis(5), sender);
        let handle = tokio::spawn(driver.run());

        // Nobody drains the channel, so however many intervals pass, at most
        // one tick is pending
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        let mut pending = 0;
        while receiver.try_recv().is_ok() {
            pending += 1;
        }
        assert_eq!(pending, 1);
    }

    #[tokio::test]
    async fn test_driver_stops_when_channel_closes() {
        let (sender, receiver) = create_tick_channel();
        let driver = PeriodicDriver::new("test", Duration::from_millis(5), sender);
        let handle = tokio::spawn(driver.run());

        drop(receiver);

        let result = timeout(Duration::from_millis(200), handle)
            .await
            .expect("driver should stop after channel closure")
            .expect("driver task should not panic");
        assert!(result.is_ok());
    }
}
