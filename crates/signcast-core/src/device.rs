//! Device Task Trait Definition
//!
//! Defines the common interface for device tasks in the signcast runtime.
//! Concrete implementations live with the hardware they drive; the runtime
//! only knows this seam.

use crate::{
    channel::{DeviceKind, EffectReceiver, EventSender},
    Result as SigncastResult,
};

// ----------------------------------------------------------------------------
// Device Task Trait
// ----------------------------------------------------------------------------

/// Common interface for device tasks
///
/// Device tasks are independent async tasks that drive one peripheral
/// concern: the screen renderer, the light hardware, button receivers, the
/// speech synthesizer, or audio playback. They communicate with the engine
/// via CSP channels and execute effects received from it.
///
/// ## Architecture
///
/// Each device task:
/// - Runs independently with its own async event loop via the `run()` method
/// - Receives effects from the engine via `EffectReceiver` channel
/// - Sends events to the engine via `EventSender` channel
/// - Maintains no shared state with other tasks
/// - Lifecycle (spawning/aborting) is managed by `SigncastRuntime`
#[async_trait::async_trait]
pub trait DeviceTask: Send + Sync {
    /// Attach CSP channels created by the runtime
    ///
    /// Device implementations must store these handles internally and use
    /// them for all communication with the engine task.
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> SigncastResult<()>;

    /// Run the device's main event loop
    ///
    /// This future should run until the device is shut down. The
    /// implementation should handle initialization, process effects from the
    /// engine, and perform cleanup when the future is cancelled.
    ///
    /// The `SigncastRuntime` is responsible for spawning this as a task and
    /// managing its lifecycle (including cancellation).
    async fn run(&mut self) -> SigncastResult<()>;

    /// Get the device kind identifier
    ///
    /// Used by the runtime to reject duplicate registrations and by the
    /// supervisor to name the task in health reports.
    fn kind(&self) -> DeviceKind;
}
