//! Signcast Runtime Engine
//!
//! This crate contains the async runtime for the signcast signage engine,
//! including:
//! - `SigncastRuntime`: the orchestrator that wires the engine, timer
//!   drivers, button notifier, and device tasks together
//! - `EngineTask`: the single-owner task that serializes all board,
//!   rotation, and delivery state changes
//! - `SupervisorTask`: failure detection, worker restart, and escalation
//!
//! This is the "engine room" of signcast; `signcast-core` provides the
//! domain model and the typed channel protocol.

pub mod builder;
pub mod drivers;
pub mod engine;
pub mod notify;
mod runtime;
pub mod supervisor;
pub mod testing;

pub use builder::{create_test_runtime, RuntimeBuilder, RuntimeHandle, SupervisorConfig};
pub use drivers::{create_tick_channel, PeriodicDriver, TickReceiver, TickSender};
pub use engine::{EngineState, EngineStats, EngineTask};
pub use notify::ButtonNotifier;
pub use runtime::*;
pub use supervisor::{SupervisorTask, TaskHealthStatus, WorkerKind};
pub use testing::RecordingDevice;

// Re-export core types for convenience
pub use signcast_core::{
    channel::{
        create_app_event_channel, create_command_channel, create_effect_channel,
        create_effect_receiver, create_event_channel, AppEvent, AppEventReceiver, AppEventSender,
        ChannelError, Command, CommandReceiver, CommandSender, Effect, EffectReceiver,
        EffectSender, Event, EventReceiver, EventSender, NonBlockingSend,
    },
    DeviceKind, DeviceTask, MessageBoard, SigncastConfig, SigncastError, SigncastResult,
    SignMessage,
};
