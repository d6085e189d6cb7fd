//! Signcast Core Engine Implementation
//!
//! This crate provides the domain model and pure state machines for the
//! signcast signage engine: the shared deliverable board, the rotation and
//! delivery state machines, dispatch planning, and the typed CSP channel
//! protocol that connects the engine task to its device tasks. Everything
//! here is synchronous and side-effect free; the async orchestration lives
//! in `signcast-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod board;
pub mod channel;
pub mod config;
pub mod delivery;
pub mod device;
pub mod dispatch;
pub mod errors;
pub mod message;
pub mod rotation;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use board::{BoardSnapshot, MessageBoard};
pub use channel::{ActivityKind, AppEvent, Command, DeviceKind, Effect, Event, Tone};
pub use config::{ChannelConfig, EngineConfig, NotifyConfig, SharedSigncastConfig, SigncastConfig};
pub use delivery::{CompletedDelivery, DeliverySlots, InFlight};
pub use device::DeviceTask;
pub use dispatch::{plan_delivery, DispatchPlan};
pub use errors::{
    DeviceError, DispatchError, MessageError, NotifyError, Result, SigncastError, SigncastResult,
};
pub use message::{LightCode, Modality, SignMessage};
pub use rotation::{RotationPick, RotationState, SyncOutcome};
pub use types::{DeviceAddr, MessageId, Priority, SystemTimeSource, TimeSource, Timestamp};
