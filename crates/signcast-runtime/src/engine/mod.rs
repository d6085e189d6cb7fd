//! Engine Module
//!
//! The single-owner engine of the runtime:
//! - `state`: consolidated mutable state (board handle, rotation, slots)
//! - `handlers`: command and event handlers, pure over the state
//! - `task`: the async task that serializes everything through one loop

pub mod handlers;
pub mod state;
pub mod task;

pub use handlers::EngineHandlers;
pub use state::{EngineState, EngineStats};
pub use task::EngineTask;
