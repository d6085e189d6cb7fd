//! Engine Task State Management
//!
//! Contains the engine state owned exclusively by the engine task, plus its
//! statistics counters.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use signcast_core::{
    AppEvent, DeliverySlots, DeviceAddr, MessageBoard, RotationState, Timestamp,
};

// ----------------------------------------------------------------------------
// Engine State
// ----------------------------------------------------------------------------

/// Rotation and delivery state owned by the engine task
///
/// The board is shared with external producers; everything else is private to
/// the engine task, which serializes all access through its event loop.
pub struct EngineState {
    /// Shared deliverable message collection
    pub board: MessageBoard,
    /// The two rotation lists
    pub rotation: RotationState,
    /// The delivery lifecycle slots and the single-flight token
    pub slots: DeliverySlots,
    /// Last accepted press per (address, button), for the lockout window
    pub button_lockouts: HashMap<(DeviceAddr, u8), Timestamp>,
    /// Guard preventing overlapping reconciliation passes
    pub sync_guard: AtomicBool,
    /// Task start time for uptime calculation
    pub start_time: Timestamp,
    /// Statistics
    pub stats: EngineStats,
}

impl EngineState {
    /// Create engine state around an externally owned board
    pub fn new(board: MessageBoard) -> Self {
        Self {
            board,
            rotation: RotationState::new(),
            slots: DeliverySlots::new(),
            button_lockouts: HashMap::new(),
            sync_guard: AtomicBool::new(false),
            start_time: Timestamp::now(),
            stats: EngineStats::default(),
        }
    }

    /// Snapshot the delivery slots into an observer event
    pub fn delivery_state_event(&self) -> AppEvent {
        AppEvent::DeliveryStateChanged {
            loading: self.slots.loading(),
            current: self.slots.current(),
            last_completed: self.slots.last_completed(),
        }
    }
}

// ----------------------------------------------------------------------------
// Engine Statistics
// ----------------------------------------------------------------------------

/// Statistics for the engine task
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub commands_processed: u64,
    pub events_processed: u64,
    pub effects_generated: u64,
    pub app_events_generated: u64,
    pub sync_passes: u64,
    pub syncs_skipped: u64,
    pub rotate_ticks: u64,
    pub deliveries_dispatched: u64,
    pub deliveries_completed: u64,
    pub deliveries_forced: u64,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use signcast_core::{MessageId, SystemTimeSource, TimeSource};

    #[test]
    fn test_new_state_is_idle() {
        let state = EngineState::new(MessageBoard::new());
        assert!(state.rotation.is_empty());
        assert!(!state.slots.is_delivering());
        assert_eq!(state.stats.sync_passes, 0);
        assert!(state.start_time <= SystemTimeSource.now());
    }

    #[test]
    fn test_delivery_state_event_tracks_slots() {
        let mut state = EngineState::new(MessageBoard::new());
        let id = MessageId::random();
        state.slots.try_begin(id, false, Timestamp::new(0));

        match state.delivery_state_event() {
            AppEvent::DeliveryStateChanged {
                loading,
                current,
                last_completed,
            } => {
                assert_eq!(loading, Some(id));
                assert_eq!(current, None);
                assert_eq!(last_completed, None);
            }
            other => panic!("Expected DeliveryStateChanged, got {:?}", other),
        }
    }
}
