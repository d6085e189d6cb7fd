//! Engine Command and Event Handlers
//!
//! Contains the command and event handling logic of the engine task. Handlers
//! mutate the engine state and return the effects and observer events to
//! send; the task owns the channels and the timing.

use std::sync::atomic::Ordering;
use std::time::Duration;

use signcast_core::{
    AppEvent, DeviceAddr, DeviceKind, Effect, MessageId, SigncastResult, SignMessage, SyncOutcome,
    Timestamp, Tone,
};
use tracing::{debug, info, warn};

use super::state::EngineState;

/// Command and event handlers for the engine task
pub struct EngineHandlers;

impl EngineHandlers {
    // ------------------------------------------------------------------------
    // Command Handlers
    // ------------------------------------------------------------------------

    /// Handle a posted message: insert into the board and reconcile
    pub fn handle_post_message(
        state: &mut EngineState,
        message: SignMessage,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        let id = message.id;
        let priority = message.priority;

        if let Err(e) = state.board.insert(message) {
            warn!("Rejected message {}: {}", id, e);
            return Ok((
                Vec::new(),
                vec![AppEvent::SystemError {
                    error: format!("Rejected message {}: {}", id, e),
                }],
            ));
        }

        debug!("Message {} posted at priority {}", id, priority);
        // Arrivals reconcile immediately instead of waiting out the sync timer
        Self::handle_sync(state, "post-message")
    }

    /// Handle a removal: drop from the board and reconcile
    pub fn handle_remove_message(
        state: &mut EngineState,
        id: MessageId,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        match state.board.remove(&id) {
            Some(_) => debug!("Message {} removed from the board", id),
            None => debug!("Remove requested for {}, which is not on the board", id),
        }
        Self::handle_sync(state, "remove-message")
    }

    /// Handle clear-all: empty the board, stop deliveries, reconcile
    pub fn handle_clear_all(
        state: &mut EngineState,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        info!("Clearing all messages and stopping deliveries");
        state.board.clear();
        // Slots reset first so the empty-board pass sees no delivery running
        // and returns the lights to standby
        state.slots.reset();

        let mut effects = vec![Effect::FinishAllActivities];
        let (sync_effects, sync_events) = Self::handle_sync(state, "clear-all")?;
        effects.extend(sync_effects);

        let mut app_events = sync_events;
        app_events.push(state.delivery_state_event());
        Ok((effects, app_events))
    }

    /// Run one reconciliation pass against the board
    ///
    /// The pass is guarded by a compare-and-swap: a trigger arriving while a
    /// pass holds the guard is dropped silently, never queued.
    pub fn handle_sync(
        state: &mut EngineState,
        origin: &str,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        if state
            .sync_guard
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            state.stats.syncs_skipped += 1;
            debug!("Reconciliation already in flight; {} trigger dropped", origin);
            return Ok((Vec::new(), Vec::new()));
        }

        let snapshot = state.board.snapshot();
        // The deliverable count goes out before the lists move
        let mut app_events = vec![AppEvent::DeliverableCountChanged { count: snapshot.len }];
        let mut effects = Vec::new();

        let outcome = state.rotation.sync_pass(&snapshot);
        state.stats.sync_passes += 1;

        match outcome {
            SyncOutcome::BoardEmpty { had_entries } => {
                if had_entries {
                    info!("Board drained; rotation cleared ({})", origin);
                }
                if !state.slots.is_delivering() {
                    effects.push(Effect::LightsStandby);
                }
            }
            SyncOutcome::Seeded { purged, seeded } => {
                info!(
                    "Rotation seeded with {} messages at the highest priority ({} purged)",
                    seeded, purged
                );
            }
            SyncOutcome::Preempted { purged, seeded } => {
                info!(
                    "Higher priority class preempted the rotation: {} seeded, {} purged",
                    seeded, purged
                );
            }
            SyncOutcome::Held { purged } => {
                debug!(
                    "Mixed priorities on the board; rotation held ({} purged)",
                    purged
                );
            }
            SyncOutcome::Queued { purged, queued } => {
                if queued > 0 {
                    debug!(
                        "{} same-class arrivals queued for injection ({} purged)",
                        queued, purged
                    );
                }
            }
        }

        state.sync_guard.store(false, Ordering::Release);
        Ok((effects, app_events))
    }

    /// Handle a system status request
    pub fn handle_system_status(
        state: &EngineState,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        let now = Timestamp::now();
        let uptime_seconds = now.duration_since(state.start_time).as_secs();

        let app_events = vec![AppEvent::SystemStatusReport {
            deliverable_count: state.board.len(),
            rotation_len: state.rotation.main().len(),
            incoming_len: state.rotation.incoming().len(),
            current: state.slots.current(),
            last_completed: state.slots.last_completed(),
            uptime_seconds,
            sync_passes: state.stats.sync_passes,
            deliveries_completed: state.stats.deliveries_completed,
        }];

        Ok((Vec::new(), app_events))
    }

    // ------------------------------------------------------------------------
    // Event Handlers
    // ------------------------------------------------------------------------

    /// Handle the renderer confirming a message on screen
    pub fn handle_delivery_started(
        state: &mut EngineState,
        message_id: MessageId,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        if state.slots.mark_started(message_id) {
            debug!("Delivery of {} confirmed on screen", message_id);
            Ok((Vec::new(), vec![state.delivery_state_event()]))
        } else {
            debug!(
                "Stray start event for {}; no matching delivery in flight",
                message_id
            );
            Ok((Vec::new(), Vec::new()))
        }
    }

    /// Handle the renderer finishing a message
    pub fn handle_delivery_completed(
        state: &mut EngineState,
        message_id: MessageId,
        skip_write: bool,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        match state.slots.complete(message_id, skip_write) {
            Some(done) => {
                state.stats.deliveries_completed += 1;
                if done.flag_mismatch {
                    debug!(
                        "Completion flag for {} disagreed with the in-flight token; the token wins",
                        message_id
                    );
                }
                if !state.board.record_delivery(&done.id) {
                    debug!("Completed message {} already left the board", done.id);
                }
                debug!(
                    "Delivery of {} completed (anchor {})",
                    done.id,
                    if done.anchor_skipped { "held" } else { "advanced" }
                );
                Ok((Vec::new(), vec![state.delivery_state_event()]))
            }
            None => {
                debug!("Stray completion event for {}", message_id);
                Ok((Vec::new(), Vec::new()))
            }
        }
    }

    /// Handle the speech synthesizer reporting an utterance ready
    pub fn handle_speech_ready(
        message_id: MessageId,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        debug!("Speech prepared for {}", message_id);
        Ok((Vec::new(), Vec::new()))
    }

    /// Handle a hardware button press
    ///
    /// Repeat presses of the same button inside the lockout window are
    /// ignored; an accepted press hands a report to the notifier.
    pub fn handle_button_pressed(
        state: &mut EngineState,
        lockout: Duration,
        device_type: String,
        addr: DeviceAddr,
        button: u8,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        let now = Timestamp::now();

        if let Some(last) = state.button_lockouts.get(&(addr, button)) {
            if now.duration_since(*last) < lockout {
                debug!(
                    "Button {} on {} pressed inside the lockout window; ignoring",
                    button, addr
                );
                return Ok((Vec::new(), Vec::new()));
            }
        }
        state.button_lockouts.insert((addr, button), now);

        info!("Button {} pressed on {} ({})", button, addr, device_type);
        let effects = vec![Effect::PostButtonReport {
            device_type,
            addr,
            button,
            pressed_at: now,
        }];
        Ok((effects, Vec::new()))
    }

    /// Handle the notifier reporting a button report settled
    pub fn handle_button_report_finished(
        addr: DeviceAddr,
        button: u8,
        delivered: bool,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        let tone = if delivered {
            info!("Button {} report from {} delivered", button, addr);
            Tone::Success
        } else {
            warn!("Button {} report from {} failed", button, addr);
            Tone::Failure
        };
        Ok((vec![Effect::PlayTone { tone }], Vec::new()))
    }

    /// Handle a device task reporting an error
    pub fn handle_device_error(
        device: DeviceKind,
        error: String,
    ) -> SigncastResult<(Vec<Effect>, Vec<AppEvent>)> {
        warn!("Device {} error: {}", device, error);
        let app_events = vec![AppEvent::SystemError {
            error: format!("Device {}: {}", device, error),
        }];
        Ok((Vec::new(), app_events))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use signcast_core::{MessageBoard, Modality, Priority};
    use std::sync::atomic::Ordering;

    fn state_with_board() -> EngineState {
        EngineState::new(MessageBoard::new())
    }

    fn text_message(priority: i32, body: &str) -> SignMessage {
        SignMessage::new(Priority::new(priority), Modality::Text, body)
    }

    #[test]
    fn test_post_message_seeds_rotation() {
        let mut state = state_with_board();
        let message = text_message(5, "hello");
        let id = message.id;

        let (_, app_events) = EngineHandlers::handle_post_message(&mut state, message).unwrap();

        assert_eq!(state.rotation.main(), &[id]);
        assert!(matches!(
            app_events[0],
            AppEvent::DeliverableCountChanged { count: 1 }
        ));
    }

    #[test]
    fn test_post_rejects_empty_content() {
        let mut state = state_with_board();
        let message = text_message(5, "   ");

        let (effects, app_events) =
            EngineHandlers::handle_post_message(&mut state, message).unwrap();

        assert!(effects.is_empty());
        assert!(matches!(app_events[0], AppEvent::SystemError { .. }));
        assert!(state.board.is_empty());
        assert_eq!(state.stats.sync_passes, 0);
    }

    #[test]
    fn test_sync_guard_drops_reentrant_trigger() {
        let mut state = state_with_board();
        state.sync_guard.store(true, Ordering::Release);

        let (effects, app_events) = EngineHandlers::handle_sync(&mut state, "test").unwrap();

        assert!(effects.is_empty());
        assert!(app_events.is_empty());
        assert_eq!(state.stats.syncs_skipped, 1);
        assert_eq!(state.stats.sync_passes, 0);

        // Releasing the guard lets the next trigger through
        state.sync_guard.store(false, Ordering::Release);
        let (_, app_events) = EngineHandlers::handle_sync(&mut state, "test").unwrap();
        assert_eq!(state.stats.sync_passes, 1);
        assert!(!app_events.is_empty());
    }

    #[test]
    fn test_empty_board_sync_sends_lights_standby() {
        let mut state = state_with_board();

        let (effects, _) = EngineHandlers::handle_sync(&mut state, "test").unwrap();
        assert!(matches!(effects[0], Effect::LightsStandby));

        // With a delivery underway the lights stay where they are
        let mut state = state_with_board();
        state
            .slots
            .try_begin(MessageId::random(), false, Timestamp::new(0));
        let (effects, _) = EngineHandlers::handle_sync(&mut state, "test").unwrap();
        assert!(effects.is_empty());
    }

    #[test]
    fn test_clear_all_finishes_activities() {
        let mut state = state_with_board();
        EngineHandlers::handle_post_message(&mut state, text_message(5, "a")).unwrap();
        state
            .slots
            .try_begin(state.rotation.main()[0], false, Timestamp::new(0));

        let (effects, app_events) = EngineHandlers::handle_clear_all(&mut state).unwrap();

        assert!(matches!(effects[0], Effect::FinishAllActivities));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::LightsStandby)));
        assert!(state.board.is_empty());
        assert!(state.rotation.is_empty());
        assert!(!state.slots.is_delivering());
        assert!(app_events
            .iter()
            .any(|e| matches!(e, AppEvent::DeliverableCountChanged { count: 0 })));
    }

    #[test]
    fn test_completion_bumps_board_counter() {
        let mut state = state_with_board();
        let message = text_message(5, "count me");
        let id = message.id;
        EngineHandlers::handle_post_message(&mut state, message).unwrap();
        state.slots.try_begin(id, false, Timestamp::new(0));
        state.slots.mark_started(id);

        let (_, app_events) =
            EngineHandlers::handle_delivery_completed(&mut state, id, false).unwrap();

        assert_eq!(state.board.get(&id).unwrap().times_delivered, 1);
        assert_eq!(state.stats.deliveries_completed, 1);
        assert!(matches!(
            app_events[0],
            AppEvent::DeliveryStateChanged {
                last_completed: Some(anchor),
                ..
            } if anchor == id
        ));
    }

    #[test]
    fn test_button_lockout_window() {
        let mut state = state_with_board();
        let addr = DeviceAddr::new([1, 2, 3, 4, 5, 6]);
        let lockout = Duration::from_secs(5);

        let (effects, _) = EngineHandlers::handle_button_pressed(
            &mut state,
            lockout,
            "wireless-button".into(),
            addr,
            1,
        )
        .unwrap();
        assert!(matches!(effects[0], Effect::PostButtonReport { .. }));

        // Same button again inside the window: dropped
        let (effects, _) = EngineHandlers::handle_button_pressed(
            &mut state,
            lockout,
            "wireless-button".into(),
            addr,
            1,
        )
        .unwrap();
        assert!(effects.is_empty());

        // A different button on the same device is its own window
        let (effects, _) = EngineHandlers::handle_button_pressed(
            &mut state,
            lockout,
            "wireless-button".into(),
            addr,
            2,
        )
        .unwrap();
        assert!(matches!(effects[0], Effect::PostButtonReport { .. }));
    }

    #[test]
    fn test_button_report_tones() {
        let (effects, _) = EngineHandlers::handle_button_report_finished(
            DeviceAddr::new([0; 6]),
            1,
            true,
        )
        .unwrap();
        assert!(matches!(
            effects[0],
            Effect::PlayTone { tone: Tone::Success }
        ));

        let (effects, _) = EngineHandlers::handle_button_report_finished(
            DeviceAddr::new([0; 6]),
            1,
            false,
        )
        .unwrap();
        assert!(matches!(
            effects[0],
            Effect::PlayTone { tone: Tone::Failure }
        ));
    }

    #[test]
    fn test_status_report_reflects_state() {
        let mut state = state_with_board();
        EngineHandlers::handle_post_message(&mut state, text_message(5, "a")).unwrap();
        EngineHandlers::handle_post_message(&mut state, text_message(5, "b")).unwrap();

        let (_, app_events) = EngineHandlers::handle_system_status(&state).unwrap();
        match &app_events[0] {
            AppEvent::SystemStatusReport {
                deliverable_count,
                rotation_len,
                incoming_len,
                sync_passes,
                ..
            } => {
                assert_eq!(*deliverable_count, 2);
                // First post seeded one entry, second post queued the other
                assert_eq!(*rotation_len, 1);
                assert_eq!(*incoming_len, 1);
                assert_eq!(*sync_passes, 2);
            }
            other => panic!("Expected SystemStatusReport, got {:?}", other),
        }
    }
}
