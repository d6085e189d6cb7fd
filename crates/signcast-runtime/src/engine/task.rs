//! Engine Task Implementation
//!
//! Contains the main EngineTask struct and its coordination loop. The task
//! owns all mutable engine state; commands, device events, and timer ticks
//! are serialized through one `select!` loop, so handlers never contend for
//! locks.

use signcast_core::channel::{
    AppEventSender, CommandReceiver, EffectSender, EventReceiver, NonBlockingSend,
};
use signcast_core::{
    plan_delivery, AppEvent, Command, Effect, EngineConfig, Event, LightCode, MessageId,
    NotifyConfig, SigncastError, SigncastResult, SystemTimeSource, TimeSource, Timestamp,
};
use tracing::{debug, error, info, warn};

use super::handlers::EngineHandlers;
use super::state::EngineState;
use crate::drivers::TickReceiver;

// ----------------------------------------------------------------------------
// Engine Task
// ----------------------------------------------------------------------------

/// The engine task that processes all commands, device events, and ticks
pub struct EngineTask {
    /// Rotation, slots, board handle, and counters
    state: EngineState,
    /// Cadence and timeout settings
    config: EngineConfig,
    /// Button lockout window
    notify_config: NotifyConfig,
    /// Channel for receiving commands from operator surfaces
    command_receiver: CommandReceiver,
    /// Channel for receiving events from device tasks
    event_receiver: EventReceiver,
    /// Reconciliation timer ticks
    sync_tick_receiver: TickReceiver,
    /// Rotator timer ticks
    rotate_tick_receiver: TickReceiver,
    /// Channel for broadcasting effects to device tasks
    effect_sender: EffectSender,
    /// Channel for sending app events to observers
    app_event_sender: AppEventSender,
    /// Set once the event channel returns None, so the loop stops polling it
    events_closed: bool,
    sync_ticks_closed: bool,
    rotate_ticks_closed: bool,
    /// Whether the task should continue running
    running: bool,
}

impl EngineTask {
    /// Create a new engine task
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: EngineState,
        config: EngineConfig,
        notify_config: NotifyConfig,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        sync_tick_receiver: TickReceiver,
        rotate_tick_receiver: TickReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
    ) -> Self {
        Self {
            state,
            config,
            notify_config,
            command_receiver,
            event_receiver,
            sync_tick_receiver,
            rotate_tick_receiver,
            effect_sender,
            app_event_sender,
            events_closed: false,
            sync_ticks_closed: false,
            rotate_ticks_closed: false,
            running: true,
        }
    }

    /// Run the main engine task loop
    pub async fn run(&mut self) -> SigncastResult<()> {
        info!("Engine task starting");

        while self.running {
            tokio::select! {
                // Process command from operator surfaces
                command = self.command_receiver.recv() => {
                    match command {
                        Some(cmd) => {
                            if let Err(e) = self.process_command(cmd) {
                                if e.is_fatal() {
                                    error!("Unrecoverable error processing command, shutting down engine: {}", e);
                                    self.running = false;
                                } else {
                                    warn!("Error processing command: {}", e);
                                }
                            }
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }

                // Process event from device tasks
                event = self.event_receiver.recv(), if !self.events_closed => {
                    match event {
                        Some(evt) => {
                            if let Err(e) = self.process_event(evt) {
                                if e.is_fatal() {
                                    error!("Unrecoverable error processing event, shutting down engine: {}", e);
                                    self.running = false;
                                } else {
                                    warn!("Error processing event: {}", e);
                                }
                            }
                        }
                        None => {
                            info!("Device event channel closed");
                            // Keep running on commands and ticks alone
                            self.events_closed = true;
                        }
                    }
                }

                // Reconciliation timer
                tick = self.sync_tick_receiver.recv(), if !self.sync_ticks_closed => {
                    match tick {
                        Some(()) => {
                            if let Err(e) = self.handle_sync_tick() {
                                warn!("Error in reconciliation pass: {}", e);
                            }
                        }
                        None => {
                            info!("Reconciliation driver stopped");
                            self.sync_ticks_closed = true;
                        }
                    }
                }

                // Rotator timer
                tick = self.rotate_tick_receiver.recv(), if !self.rotate_ticks_closed => {
                    match tick {
                        Some(()) => {
                            if let Err(e) = self.handle_rotate_tick() {
                                warn!("Error in rotator pass: {}", e);
                            }
                        }
                        None => {
                            info!("Rotator driver stopped");
                            self.rotate_ticks_closed = true;
                        }
                    }
                }
            }
        }

        info!("Engine task stopped");
        Ok(())
    }

    /// Stop the engine task
    pub fn stop(&mut self) {
        self.running = false;
    }

    // ------------------------------------------------------------------------
    // Command and Event Processing
    // ------------------------------------------------------------------------

    /// Process a command, then send the resulting effects and app events
    fn process_command(&mut self, command: Command) -> SigncastResult<()> {
        self.state.stats.commands_processed += 1;

        let (effects, app_events) = match command {
            Command::PostMessage { message } => {
                EngineHandlers::handle_post_message(&mut self.state, message)?
            }
            Command::RemoveMessage { id } => {
                EngineHandlers::handle_remove_message(&mut self.state, id)?
            }
            Command::ClearAllMessages => EngineHandlers::handle_clear_all(&mut self.state)?,
            Command::SyncNow => EngineHandlers::handle_sync(&mut self.state, "operator")?,
            Command::GetSystemStatus => EngineHandlers::handle_system_status(&self.state)?,
            Command::Shutdown => {
                info!("Shutdown command received");
                self.running = false;
                (
                    vec![Effect::FinishAllActivities, Effect::LightsStandby],
                    Vec::new(),
                )
            }
        };

        for effect in effects {
            self.send_effect(effect);
        }
        for app_event in app_events {
            self.send_app_event(app_event);
        }

        Ok(())
    }

    /// Process an event from device tasks
    fn process_event(&mut self, event: Event) -> SigncastResult<()> {
        self.state.stats.events_processed += 1;

        let (effects, app_events) = match event {
            Event::DeliveryStarted { message_id } => {
                EngineHandlers::handle_delivery_started(&mut self.state, message_id)?
            }
            Event::DeliveryCompleted {
                message_id,
                skip_write,
            } => EngineHandlers::handle_delivery_completed(&mut self.state, message_id, skip_write)?,
            Event::SpeechReady { message_id } => EngineHandlers::handle_speech_ready(message_id)?,
            Event::ButtonPressed {
                device_type,
                addr,
                button,
            } => EngineHandlers::handle_button_pressed(
                &mut self.state,
                self.notify_config.button_lockout,
                device_type,
                addr,
                button,
            )?,
            Event::ButtonReportFinished {
                addr,
                button,
                delivered,
            } => EngineHandlers::handle_button_report_finished(addr, button, delivered)?,
            Event::DeviceError { device, error } => {
                EngineHandlers::handle_device_error(device, error)?
            }
        };

        for effect in effects {
            self.send_effect(effect);
        }
        for app_event in app_events {
            self.send_app_event(app_event);
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Timer Handling
    // ------------------------------------------------------------------------

    /// One reconciliation tick
    fn handle_sync_tick(&mut self) -> SigncastResult<()> {
        let (effects, app_events) = EngineHandlers::handle_sync(&mut self.state, "timer")?;
        for effect in effects {
            self.send_effect(effect);
        }
        for app_event in app_events {
            self.send_app_event(app_event);
        }
        Ok(())
    }

    /// One rotator tick: pick the next message and dispatch it
    ///
    /// Injections go out ahead of the round-robin, and a stalled delivery is
    /// forced out of the way before either.
    fn handle_rotate_tick(&mut self) -> SigncastResult<()> {
        self.state.stats.rotate_ticks += 1;
        let now = SystemTimeSource::new().now();

        if let Some(stalled) = self.state.slots.timed_out(now, self.config.delivery_timeout) {
            let stalled_for = now.duration_since(stalled.dispatched_at);
            warn!(
                "Delivery of {} stalled for {:?}; forcing the rotation forward",
                stalled.id, stalled_for
            );
            self.state.slots.force_complete();
            self.state.stats.deliveries_forced += 1;
            self.send_app_event(AppEvent::RotationStalled {
                message_id: stalled.id,
                stalled_for,
            });
            let event = self.state.delivery_state_event();
            self.send_app_event(event);
        }

        if self.state.slots.is_busy() {
            debug!("A delivery is still in flight; skipping rotator tick");
            return Ok(());
        }

        if let Some(id) = self.state.rotation.pop_incoming() {
            debug!("Injecting {} ahead of the rotation", id);
            self.dispatch(id, true, now);
            return Ok(());
        }

        let pick = match self
            .state
            .rotation
            .next_in_rotation(self.state.slots.last_completed())
        {
            Some(pick) => pick,
            None => return Ok(()),
        };
        if pick.anchor_lost {
            warn!("Round-robin anchor left the rotation; restarting at the head");
        }

        if self.dispatch(pick.id, false, now) {
            let following_light = self
                .state
                .board
                .get(&pick.following)
                .map(|m| m.light_code)
                .unwrap_or(LightCode::None);
            self.state.slots.stage_light(following_light);
        }

        Ok(())
    }

    /// Dispatch one message: lights and speech now, the activity launch after
    /// the light lead delay
    ///
    /// Returns true when the message actually went out.
    fn dispatch(&mut self, id: MessageId, skip_write: bool, now: Timestamp) -> bool {
        if !self.state.slots.try_begin(id, skip_write, now) {
            warn!("Dispatch of {} refused; another delivery holds the slot", id);
            return false;
        }

        let message = match self.state.board.get(&id) {
            Some(message) => message,
            None => {
                warn!("{}", SigncastError::message_vanished(id));
                self.state.slots.abort_attempt(id);
                return false;
            }
        };

        let plan = match plan_delivery(&message, skip_write) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Skipping delivery of {}: {}", id, e);
                self.state.slots.abort_attempt(id);
                return false;
            }
        };

        self.state.stats.deliveries_dispatched += 1;
        info!(
            "Dispatching {} as {} (skip_write: {})",
            id, message.modality, skip_write
        );

        if let Some(light) = plan.light {
            self.send_effect(light);
        }
        if let Some(speech) = plan.speech {
            self.send_effect(speech);
        }

        // The launch trails the light cue by the configured lead
        let launch = plan.launch;
        let delay = self.config.light_lead_delay;
        let effect_sender = self.effect_sender.clone();
        self.state.stats.effects_generated += 1;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if effect_sender.send(launch).is_err() {
                debug!("No device tasks subscribed; launch effect dropped");
            }
        });

        let event = self.state.delivery_state_event();
        self.send_app_event(event);
        true
    }

    // ------------------------------------------------------------------------
    // Channel Helpers
    // ------------------------------------------------------------------------

    /// Broadcast an effect to device tasks
    ///
    /// A send error only means no device task is subscribed right now; the
    /// effect is dropped, not treated as fatal.
    fn send_effect(&mut self, effect: Effect) {
        match self.effect_sender.send(effect) {
            Ok(_) => self.state.stats.effects_generated += 1,
            Err(_) => debug!("No device tasks subscribed; effect dropped"),
        }
    }

    /// Send an app event without ever blocking the engine
    fn send_app_event(&mut self, event: AppEvent) {
        match self.app_event_sender.try_send_non_blocking(event) {
            Ok(()) => self.state.stats.app_events_generated += 1,
            Err(e) => debug!("Observer channel unavailable ({}); app event dropped", e),
        }
    }
}
