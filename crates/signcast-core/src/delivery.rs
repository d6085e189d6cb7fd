//! Delivery slot state machine
//!
//! Tracks the lifecycle of a single delivery: the engine stages a message
//! (`loading`), the renderer confirms it on screen (`current`), and
//! completion advances the round-robin anchor (`last_completed`) unless the
//! attempt was an injection delivery. One in-flight token enforces one
//! delivery at a time; rotator ticks that find the token held simply skip.

use core::time::Duration;

use crate::message::LightCode;
use crate::types::{MessageId, Timestamp};

// ----------------------------------------------------------------------------
// In-Flight Token
// ----------------------------------------------------------------------------

/// Token held from dispatch until completion of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    /// Message being delivered
    pub id: MessageId,
    /// Injection deliveries complete without moving the anchor
    pub skip_write: bool,
    /// When the dispatch started, for the stall timeout
    pub dispatched_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Completion Record
// ----------------------------------------------------------------------------

/// Bookkeeping produced when a delivery completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedDelivery {
    /// Message that finished delivering
    pub id: MessageId,
    /// True when the anchor was deliberately left untouched
    pub anchor_skipped: bool,
    /// True when the completion event disagreed with the in-flight token;
    /// the token wins
    pub flag_mismatch: bool,
}

// ----------------------------------------------------------------------------
// Delivery Slots
// ----------------------------------------------------------------------------

/// Delivery lifecycle slots, owned exclusively by the engine task
#[derive(Debug, Clone, Default)]
pub struct DeliverySlots {
    loading: Option<MessageId>,
    current: Option<MessageId>,
    last_completed: Option<MessageId>,
    staged_light: LightCode,
    in_flight: Option<InFlight>,
}

impl DeliverySlots {
    /// Create empty slots
    pub fn new() -> Self {
        Self::default()
    }

    /// Message staged for delivery but not yet on screen
    pub fn loading(&self) -> Option<MessageId> {
        self.loading
    }

    /// Message currently on screen
    pub fn current(&self) -> Option<MessageId> {
        self.current
    }

    /// Round-robin anchor: the last delivery that advanced the rotation
    pub fn last_completed(&self) -> Option<MessageId> {
        self.last_completed
    }

    /// Light cue pre-staged for the entry that rotates next
    pub fn staged_light(&self) -> LightCode {
        self.staged_light
    }

    /// The in-flight token, when a delivery is underway
    pub fn in_flight(&self) -> Option<InFlight> {
        self.in_flight
    }

    /// True while a delivery is underway
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// True when any slot refers to a message
    pub fn is_delivering(&self) -> bool {
        self.in_flight.is_some() || self.current.is_some() || self.loading.is_some()
    }

    /// Acquire the in-flight token and stage the message
    ///
    /// Returns false without touching any slot while another delivery holds
    /// the token.
    pub fn try_begin(&mut self, id: MessageId, skip_write: bool, now: Timestamp) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.in_flight = Some(InFlight {
            id,
            skip_write,
            dispatched_at: now,
        });
        self.loading = Some(id);
        true
    }

    /// Renderer confirmed the message is on screen
    ///
    /// Returns false for events that do not match the in-flight token.
    pub fn mark_started(&mut self, id: MessageId) -> bool {
        match self.in_flight {
            Some(in_flight) if in_flight.id == id => {
                self.loading = None;
                self.current = Some(id);
                true
            }
            _ => false,
        }
    }

    /// Renderer finished the message; release the token
    ///
    /// The anchor decision comes from the token, not the event: a completion
    /// event whose skip flag disagrees is honored per the token and flagged.
    /// Completions that match no token return None.
    pub fn complete(&mut self, id: MessageId, event_skip_write: bool) -> Option<CompletedDelivery> {
        let in_flight = match self.in_flight {
            Some(in_flight) if in_flight.id == id => in_flight,
            _ => return None,
        };
        if !in_flight.skip_write {
            self.last_completed = Some(id);
        }
        self.loading = None;
        self.current = None;
        self.in_flight = None;
        Some(CompletedDelivery {
            id,
            anchor_skipped: in_flight.skip_write,
            flag_mismatch: event_skip_write != in_flight.skip_write,
        })
    }

    /// Abandon a dispatch attempt before anything reached the screen
    ///
    /// Rolls back `loading` and releases the token; the anchor and the
    /// rotation are untouched, so the message delivers again on a later tick.
    pub fn abort_attempt(&mut self, id: MessageId) -> bool {
        match self.in_flight {
            Some(in_flight) if in_flight.id == id => {
                self.loading = None;
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }

    /// The in-flight delivery, when it has exceeded the stall limit
    pub fn timed_out(&self, now: Timestamp, limit: Duration) -> Option<InFlight> {
        self.in_flight
            .filter(|in_flight| now.duration_since(in_flight.dispatched_at) >= limit)
    }

    /// Force a stalled delivery to completion
    ///
    /// Applies the same anchor rule as a normal completion so the rotation
    /// moves past the stalled entry instead of replaying it forever.
    pub fn force_complete(&mut self) -> Option<CompletedDelivery> {
        let in_flight = self.in_flight.take()?;
        if !in_flight.skip_write {
            self.last_completed = Some(in_flight.id);
        }
        self.loading = None;
        self.current = None;
        Some(CompletedDelivery {
            id: in_flight.id,
            anchor_skipped: in_flight.skip_write,
            flag_mismatch: false,
        })
    }

    /// Pre-stage the light cue of the entry that rotates next
    pub fn stage_light(&mut self, light: LightCode) {
        self.staged_light = light;
    }

    /// Reset every slot, dropping any in-flight token
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
