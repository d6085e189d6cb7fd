//! Rotation list state machine
//!
//! `RotationState` holds the two ordered delivery lists: `main`, the
//! round-robin rotation over the highest priority class, and `incoming`, the
//! one-shot injection queue for same-class arrivals. Reconciliation against a
//! board snapshot (`sync_pass`) and selection (`pop_incoming`,
//! `next_in_rotation`) are both pure; the engine task serializes every call.
//!
//! Invariants maintained here:
//! - `main` holds only board-present ids, all at the single rotating priority
//! - an id never appears in both lists
//! - `incoming` ids move to the tail of `main` when selected

use crate::board::BoardSnapshot;
use crate::types::{MessageId, Priority};

// ----------------------------------------------------------------------------
// Sync Outcome
// ----------------------------------------------------------------------------

/// Result of one reconciliation pass against a board snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Board empty; both lists cleared
    BoardEmpty { had_entries: bool },
    /// Rotation was empty and was reseeded from the highest priority class
    Seeded { purged: usize, seeded: usize },
    /// A strictly higher priority class replaced the whole rotation
    Preempted { purged: usize, seeded: usize },
    /// Lower classes still present alongside the rotating one; lists untouched
    Held { purged: usize },
    /// Same-class arrivals appended to the injection queue
    Queued { purged: usize, queued: usize },
}

// ----------------------------------------------------------------------------
// Rotation Pick
// ----------------------------------------------------------------------------

/// One round-robin selection from the main rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPick {
    /// Message to deliver now
    pub id: MessageId,
    /// Entry that rotates after this one, used to pre-stage its light cue
    pub following: MessageId,
    /// True when the completion anchor had already left the rotation
    pub anchor_lost: bool,
}

// ----------------------------------------------------------------------------
// Rotation State
// ----------------------------------------------------------------------------

/// The two rotation lists, owned exclusively by the engine task
#[derive(Debug, Clone, Default)]
pub struct RotationState {
    main: Vec<MessageId>,
    incoming: Vec<MessageId>,
}

impl RotationState {
    /// Create empty rotation lists
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids currently in the main rotation, in rotation order
    pub fn main(&self) -> &[MessageId] {
        &self.main
    }

    /// Ids awaiting one-shot injection, oldest first
    pub fn incoming(&self) -> &[MessageId] {
        &self.incoming
    }

    /// True when neither list holds an id
    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.incoming.is_empty()
    }

    /// Drop both lists
    pub fn clear(&mut self) {
        self.main.clear();
        self.incoming.clear();
    }

    /// Reconcile the lists against one consistent board snapshot
    ///
    /// Branch order matters and is part of the contract: empty board, purge,
    /// reseed, preempt, hold, queue.
    pub fn sync_pass(&mut self, snapshot: &BoardSnapshot) -> SyncOutcome {
        // Nothing deliverable: rotation winds down entirely
        if snapshot.is_empty() {
            let had_entries = !self.is_empty();
            self.clear();
            return SyncOutcome::BoardEmpty { had_entries };
        }

        // Ids that left the board leave both lists before anything else
        let purged = self.purge_missing(snapshot);

        // An empty rotation reseeds from the highest class. Any injection
        // leftovers are dropped: same-class ids re-enter through the seed,
        // lower-class ids wait until their class rotates again.
        if self.main.is_empty() {
            self.main = snapshot.ids_at_highest.clone();
            self.incoming.clear();
            return SyncOutcome::Seeded {
                purged,
                seeded: self.main.len(),
            };
        }

        let rotating = self.rotating_priority(snapshot);
        match (snapshot.highest_priority, rotating) {
            (Some(highest), Some(rotating)) if highest > rotating => {
                // Preemption: the higher class takes over the whole rotation
                self.main = snapshot.ids_at_highest.clone();
                self.incoming.clear();
                SyncOutcome::Preempted {
                    purged,
                    seeded: self.main.len(),
                }
            }
            _ => {
                if snapshot.mixed_priorities {
                    // The rotating class is still highest but lower classes
                    // linger; leave both lists alone until the board settles
                    SyncOutcome::Held { purged }
                } else {
                    // One class on the board, matching the rotation: queue
                    // arrivals the lists have not seen yet
                    let mut queued = 0;
                    for id in &snapshot.ids_at_highest {
                        if !self.main.contains(id) && !self.incoming.contains(id) {
                            self.incoming.push(*id);
                            queued += 1;
                        }
                    }
                    SyncOutcome::Queued { purged, queued }
                }
            }
        }
    }

    /// Pop the oldest injected id and move it to the rotation tail
    ///
    /// The returned id is delivered without advancing the completion anchor.
    pub fn pop_incoming(&mut self) -> Option<MessageId> {
        if self.incoming.is_empty() {
            return None;
        }
        let id = self.incoming.remove(0);
        // Disjointness of the two lists makes this append duplicate-free
        self.main.push(id);
        Some(id)
    }

    /// Round-robin pick after the completion anchor
    ///
    /// A missing or never-set anchor restarts at the head of the rotation.
    pub fn next_in_rotation(&self, last_completed: Option<MessageId>) -> Option<RotationPick> {
        if self.main.is_empty() {
            return None;
        }
        let anchor_index =
            last_completed.and_then(|id| self.main.iter().position(|entry| *entry == id));
        let index = match anchor_index {
            Some(i) => (i + 1) % self.main.len(),
            None => 0,
        };
        Some(RotationPick {
            id: self.main[index],
            following: self.main[(index + 1) % self.main.len()],
            anchor_lost: last_completed.is_some() && anchor_index.is_none(),
        })
    }

    /// Priority of the class currently rotating
    ///
    /// After a purge every main entry is board-present, so the first lookup
    /// decides.
    fn rotating_priority(&self, snapshot: &BoardSnapshot) -> Option<Priority> {
        self.main
            .iter()
            .find_map(|id| snapshot.priority_of(id))
    }

    fn purge_missing(&mut self, snapshot: &BoardSnapshot) -> usize {
        let before = self.main.len() + self.incoming.len();
        self.main.retain(|id| snapshot.contains(id));
        self.incoming.retain(|id| snapshot.contains(id));
        before - (self.main.len() + self.incoming.len())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
