//! Shared deliverable message board
//!
//! The board is the externally owned set of messages currently eligible for
//! delivery. Producers (storage sync, operator actions) insert and remove
//! entries concurrently with the engine; the engine only reads snapshots and
//! records delivery bookkeeping. Rotation order lives in the engine, never
//! here.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::MessageError;
use crate::message::SignMessage;
use crate::types::{MessageId, Priority, Timestamp};

// ----------------------------------------------------------------------------
// Board Snapshot
// ----------------------------------------------------------------------------

/// One consistent view of the board, captured under a single read lock
///
/// The sync pass consumes a snapshot instead of querying the live board field
/// by field, so concurrent inserts and removals cannot tear its view.
#[derive(Debug, Clone, Default)]
pub struct BoardSnapshot {
    /// Total deliverable messages
    pub len: usize,
    /// Highest priority present, None when the board is empty
    pub highest_priority: Option<Priority>,
    /// Ids at the highest priority, in arrival order
    pub ids_at_highest: Vec<MessageId>,
    /// True when more than one distinct priority class is present
    pub mixed_priorities: bool,
    /// Priority of every board member, keyed by id
    pub priorities: HashMap<MessageId, Priority>,
}

impl BoardSnapshot {
    /// True when the board held no messages at capture time
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Membership check against the captured id set
    pub fn contains(&self, id: &MessageId) -> bool {
        self.priorities.contains_key(id)
    }

    /// Priority of a captured member
    pub fn priority_of(&self, id: &MessageId) -> Option<Priority> {
        self.priorities.get(id).copied()
    }
}

// ----------------------------------------------------------------------------
// Message Board
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BoardInner {
    messages: HashMap<MessageId, SignMessage>,
    /// Insertion order of ids, drives deterministic rotation seeding
    arrival_order: Vec<MessageId>,
}

/// Thread-safe deliverable message collection
///
/// Cheap to clone; all clones share the same underlying set.
#[derive(Debug, Clone, Default)]
pub struct MessageBoard {
    inner: Arc<RwLock<BoardInner>>,
}

impl MessageBoard {
    /// Create an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message, superseding any entry with the same id
    ///
    /// A superseded entry keeps its original arrival position; a new id goes
    /// to the back of the arrival order.
    pub fn insert(&self, message: SignMessage) -> Result<(), MessageError> {
        message.validate()?;
        if let Ok(mut inner) = self.inner.write() {
            let id = message.id;
            if inner.messages.insert(id, message).is_none() {
                inner.arrival_order.push(id);
            }
        }
        Ok(())
    }

    /// Remove a message by id, returning it when present
    pub fn remove(&self, id: &MessageId) -> Option<SignMessage> {
        if let Ok(mut inner) = self.inner.write() {
            let removed = inner.messages.remove(id);
            if removed.is_some() {
                inner.arrival_order.retain(|existing| existing != id);
            }
            removed
        } else {
            None
        }
    }

    /// Remove every message
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.messages.clear();
            inner.arrival_order.clear();
        }
    }

    /// Number of deliverable messages
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.messages.len()).unwrap_or_default()
    }

    /// True when no messages are deliverable
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership check
    pub fn contains(&self, id: &MessageId) -> bool {
        self.inner
            .read()
            .map(|inner| inner.messages.contains_key(id))
            .unwrap_or_default()
    }

    /// Get a copy of a message by id
    pub fn get(&self, id: &MessageId) -> Option<SignMessage> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.messages.get(id).cloned())
    }

    /// Highest priority currently on the board
    pub fn highest_priority(&self) -> Option<Priority> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.messages.values().map(|m| m.priority).max())
    }

    /// Ids at the highest priority, in arrival order
    pub fn ids_at_highest_priority(&self) -> Vec<MessageId> {
        self.snapshot().ids_at_highest
    }

    /// True when more than one distinct priority class is present
    pub fn has_multiple_priorities(&self) -> bool {
        self.snapshot().mixed_priorities
    }

    /// Copies of every deliverable message, in arrival order
    pub fn messages(&self) -> Vec<SignMessage> {
        self.inner
            .read()
            .map(|inner| {
                inner
                    .arrival_order
                    .iter()
                    .filter_map(|id| inner.messages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bump the completed delivery counter for a message
    ///
    /// Returns false when the message has already left the board.
    pub fn record_delivery(&self, id: &MessageId) -> bool {
        if let Ok(mut inner) = self.inner.write() {
            match inner.messages.get_mut(id) {
                Some(message) => {
                    message.times_delivered = message.times_delivered.saturating_add(1);
                    true
                }
                None => false,
            }
        } else {
            false
        }
    }

    /// Drop every message past its expiry, returning how many were removed
    pub fn remove_expired(&self, now: Timestamp) -> usize {
        if let Ok(mut inner) = self.inner.write() {
            let expired: Vec<MessageId> = inner
                .messages
                .values()
                .filter(|m| m.is_expired(now))
                .map(|m| m.id)
                .collect();
            for id in &expired {
                inner.messages.remove(id);
            }
            inner.arrival_order.retain(|id| !expired.contains(id));
            expired.len()
        } else {
            0
        }
    }

    /// Capture a consistent snapshot for the sync pass
    pub fn snapshot(&self) -> BoardSnapshot {
        self.inner
            .read()
            .map(|inner| {
                let highest_priority = inner.messages.values().map(|m| m.priority).max();
                let ids_at_highest = match highest_priority {
                    Some(highest) => inner
                        .arrival_order
                        .iter()
                        .filter(|id| {
                            inner
                                .messages
                                .get(*id)
                                .map(|m| m.priority == highest)
                                .unwrap_or(false)
                        })
                        .copied()
                        .collect(),
                    None => Vec::new(),
                };
                let mixed_priorities = {
                    let mut distinct: Option<Priority> = None;
                    let mut mixed = false;
                    for message in inner.messages.values() {
                        match distinct {
                            None => distinct = Some(message.priority),
                            Some(seen) if seen != message.priority => {
                                mixed = true;
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                    mixed
                };
                BoardSnapshot {
                    len: inner.messages.len(),
                    highest_priority,
                    ids_at_highest,
                    mixed_priorities,
                    priorities: inner
                        .messages
                        .values()
                        .map(|m| (m.id, m.priority))
                        .collect(),
                }
            })
            .unwrap_or_default()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
