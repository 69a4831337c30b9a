//! Per-item refresh bookkeeping for push channels that report progress per
//! download but never push completion on their own.
//!
//! The engine asks [`ItemRefreshScheduler::schedule`] after applying an
//! init/update for a running record and arms a timer only when it gets a
//! ticket back, so each key has at most one refresh in flight. Every ticket is
//! unique: once a key is cancelled, abandoned or rescheduled, a timer still
//! holding an older ticket is rejected by [`ItemRefreshScheduler::take_due`].

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ItemRefreshScheduler {
    next_ticket: u64,
    pending: HashMap<String, u64>,
}

impl ItemRefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abandon all pending refreshes (connection opened or lost, full
    /// snapshot applied).
    pub fn abandon_all(&mut self) {
        self.pending.clear();
    }

    /// Returns the ticket the caller should arm a timer with, or `None` while
    /// one is already pending for `key`.
    pub fn schedule(&mut self, key: &str) -> Option<u64> {
        if self.pending.contains_key(key) {
            return None;
        }
        self.next_ticket += 1;
        self.pending.insert(key.to_string(), self.next_ticket);
        Some(self.next_ticket)
    }

    /// The record went away or reached a terminal state.
    pub fn cancel(&mut self, key: &str) {
        self.pending.remove(key);
    }

    /// A timer fired. True if `ticket` is still the pending one for `key` and
    /// the refresh should be sent.
    pub fn take_due(&mut self, key: &str, ticket: u64) -> bool {
        if self.pending.get(key) != Some(&ticket) {
            return false;
        }
        self.pending.remove(key);
        true
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
