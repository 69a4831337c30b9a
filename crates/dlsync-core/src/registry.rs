//! In-memory registry of download records, newest first.
//!
//! The registry is owned by the engine task, which is the only writer; the
//! push channel, the poll loop and the per-item refresh timers all reach it
//! through that task. Every operation treats its input as absolute state, so
//! replaying or reordering events across delivery mechanisms cannot corrupt it.

use crate::record::{DownloadRecord, DownloadStatus};

/// What an [`DownloadRegistry::upsert`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Key existed and the merged record equals the stored one.
    Unchanged,
}

impl UpsertOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

/// Ordered `key -> record` map. Index 0 is the most recently introduced record.
#[derive(Debug, Clone, Default)]
pub struct DownloadRegistry {
    records: Vec<DownloadRecord>,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` at the front if its key is new, otherwise merge it into
    /// the existing entry in place.
    pub fn upsert(&mut self, record: DownloadRecord) -> UpsertOutcome {
        match self.position(&record.key) {
            None => {
                self.records.insert(0, record);
                UpsertOutcome::Inserted
            }
            Some(idx) => {
                let merged = merge(&self.records[idx], record);
                if merged == self.records[idx] {
                    UpsertOutcome::Unchanged
                } else {
                    self.records[idx] = merged;
                    UpsertOutcome::Updated
                }
            }
        }
    }

    /// Remove `key` if present. Absent keys are not an error.
    pub fn remove(&mut self, key: &str) -> Option<DownloadRecord> {
        let idx = self.position(key)?;
        Some(self.records.remove(idx))
    }

    /// Replace the whole registry with a server snapshot.
    ///
    /// The snapshot is expected newest first (the order the server keeps its
    /// collection in) and that order is kept as-is. Entries are not prepended
    /// one by one the way [`Self::upsert`] inserts, which would reverse the
    /// server's order. Keys missing from the snapshot
    /// are dropped. A key repeated inside one snapshot collapses into its
    /// first position, and a key that was already terminal stays terminal.
    pub fn replace_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = DownloadRecord>,
    {
        let previous = std::mem::take(&mut self.records);
        for record in records {
            match self.position(&record.key) {
                Some(idx) => self.records[idx] = merge(&self.records[idx], record),
                None => {
                    let record = match previous.iter().find(|p| p.key == record.key) {
                        Some(prior) => merge(prior, record),
                        None => record,
                    };
                    self.records.push(record);
                }
            }
        }
    }

    /// True iff at least one record is still running.
    pub fn any_in_progress(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.status() == DownloadStatus::Running)
    }

    pub fn get(&self, key: &str) -> Option<&DownloadRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DownloadRecord> {
        self.records.iter()
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|r| r.key == key)
    }
}

/// Merge an incoming record into the stored one. The incoming record wins
/// except that `created_at` never changes once set and a terminal record
/// keeps its completion state against a running update.
fn merge(existing: &DownloadRecord, incoming: DownloadRecord) -> DownloadRecord {
    let mut next = incoming;
    next.created_at = existing.created_at.or(next.created_at);
    if existing.status().is_terminal() && !next.status().is_terminal() {
        tracing::debug!(key = %existing.key, "ignoring running update for terminal download");
        next.complete = existing.complete;
        next.error_message = existing.error_message.clone();
        next.percentage = existing.percentage;
    }
    next
}
