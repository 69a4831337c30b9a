//! The UI collaborator seen from the engine.
//!
//! All callbacks run on the engine task, in the order the engine applied the
//! corresponding changes.

use chrono::{DateTime, Utc};

use crate::registry::DownloadRegistry;
use crate::relative_time;
use crate::supervisor::ChannelState;

/// Whether the last sync attempt succeeded. Poll and command failures are
/// not retried in-band, so the view is told the data may be stale until the
/// next successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Live,
    Stale,
}

/// Relative-time label for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampLabel {
    pub key: String,
    pub label: String,
}

pub trait DownloadView: Send + 'static {
    /// Called after every change that altered the registry.
    fn render(&mut self, registry: &DownloadRegistry);

    /// Opaque pre-rendered list from the poll endpoint.
    fn render_list(&mut self, _rendered: &str) {}

    /// Called once per tick with fresh labels for every timestamped record.
    fn tick(&mut self, _labels: &[TimestampLabel]) {}

    fn sync_status(&mut self, _status: SyncStatus) {}

    fn channel_state(&mut self, _state: ChannelState) {}
}

/// Labels for every record that has a creation time, in registry order.
pub fn timestamp_labels(registry: &DownloadRegistry, now: DateTime<Utc>) -> Vec<TimestampLabel> {
    registry
        .iter()
        .filter_map(|r| {
            r.created_at.map(|ts| TimestampLabel {
                key: r.key.clone(),
                label: relative_time::readable_period(ts, now),
            })
        })
        .collect()
}
