//! `dlsync watch` – run the sync client and redraw the table until Ctrl-C.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use dlsync_core::client;
use dlsync_core::config::SyncConfig;
use dlsync_core::record::DownloadRecord;
use dlsync_core::registry::DownloadRegistry;
use dlsync_core::supervisor::ChannelState;
use dlsync_core::view::{DownloadView, SyncStatus, TimestampLabel};

use super::table;

/// Prints the table whenever the registry changes, and again when a tick
/// changes any relative-time label.
#[derive(Debug, Default)]
pub(crate) struct ConsoleView {
    records: Vec<DownloadRecord>,
    labels: HashMap<String, String>,
}

impl ConsoleView {
    fn redraw(&self) {
        if self.records.is_empty() {
            println!("No downloads.");
            return;
        }
        print!("{}", table::render(self.records.iter(), Utc::now()));
    }
}

impl DownloadView for ConsoleView {
    fn render(&mut self, registry: &DownloadRegistry) {
        self.records = registry.iter().cloned().collect();
        self.redraw();
    }

    fn tick(&mut self, labels: &[TimestampLabel]) {
        let fresh: HashMap<String, String> = labels
            .iter()
            .map(|l| (l.key.clone(), l.label.clone()))
            .collect();
        if fresh != self.labels {
            let first = self.labels.is_empty();
            self.labels = fresh;
            if !first {
                self.redraw();
            }
        }
    }

    fn sync_status(&mut self, status: SyncStatus) {
        match status {
            SyncStatus::Stale => eprintln!("warning: sync failed; showing last known state"),
            SyncStatus::Live => eprintln!("sync restored"),
        }
    }

    fn channel_state(&mut self, state: ChannelState) {
        eprintln!("push channel {}", state.as_str());
    }
}

pub async fn run_watch(cfg: &SyncConfig) -> Result<()> {
    let handle = client::start(cfg, ConsoleView::default()).context("start sync client")?;
    tokio::signal::ctrl_c()
        .await
        .context("wait for Ctrl-C")?;
    tracing::info!("interrupted; shutting down");
    handle.shutdown().await;
    Ok(())
}
