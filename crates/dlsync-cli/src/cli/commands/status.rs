//! `dlsync status` – poll once and print every download.

use anyhow::Result;
use chrono::Utc;
use dlsync_core::config::SyncConfig;
use dlsync_core::context::ClientContext;
use dlsync_core::transport::{HttpPoller, SnapshotSource};

use super::table;

pub async fn run_status(cfg: &SyncConfig) -> Result<()> {
    let ctx = ClientContext::from_config(cfg)?;
    let snapshot = HttpPoller::new(&ctx).fetch_snapshot().await?;
    if snapshot.records.is_empty() {
        println!("No downloads.");
    } else {
        print!("{}", table::render(snapshot.records.iter(), Utc::now()));
    }
    println!(
        "in progress: {}",
        if snapshot.in_progress { "yes" } else { "no" }
    );
    Ok(())
}
