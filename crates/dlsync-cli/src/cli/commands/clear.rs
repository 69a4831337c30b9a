//! `dlsync clear <filepath>` – ask the server to delete a finished download.

use anyhow::{Context, Result};
use dlsync_core::config::SyncConfig;
use dlsync_core::context::ClientContext;
use dlsync_core::transport::{HttpPoller, SnapshotSource};

pub async fn run_clear(cfg: &SyncConfig, filepath: &str) -> Result<()> {
    let ctx = ClientContext::from_config(cfg)?;
    let poller = HttpPoller::new(&ctx);
    poller
        .clear(filepath)
        .await
        .with_context(|| format!("clear {filepath}"))?;
    println!("Cleared {filepath}");
    Ok(())
}
