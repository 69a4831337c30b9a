//! Logging init: append to a file under the XDG state dir, or fall back to
//! stderr.
//!
//! The filter comes from `DLSYNC_LOG`, then `RUST_LOG`, then a default that
//! keeps this crate at debug.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,dlsync=debug,dlsync_core=debug";
const FILTER_ENV: &str = "DLSYNC_LOG";

fn filter_directives() -> String {
    [FILTER_ENV, EnvFilter::DEFAULT_ENV]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Invalid directives fall back to the default filter.
fn env_filter_from(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Path of the log file: `~/.local/state/dlsync/dlsync.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlsync")?;
    Ok(xdg_dirs.get_state_home().join("dlsync.log"))
}

/// Initialize structured logging to the XDG state dir. On failure (e.g. log
/// dir unwritable) returns Err so the caller can fall back to stderr.
pub fn init_logging() -> Result<()> {
    init_logging_at(&log_file_path()?)
}

/// Initialize structured logging appending to `path`.
pub fn init_logging_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter_from(&filter_directives()))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("init tracing subscriber: {e}"))?;

    tracing::info!("dlsync logging initialized at {}", path.display());
    Ok(())
}

/// Initialize logging to stderr only. Use when `init_logging` fails so the CLI
/// keeps running.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter_from(&filter_directives()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
