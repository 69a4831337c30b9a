use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::reconnect::ReconnectPolicy;

/// Reconnect backoff (optional section in config.toml). Without it the push
/// channel reconnects after a fixed `reconnect_delay_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Upper bound for the doubling delay, in milliseconds.
    pub max_delay_ms: u64,
}

/// How downloads reach the client: polling only, push channel only, or a push
/// channel that only signals "refresh" and defers data to the poll endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Poll,
    #[default]
    Push,
    Hybrid,
}

impl TransportMode {
    pub fn uses_push(self) -> bool {
        !matches!(self, TransportMode::Poll)
    }
}

/// Global configuration loaded from `~/.config/dlsync/config.toml`.
/// `Debug` hides header values; they typically carry session cookies.
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Poll endpoint returning `{html, downloads, in_progress}`.
    pub poll_url: String,
    /// Clear endpoint accepting a `filepath` form field.
    pub clear_url: String,
    /// Push channel URL; derived from `poll_url` (ws/wss scheme) when unset.
    #[serde(default)]
    pub push_url: Option<String>,
    /// Location sent with every upstream command; defaults to the poll host.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub mode: TransportMode,
    /// Delay before re-polling while the server reports work in progress.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay before reconnecting a closed push channel.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Delay before re-requesting a single incomplete download.
    #[serde(default = "default_item_refresh_interval_ms")]
    pub item_refresh_interval_ms: u64,
    /// Period of the relative-timestamp tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Re-request incomplete downloads over the push channel.
    #[serde(default = "default_item_refresh")]
    pub item_refresh: bool,
    /// Timeout for poll/clear requests and the push handshake.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub reconnect: Option<ReconnectConfig>,
    /// Extra headers for every request (e.g. a session cookie). Passed through untouched.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_item_refresh_interval_ms() -> u64 {
    1000
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_item_refresh() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_url: "http://localhost:8000/async_downloads/ajax_update/".to_string(),
            clear_url: "http://localhost:8000/async_downloads/ajax_clear_download/".to_string(),
            push_url: None,
            location: None,
            mode: TransportMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            item_refresh_interval_ms: default_item_refresh_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            item_refresh: default_item_refresh(),
            request_timeout_secs: default_request_timeout_secs(),
            reconnect: None,
            headers: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .keys()
            .map(|name| (name.as_str(), "<redacted>"))
            .collect();
        f.debug_struct("SyncConfig")
            .field("poll_url", &self.poll_url)
            .field("clear_url", &self.clear_url)
            .field("push_url", &self.push_url)
            .field("location", &self.location)
            .field("mode", &self.mode)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("item_refresh_interval_ms", &self.item_refresh_interval_ms)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("item_refresh", &self.item_refresh)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("reconnect", &self.reconnect)
            .field("headers", &headers)
            .finish()
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn item_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.item_refresh_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let base = Duration::from_millis(self.reconnect_delay_ms);
        match &self.reconnect {
            Some(r) => ReconnectPolicy::capped_exponential(base, Duration::from_millis(r.max_delay_ms)),
            None => ReconnectPolicy::fixed(base),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SyncConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<SyncConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: SyncConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
