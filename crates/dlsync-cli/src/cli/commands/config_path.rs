//! `dlsync config-path` – print where the config lives.

use anyhow::Result;
use dlsync_core::config;
use std::path::Path;

pub fn run_config_path(explicit: Option<&Path>) -> Result<()> {
    match explicit {
        Some(path) => println!("{}", path.display()),
        None => println!("{}", config::config_path()?.display()),
    }
    Ok(())
}
