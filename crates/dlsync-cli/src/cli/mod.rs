//! CLI for the dlsync client.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dlsync_core::config::{self, SyncConfig, TransportMode};

use commands::{run_clear, run_config_path, run_status, run_watch};

/// Top-level CLI for dlsync.
#[derive(Debug, Parser)]
#[command(name = "dlsync")]
#[command(about = "dlsync: follow server-side downloads from the terminal", long_about = None)]
pub struct Cli {
    /// Read config from this file instead of the XDG location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Poll,
    Push,
    Hybrid,
}

impl From<ModeArg> for TransportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Poll => TransportMode::Poll,
            ModeArg::Push => TransportMode::Push,
            ModeArg::Hybrid => TransportMode::Hybrid,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Follow downloads until Ctrl-C, redrawing the table on every change.
    Watch {
        /// Delivery mode (overrides config).
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Poll endpoint URL (overrides config).
        #[arg(long, value_name = "URL")]
        poll_url: Option<String>,
        /// Push channel URL (overrides config).
        #[arg(long, value_name = "URL")]
        push_url: Option<String>,
    },

    /// Poll once and print all downloads.
    Status,

    /// Ask the server to delete a finished download's file.
    Clear {
        /// Server-side file path as shown by `status`.
        filepath: String,
    },

    /// Print the config file location.
    ConfigPath,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::ConfigPath = cli.command {
            return run_config_path(cli.config.as_deref());
        }
        let cfg = match cli.config.as_deref() {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Watch {
                mode,
                poll_url,
                push_url,
            } => {
                let cfg = apply_overrides(cfg, mode, poll_url, push_url);
                run_watch(&cfg).await?;
            }
            CliCommand::Status => run_status(&cfg).await?,
            CliCommand::Clear { filepath } => run_clear(&cfg, &filepath).await?,
            CliCommand::ConfigPath => {}
        }

        Ok(())
    }
}

/// Command-line flags win over the config file.
fn apply_overrides(
    mut cfg: SyncConfig,
    mode: Option<ModeArg>,
    poll_url: Option<String>,
    push_url: Option<String>,
) -> SyncConfig {
    if let Some(mode) = mode {
        cfg.mode = mode.into();
    }
    if let Some(url) = poll_url {
        cfg.poll_url = url;
    }
    if push_url.is_some() {
        cfg.push_url = push_url;
    }
    cfg
}

#[cfg(test)]
mod tests;
