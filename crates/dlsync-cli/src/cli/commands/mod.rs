//! CLI command handlers, one per file.

mod clear;
mod config_path;
mod status;
mod table;
mod watch;

pub use clear::run_clear;
pub use config_path::run_config_path;
pub use status::run_status;
pub use watch::run_watch;
