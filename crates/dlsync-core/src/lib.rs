pub mod config;
pub mod logging;

pub mod client;
pub mod context;
pub mod engine;
pub mod item_refresh;
pub mod protocol;
pub mod reconnect;
pub mod record;
pub mod registry;
pub mod relative_time;
pub mod supervisor;
pub mod transport;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;
