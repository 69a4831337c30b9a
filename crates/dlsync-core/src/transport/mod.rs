//! Delivery mechanisms behind one interface.
//!
//! [`SnapshotSource`] is the request/response side (poll and clear
//! endpoints); [`Connector`] opens the persistent push channel. Both hand
//! their results to the engine, which is the only component that touches the
//! registry.

pub mod http;
pub mod ws;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::{PollSnapshot, ProtocolError};

pub use http::HttpPoller;
pub use ws::WsConnector;

/// Transport-level failure. Always recovered locally (reconnect, next poll).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    #[error("{method} {url} returned HTTP {status}")]
    Http {
        method: &'static str,
        url: String,
        status: u32,
    },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid header {name}: {reason}")]
    Header { name: String, reason: String },
    #[error("invalid endpoint {url}: {source}")]
    Endpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("cannot derive a push URL from {0}")]
    PushUrl(String),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("request task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Poll and clear endpoints.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    /// Fetch the full current snapshot.
    async fn fetch_snapshot(&self) -> Result<PollSnapshot, TransportError>;

    /// Ask the server to clear the download stored at `filepath`.
    async fn clear(&self, filepath: &str) -> Result<(), TransportError>;
}

/// An open push channel. Text frames go out through `outbound`; inbound
/// frames arrive on `inbound`, which ends when the channel closes for any
/// reason.
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Opens push channels for the reconnection supervisor.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Connection, TransportError>;
}
