//! Wiring: build the transports from config, spawn the engine and (for push
//! and hybrid modes) the reconnection supervisor, and hand back a handle.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::{SyncConfig, TransportMode};
use crate::context::ClientContext;
use crate::engine::{Engine, EngineInput, EngineSettings, RegistrySnapshot};
use crate::reconnect::ReconnectPolicy;
use crate::supervisor::{ChannelState, Supervisor};
use crate::transport::{Connector, HttpPoller, SnapshotSource, TransportError, WsConnector};
use crate::view::DownloadView;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("sync engine has stopped")]
    EngineStopped,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Handle to a running client. Dropping it does not stop the tasks; call
/// [`SyncHandle::shutdown`].
pub struct SyncHandle {
    inbox: mpsc::UnboundedSender<EngineInput>,
    channel_state: watch::Receiver<ChannelState>,
    engine: JoinHandle<()>,
    supervisor: Option<JoinHandle<()>>,
}

/// Start a client from config: curl-backed poll/clear endpoints and, unless
/// the mode is `poll`, a websocket push channel.
pub fn start<V: DownloadView>(cfg: &SyncConfig, view: V) -> Result<SyncHandle, ClientError> {
    let ctx = ClientContext::from_config(cfg)?;
    let settings = EngineSettings::from_config(cfg, ctx.location.clone());
    let source: Arc<dyn SnapshotSource> = Arc::new(HttpPoller::new(&ctx));
    let connector = cfg.mode.uses_push().then(|| WsConnector::new(&ctx));
    tracing::info!(
        mode = ?cfg.mode,
        poll_url = %ctx.poll_url,
        push_url = %ctx.push_url,
        "starting sync client"
    );
    Ok(start_with(
        settings,
        view,
        connector,
        Some(source),
        cfg.reconnect_policy(),
    ))
}

/// Start a client with explicit collaborators.
pub fn start_with<V, C>(
    settings: EngineSettings,
    view: V,
    connector: Option<C>,
    source: Option<Arc<dyn SnapshotSource>>,
    policy: ReconnectPolicy,
) -> SyncHandle
where
    V: DownloadView,
    C: Connector,
{
    let (inbox, rx) = mpsc::unbounded_channel();
    let mode = settings.mode;
    let engine = Engine::new(settings, view, source, inbox.clone());
    let engine = tokio::spawn(async move {
        engine.run(rx).await;
    });

    let (supervisor, channel_state) = match connector.filter(|_| mode.uses_push()) {
        Some(connector) => {
            let (supervisor, state) = Supervisor::new(connector, inbox.clone(), policy);
            (Some(tokio::spawn(supervisor.run())), state)
        }
        None => {
            let (_tx, state) = watch::channel(ChannelState::Disconnected);
            (None, state)
        }
    };

    // Hybrid bootstraps from the poll endpoint too, so the list shows up
    // even while the push channel is still down.
    if mode != TransportMode::Push {
        let _ = inbox.send(EngineInput::Refresh);
    }

    SyncHandle {
        inbox,
        channel_state,
        engine,
        supervisor,
    }
}

impl SyncHandle {
    /// Ask the server to delete a finished download's file. The registry is
    /// not touched until the server confirms.
    pub fn clear(&self, filepath: impl Into<String>) -> Result<(), ClientError> {
        self.send(EngineInput::Clear {
            filepath: filepath.into(),
        })
    }

    /// Fetch a full snapshot from the poll endpoint.
    pub fn refresh(&self) -> Result<(), ClientError> {
        self.send(EngineInput::Refresh)
    }

    pub async fn snapshot(&self) -> Result<RegistrySnapshot, ClientError> {
        let (reply, answer) = oneshot::channel();
        self.send(EngineInput::Snapshot(reply))?;
        answer.await.map_err(|_| ClientError::EngineStopped)
    }

    pub fn channel_state(&self) -> ChannelState {
        *self.channel_state.borrow()
    }

    /// Watch push channel state changes.
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.channel_state.clone()
    }

    /// Stop the supervisor, let the engine drain, and wait for both.
    pub async fn shutdown(self) {
        if let Some(supervisor) = self.supervisor {
            supervisor.abort();
            let _ = supervisor.await;
        }
        let _ = self.inbox.send(EngineInput::Shutdown);
        if let Err(e) = self.engine.await {
            tracing::warn!("engine task: {}", e);
        }
    }

    fn send(&self, input: EngineInput) -> Result<(), ClientError> {
        self.inbox
            .send(input)
            .map_err(|_| ClientError::EngineStopped)
    }
}
