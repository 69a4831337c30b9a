//! The engine task: sole owner and writer of the download registry.
//!
//! Everything that can change the registry arrives as an [`EngineInput`] on
//! one inbox: decoded push events from the supervisor, poll results, timer
//! expiries and user commands. Inputs are applied one at a time, so no lock
//! guards the registry. Timers are detached tasks that post back into the
//! inbox; a timer that outlived its purpose is recognized and ignored when
//! it fires.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{SyncConfig, TransportMode};
use crate::item_refresh::ItemRefreshScheduler;
use crate::protocol::{DownstreamEvent, PollSnapshot, UpstreamCommand};
use crate::record::{DownloadRecord, DownloadStatus};
use crate::registry::DownloadRegistry;
use crate::supervisor::ChannelState;
use crate::transport::{SnapshotSource, TransportError};
use crate::view::{self, DownloadView, SyncStatus};

/// Message to the engine task.
#[derive(Debug)]
pub enum EngineInput {
    /// Supervisor state change without a connection attached.
    ChannelState(ChannelState),
    ChannelOpened {
        generation: u64,
        outbound: mpsc::UnboundedSender<String>,
    },
    ChannelClosed {
        generation: u64,
    },
    Event {
        generation: u64,
        event: DownstreamEvent,
    },
    /// Fetch a full snapshot now (bootstrap, user request, hybrid resync).
    Refresh,
    /// Scheduled re-poll; ignored unless `token` is still current.
    PollDue {
        token: u64,
    },
    PollFinished(Result<PollSnapshot, TransportError>),
    ItemRefreshDue {
        key: String,
        ticket: u64,
    },
    Tick,
    Clear {
        filepath: String,
    },
    ClearFinished {
        filepath: String,
        result: Result<(), TransportError>,
    },
    Snapshot(oneshot::Sender<RegistrySnapshot>),
    Shutdown,
}

/// Point-in-time copy of the registry for callers outside the engine.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub records: Vec<DownloadRecord>,
    pub any_in_progress: bool,
    pub sync_status: SyncStatus,
    pub channel_state: ChannelState,
}

/// Engine timings and behaviour, usually derived from [`SyncConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub mode: TransportMode,
    pub location: String,
    pub poll_interval: Duration,
    pub item_refresh_interval: Duration,
    pub tick_interval: Duration,
    pub item_refresh: bool,
}

impl EngineSettings {
    pub fn from_config(cfg: &SyncConfig, location: impl Into<String>) -> Self {
        Self {
            mode: cfg.mode,
            location: location.into(),
            poll_interval: cfg.poll_interval(),
            item_refresh_interval: cfg.item_refresh_interval(),
            tick_interval: cfg.tick_interval(),
            item_refresh: cfg.item_refresh,
        }
    }
}

struct OpenChannel {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
}

#[derive(Debug, Default)]
struct PollState {
    in_flight: bool,
    /// A refresh was requested while one was in flight; run again afterwards
    /// so the result reflects everything that happened before the request.
    rerun: bool,
    /// Token of the armed re-poll timer; bumping it disarms older timers.
    timer_token: u64,
}

pub struct Engine<V> {
    settings: EngineSettings,
    registry: DownloadRegistry,
    view: V,
    source: Option<Arc<dyn SnapshotSource>>,
    inbox: mpsc::UnboundedSender<EngineInput>,
    channel: Option<OpenChannel>,
    channel_state: ChannelState,
    poll: PollState,
    item_refresh: ItemRefreshScheduler,
    ticker: Option<JoinHandle<()>>,
    sync_status: SyncStatus,
}

impl<V: DownloadView> Engine<V> {
    /// `inbox` must be the sender side of the channel later passed to
    /// [`Engine::run`]; timers post back through it.
    pub fn new(
        settings: EngineSettings,
        view: V,
        source: Option<Arc<dyn SnapshotSource>>,
        inbox: mpsc::UnboundedSender<EngineInput>,
    ) -> Self {
        Self {
            settings,
            registry: DownloadRegistry::new(),
            view,
            source,
            inbox,
            channel: None,
            channel_state: ChannelState::Disconnected,
            poll: PollState::default(),
            item_refresh: ItemRefreshScheduler::new(),
            ticker: None,
            sync_status: SyncStatus::Live,
        }
    }

    /// Drain the inbox until [`EngineInput::Shutdown`]. Returns the view so
    /// callers can inspect it.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineInput>) -> V {
        if self.settings.mode != TransportMode::Push {
            self.start_ticker();
        }
        while let Some(input) = rx.recv().await {
            if !self.handle(input) {
                break;
            }
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        tracing::debug!("engine stopped");
        self.view
    }

    /// Apply one input. Returns false on shutdown.
    pub fn handle(&mut self, input: EngineInput) -> bool {
        match input {
            EngineInput::ChannelState(state) => self.set_channel_state(state),
            EngineInput::ChannelOpened {
                generation,
                outbound,
            } => self.on_channel_opened(generation, outbound),
            EngineInput::ChannelClosed { generation } => self.on_channel_closed(generation),
            EngineInput::Event { generation, event } => self.apply_event(generation, event),
            EngineInput::Refresh => self.refresh(),
            EngineInput::PollDue { token } => {
                if token == self.poll.timer_token {
                    self.refresh();
                }
            }
            EngineInput::PollFinished(result) => self.on_poll_finished(result),
            EngineInput::ItemRefreshDue { key, ticket } => self.on_item_refresh_due(&key, ticket),
            EngineInput::Tick => {
                let labels = view::timestamp_labels(&self.registry, Utc::now());
                self.view.tick(&labels);
            }
            EngineInput::Clear { filepath } => self.clear(filepath),
            EngineInput::ClearFinished { filepath, result } => match result {
                Ok(()) => {
                    tracing::debug!(filepath = %filepath, "clear acknowledged");
                    self.refresh();
                }
                Err(e) => {
                    tracing::warn!(filepath = %filepath, "clear failed: {}", e);
                    self.set_sync_status(SyncStatus::Stale);
                }
            },
            EngineInput::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            EngineInput::Shutdown => return false,
        }
        true
    }

    pub fn registry(&self) -> &DownloadRegistry {
        &self.registry
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            records: self.registry.iter().cloned().collect(),
            any_in_progress: self.registry.any_in_progress(),
            sync_status: self.sync_status,
            channel_state: self.channel_state,
        }
    }

    fn set_channel_state(&mut self, state: ChannelState) {
        if self.channel_state != state {
            self.channel_state = state;
            self.view.channel_state(state);
        }
    }

    fn set_sync_status(&mut self, status: SyncStatus) {
        if self.sync_status != status {
            self.sync_status = status;
            self.view.sync_status(status);
        }
    }

    fn on_channel_opened(&mut self, generation: u64, outbound: mpsc::UnboundedSender<String>) {
        self.channel = Some(OpenChannel {
            generation,
            outbound,
        });
        self.item_refresh.abandon_all();
        self.set_channel_state(ChannelState::Open);
        match self.settings.mode {
            TransportMode::Push => {
                self.send_command(&UpstreamCommand::InitAllDownloads);
            }
            TransportMode::Hybrid => self.refresh(),
            TransportMode::Poll => {}
        }
        self.start_ticker();
    }

    fn on_channel_closed(&mut self, generation: u64) {
        if self.channel.as_ref().map(|c| c.generation) != Some(generation) {
            return;
        }
        self.channel = None;
        self.item_refresh.abandon_all();
        self.set_channel_state(ChannelState::Disconnected);
    }

    fn apply_event(&mut self, generation: u64, event: DownstreamEvent) {
        match event {
            DownstreamEvent::InitAllDownloads(records) => {
                tracing::debug!(generation, count = records.len(), "full snapshot");
                self.registry.replace_all(records);
                self.item_refresh.abandon_all();
                for key in self.running_keys() {
                    self.schedule_item_refresh(&key);
                }
                self.set_sync_status(SyncStatus::Live);
                self.view.render(&self.registry);
            }
            DownstreamEvent::InitDownload(record) | DownstreamEvent::UpdateDownload(record) => {
                let key = record.key.clone();
                let outcome = self.registry.upsert(record);
                if outcome.changed() {
                    self.view.render(&self.registry);
                }
                match self.registry.get(&key).map(DownloadRecord::status) {
                    Some(DownloadStatus::Running) => self.schedule_item_refresh(&key),
                    _ => self.item_refresh.cancel(&key),
                }
            }
            DownstreamEvent::RemoveDownload { key } => {
                self.item_refresh.cancel(&key);
                if self.registry.remove(&key).is_some() {
                    tracing::debug!(key = %key, "download removed");
                    self.view.render(&self.registry);
                }
            }
            DownstreamEvent::RefreshDownloads => self.refresh(),
            DownstreamEvent::Unknown(event_type) => {
                tracing::debug!(event_type = %event_type, "ignoring unknown push event");
            }
        }
    }

    fn running_keys(&self) -> Vec<String> {
        self.registry
            .iter()
            .filter(|r| r.status() == DownloadStatus::Running)
            .map(|r| r.key.clone())
            .collect()
    }

    fn schedule_item_refresh(&mut self, key: &str) {
        if !self.settings.item_refresh || self.settings.mode != TransportMode::Push {
            return;
        }
        if self.channel.is_none() {
            return;
        }
        let Some(ticket) = self.item_refresh.schedule(key) else {
            return;
        };
        self.spawn_after(
            self.settings.item_refresh_interval,
            EngineInput::ItemRefreshDue {
                key: key.to_string(),
                ticket,
            },
        );
    }

    fn on_item_refresh_due(&mut self, key: &str, ticket: u64) {
        if !self.item_refresh.take_due(key, ticket) {
            return;
        }
        let running = self
            .registry
            .get(key)
            .is_some_and(|r| r.status() == DownloadStatus::Running);
        if !running {
            return;
        }
        self.send_command(&UpstreamCommand::GetDownload {
            download_key: key.to_string(),
        });
    }

    /// Send over the open push channel. Returns false if there is none.
    fn send_command(&self, command: &UpstreamCommand) -> bool {
        let Some(channel) = self.channel.as_ref() else {
            tracing::warn!(event_type = command.event_type(), "push channel not open; command dropped");
            return false;
        };
        let text = match command.encode(&self.settings.location) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(event_type = command.event_type(), "encode command: {}", e);
                return false;
            }
        };
        if channel.outbound.send(text).is_err() {
            tracing::debug!(event_type = command.event_type(), "push channel writer gone");
            return false;
        }
        tracing::debug!(event_type = command.event_type(), generation = channel.generation, "command sent");
        true
    }

    /// Poll-mode refresh. Coalesces with an in-flight request and disarms any
    /// pending re-poll timer.
    fn refresh(&mut self) {
        let Some(source) = self.source.clone() else {
            tracing::debug!("refresh requested but no poll endpoint configured");
            return;
        };
        self.poll.timer_token += 1;
        if self.poll.in_flight {
            self.poll.rerun = true;
            return;
        }
        self.poll.in_flight = true;
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let result = source.fetch_snapshot().await;
            let _ = inbox.send(EngineInput::PollFinished(result));
        });
    }

    fn on_poll_finished(&mut self, result: Result<PollSnapshot, TransportError>) {
        self.poll.in_flight = false;
        match result {
            Ok(snapshot) => {
                self.registry.replace_all(snapshot.records);
                self.view.render_list(&snapshot.rendered_list);
                self.view.render(&self.registry);
                self.set_sync_status(SyncStatus::Live);
                if std::mem::take(&mut self.poll.rerun) {
                    self.refresh();
                } else if snapshot.in_progress {
                    self.poll.timer_token += 1;
                    let token = self.poll.timer_token;
                    self.spawn_after(self.settings.poll_interval, EngineInput::PollDue { token });
                }
            }
            Err(e) => {
                tracing::warn!("poll failed; waiting for the next trigger: {}", e);
                self.poll.rerun = false;
                self.set_sync_status(SyncStatus::Stale);
            }
        }
    }

    fn clear(&mut self, filepath: String) {
        match self.settings.mode {
            TransportMode::Push => {
                let sent = self.send_command(&UpstreamCommand::ClearDownload { filepath });
                if !sent {
                    self.set_sync_status(SyncStatus::Stale);
                }
            }
            TransportMode::Poll | TransportMode::Hybrid => {
                let Some(source) = self.source.clone() else {
                    tracing::warn!(filepath = %filepath, "no clear endpoint configured");
                    return;
                };
                let inbox = self.inbox.clone();
                tokio::spawn(async move {
                    let result = source.clear(&filepath).await;
                    let _ = inbox.send(EngineInput::ClearFinished { filepath, result });
                });
            }
        }
    }

    fn start_ticker(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let inbox = self.inbox.clone();
        let period = self.settings.tick_interval;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if inbox.send(EngineInput::Tick).is_err() {
                    break;
                }
            }
        }));
    }

    fn spawn_after(&self, delay: Duration, input: EngineInput) {
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(input);
        });
    }
}
