//! In-process fakes for the engine's collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::protocol::PollSnapshot;
use crate::record::DownloadRecord;
use crate::registry::DownloadRegistry;
use crate::supervisor::ChannelState;
use crate::transport::{Connection, Connector, SnapshotSource, TransportError};
use crate::view::{DownloadView, SyncStatus, TimestampLabel};

pub fn running(key: &str, percentage: u8) -> DownloadRecord {
    DownloadRecord {
        key: key.to_string(),
        filepath: format!("downloads/{key}/{key}.csv"),
        display_name: format!("{key}.csv"),
        percentage,
        ..Default::default()
    }
}

pub fn finished(key: &str) -> DownloadRecord {
    DownloadRecord {
        complete: true,
        percentage: 100,
        ..running(key, 100)
    }
}

pub fn init_all_event(records: &[DownloadRecord]) -> String {
    json!({ "eventType": "initAllDownloads", "data": records }).to_string()
}

pub fn event_type_of(frame: &str) -> String {
    let value: Value = serde_json::from_str(frame).unwrap();
    value["eventType"].as_str().unwrap().to_string()
}

#[derive(Debug, Default)]
pub struct ViewLog {
    /// Keys in display order after each render.
    pub renders: Vec<Vec<String>>,
    pub lists: Vec<String>,
    pub ticks: Vec<Vec<TimestampLabel>>,
    pub statuses: Vec<SyncStatus>,
    pub channel_states: Vec<ChannelState>,
}

impl ViewLog {
    pub fn last_render(&self) -> Vec<String> {
        self.renders.last().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    pub log: Arc<Mutex<ViewLog>>,
}

impl DownloadView for RecordingView {
    fn render(&mut self, registry: &DownloadRegistry) {
        self.log.lock().unwrap().renders.push(registry.keys());
    }

    fn render_list(&mut self, rendered: &str) {
        self.log.lock().unwrap().lists.push(rendered.to_string());
    }

    fn tick(&mut self, labels: &[TimestampLabel]) {
        self.log.lock().unwrap().ticks.push(labels.to_vec());
    }

    fn sync_status(&mut self, status: SyncStatus) {
        self.log.lock().unwrap().statuses.push(status);
    }

    fn channel_state(&mut self, state: ChannelState) {
        self.log.lock().unwrap().channel_states.push(state);
    }
}

/// Poll/clear endpoints backed by queued responses. An empty queue answers
/// with the current `server` list and a derived in-progress flag.
#[derive(Default)]
pub struct FakeSource {
    pub responses: Mutex<VecDeque<Result<PollSnapshot, TransportError>>>,
    pub server: Mutex<Vec<DownloadRecord>>,
    pub fetches: Mutex<usize>,
    pub clears: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_server(records: Vec<DownloadRecord>) -> Arc<Self> {
        let source = Self::default();
        *source.server.lock().unwrap() = records;
        Arc::new(source)
    }

    pub fn push_response(&self, response: Result<PollSnapshot, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

pub fn http_failure() -> TransportError {
    TransportError::Http {
        method: "GET",
        url: "http://test/ajax_update/".into(),
        status: 502,
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    async fn fetch_snapshot(&self) -> Result<PollSnapshot, TransportError> {
        *self.fetches.lock().unwrap() += 1;
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        let records = self.server.lock().unwrap().clone();
        let in_progress = records.iter().any(|r| !r.complete);
        Ok(PollSnapshot {
            rendered_list: format!("<ul>{}</ul>", records.len()),
            records,
            in_progress,
        })
    }

    async fn clear(&self, filepath: &str) -> Result<(), TransportError> {
        self.clears.lock().unwrap().push(filepath.to_string());
        self.server.lock().unwrap().retain(|r| r.filepath != filepath);
        Ok(())
    }
}

/// Server side of one fake push connection.
pub struct FakePeer {
    /// Commands the client sent.
    pub commands: mpsc::UnboundedReceiver<String>,
    /// Frames to deliver to the client. Dropping it closes the channel.
    pub frames: mpsc::UnboundedSender<String>,
}

impl FakePeer {
    pub fn pair() -> (Connection, FakePeer) {
        let (outbound, commands) = mpsc::unbounded_channel();
        let (frames, inbound) = mpsc::unbounded_channel();
        (Connection { outbound, inbound }, FakePeer { commands, frames })
    }

    pub fn send(&self, frame: String) {
        self.frames.send(frame).unwrap();
    }
}

/// Hands out queued connection attempts in order; once the queue is empty,
/// `connect` never completes.
#[derive(Default)]
pub struct FakeConnector {
    attempts: Mutex<VecDeque<Result<Connection, TransportError>>>,
    pub connects: Arc<Mutex<usize>>,
}

impl FakeConnector {
    pub fn new(attempts: Vec<Result<Connection, TransportError>>) -> Self {
        Self {
            attempts: Mutex::new(attempts.into()),
            connects: Arc::default(),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Connection, TransportError> {
        *self.connects.lock().unwrap() += 1;
        let next = self.attempts.lock().unwrap().pop_front();
        match next {
            Some(attempt) => attempt,
            None => std::future::pending().await,
        }
    }
}
