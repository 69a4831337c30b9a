//! Wire codec for the push channel and the poll endpoint.
//!
//! Upstream commands are JSON text frames `{"eventType", "location", "data"?}`.
//! Downstream events are `{"eventType", "data"}`; `data` is either an array of
//! records (`initAllDownloads`) or a `{downloadKey, download}` pair. Unknown
//! event types decode to [`DownstreamEvent::Unknown`] so callers can skip them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::DownloadRecord;

/// Decode-level failure. The offending frame is dropped; the channel stays up.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{event}: bad payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{event}: expected {expected}")]
    Shape {
        event: &'static str,
        expected: &'static str,
    },
    #[error("{event}: download has no key")]
    MissingKey { event: &'static str },
}

/// Client -> server command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamCommand {
    /// Ask for a full snapshot (answered with `initAllDownloads`).
    InitAllDownloads,
    /// Ask for the current state of one download.
    GetDownload { download_key: String },
    /// Ask the server to delete a finished download's file.
    ClearDownload { filepath: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireCommand<'a> {
    event_type: &'static str,
    location: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<CommandData<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum CommandData<'a> {
    Filepath {
        filepath: &'a str,
    },
    DownloadKey {
        #[serde(rename = "downloadKey")]
        download_key: &'a str,
    },
}

impl UpstreamCommand {
    pub fn event_type(&self) -> &'static str {
        match self {
            UpstreamCommand::InitAllDownloads => "initAllDownloads",
            UpstreamCommand::GetDownload { .. } => "getDownload",
            UpstreamCommand::ClearDownload { .. } => "clearDownload",
        }
    }

    /// Encode as a text frame. `location` identifies the page/host the client
    /// runs on.
    pub fn encode(&self, location: &str) -> Result<String, ProtocolError> {
        let data = match self {
            UpstreamCommand::InitAllDownloads => None,
            UpstreamCommand::GetDownload { download_key } => Some(CommandData::DownloadKey {
                download_key: download_key.as_str(),
            }),
            UpstreamCommand::ClearDownload { filepath } => Some(CommandData::Filepath {
                filepath: filepath.as_str(),
            }),
        };
        let wire = WireCommand {
            event_type: self.event_type(),
            location,
            data,
        };
        Ok(serde_json::to_string(&wire)?)
    }
}

/// Server -> client event, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamEvent {
    InitAllDownloads(Vec<DownloadRecord>),
    InitDownload(DownloadRecord),
    UpdateDownload(DownloadRecord),
    /// Also produced for an init/update whose `download` is null: the server
    /// no longer knows the key.
    RemoveDownload { key: String },
    RefreshDownloads,
    Unknown(String),
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "eventType")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct KeyedRecord {
    #[serde(rename = "downloadKey", alias = "download_key", default)]
    download_key: Option<String>,
    #[serde(default)]
    download: Option<DownloadRecord>,
}

/// Decode one downstream text frame.
pub fn decode_event(text: &str) -> Result<DownstreamEvent, ProtocolError> {
    let wire: WireEvent = serde_json::from_str(text)?;
    let event = match wire.event_type.as_str() {
        "initAllDownloads" => DownstreamEvent::InitAllDownloads(decode_list(
            "initAllDownloads",
            wire.data,
        )?),
        "initDownload" => keyed_event("initDownload", wire.data, DownstreamEvent::InitDownload)?,
        "updateDownload" => {
            keyed_event("updateDownload", wire.data, DownstreamEvent::UpdateDownload)?
        }
        "removeDownload" => {
            let keyed = keyed_record("removeDownload", wire.data)?;
            let key = keyed
                .download_key
                .filter(|k| !k.is_empty())
                .or_else(|| keyed.download.map(|d| d.normalize().key))
                .filter(|k| !k.is_empty())
                .ok_or(ProtocolError::MissingKey {
                    event: "removeDownload",
                })?;
            DownstreamEvent::RemoveDownload { key }
        }
        "refreshDownloads" => DownstreamEvent::RefreshDownloads,
        _ => DownstreamEvent::Unknown(wire.event_type),
    };
    Ok(event)
}

fn keyed_record(event: &'static str, data: Value) -> Result<KeyedRecord, ProtocolError> {
    if !data.is_object() {
        return Err(ProtocolError::Shape {
            event,
            expected: "an object with downloadKey/download",
        });
    }
    serde_json::from_value(data).map_err(|source| ProtocolError::Payload { event, source })
}

fn keyed_event(
    event: &'static str,
    data: Value,
    wrap: fn(DownloadRecord) -> DownstreamEvent,
) -> Result<DownstreamEvent, ProtocolError> {
    let keyed = keyed_record(event, data)?;
    match keyed.download {
        Some(record) => Ok(wrap(with_key(event, record, keyed.download_key)?)),
        None => {
            let key = keyed
                .download_key
                .filter(|k| !k.is_empty())
                .ok_or(ProtocolError::MissingKey { event })?;
            Ok(DownstreamEvent::RemoveDownload { key })
        }
    }
}

/// Snapshot entries are bare records or `{downloadKey, download}` wrappers.
fn decode_list(event: &'static str, data: Value) -> Result<Vec<DownloadRecord>, ProtocolError> {
    let Value::Array(entries) = data else {
        return Err(ProtocolError::Shape {
            event,
            expected: "an array of downloads",
        });
    };
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let record = if entry.get("download").is_some() {
            let keyed = keyed_record(event, entry)?;
            match keyed.download {
                Some(record) => with_key(event, record, keyed.download_key)?,
                None => continue,
            }
        } else {
            let record: DownloadRecord = serde_json::from_value(entry)
                .map_err(|source| ProtocolError::Payload { event, source })?;
            with_key(event, record, None)?
        };
        records.push(record);
    }
    Ok(records)
}

fn with_key(
    event: &'static str,
    mut record: DownloadRecord,
    envelope_key: Option<String>,
) -> Result<DownloadRecord, ProtocolError> {
    if let Some(key) = envelope_key.filter(|k| !k.is_empty()) {
        record.key = key;
    }
    let record = record.normalize();
    if record.key.is_empty() {
        return Err(ProtocolError::MissingKey { event });
    }
    Ok(record)
}

/// Decoded poll endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSnapshot {
    /// Opaque pre-rendered list; handed to the view untouched.
    pub rendered_list: String,
    pub records: Vec<DownloadRecord>,
    /// Server-side "work remaining" flag.
    pub in_progress: bool,
}

#[derive(Deserialize)]
struct WirePollResponse {
    #[serde(alias = "renderedList", default)]
    html: Option<String>,
    #[serde(default)]
    downloads: Option<Value>,
    #[serde(alias = "inProgress", default)]
    in_progress: Option<bool>,
}

/// Decode a poll endpoint body. A missing `in_progress` flag is derived from
/// the records.
pub fn decode_poll_response(body: &[u8]) -> Result<PollSnapshot, ProtocolError> {
    let wire: WirePollResponse = serde_json::from_slice(body)?;
    let records = match wire.downloads {
        Some(Value::Null) | None => Vec::new(),
        Some(list) => decode_list("poll", list)?,
    };
    let in_progress = wire
        .in_progress
        .unwrap_or_else(|| records.iter().any(|r| !r.complete));
    Ok(PollSnapshot {
        rendered_list: wire.html.unwrap_or_default(),
        records,
        in_progress,
    })
}
