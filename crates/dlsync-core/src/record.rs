//! Download records as the client sees them, and their JSON wire shape.
//!
//! Wire fields: `key`, `url`, `filepath`, `name`, `product`, `timestamp`,
//! `percentage`, `complete`, `errors`. Servers send `null` or `""` for unset
//! strings, and an empty `errors` means "no error".

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Derived lifecycle status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Running,
    Succeeded,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Running => "running",
            DownloadStatus::Succeeded => "succeeded",
            DownloadStatus::Failed => "failed",
        }
    }

    /// Succeeded and failed records never go back to running.
    pub fn is_terminal(self) -> bool {
        !matches!(self, DownloadStatus::Running)
    }
}

/// One background job as delivered by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Stable job identifier. May be empty on the wire when the envelope
    /// carries it as `downloadKey`; the decoder fills it in.
    #[serde(default, deserialize_with = "string_or_null")]
    pub key: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub url: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub filepath: String,
    #[serde(rename = "name", default, deserialize_with = "string_or_null")]
    pub display_name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub product: String,
    /// Server-side creation time.
    #[serde(rename = "timestamp", default, with = "wire_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "clamped_percentage")]
    pub percentage: u8,
    #[serde(default)]
    pub complete: bool,
    #[serde(rename = "errors", default, deserialize_with = "non_empty_string")]
    pub error_message: Option<String>,
}

impl DownloadRecord {
    pub fn status(&self) -> DownloadStatus {
        if self.error_message.is_some() {
            DownloadStatus::Failed
        } else if self.complete {
            DownloadStatus::Succeeded
        } else {
            DownloadStatus::Running
        }
    }

    /// Enforce the record's own invariants after decoding: an error implies
    /// completion, and a missing key falls back to the one encoded in the
    /// file path.
    pub fn normalize(mut self) -> Self {
        if self.error_message.is_some() {
            self.complete = true;
        }
        if self.key.is_empty() {
            if let Some(key) = key_from_filepath(&self.filepath) {
                self.key = key;
            }
        }
        self
    }
}

/// Server file paths look like `<prefix>/<download key>/<filename>`; returns
/// the key segment.
pub fn key_from_filepath(filepath: &str) -> Option<String> {
    let mut parts = filepath.rsplit('/').filter(|p| !p.is_empty());
    parts.next()?;
    parts.next().map(str::to_string)
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn clamped_percentage<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if raw.is_nan() {
        return Ok(0);
    }
    Ok(raw.clamp(0.0, 100.0) as u8)
}

/// `timestamp` is RFC 3339 when the server is timezone-aware; naive ISO
/// datetimes are taken as UTC.
mod wire_timestamp {
    use super::*;

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_some(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        parse(raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}
