//! Explicit client context: endpoints, location and pass-through headers.
//!
//! Built once from [`SyncConfig`] and shared by the transports, so no
//! component reads endpoints from ambient state.

use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

use crate::config::SyncConfig;
use crate::transport::TransportError;

#[derive(Debug, Clone)]
pub struct ClientContext {
    pub poll_url: Url,
    pub clear_url: Url,
    pub push_url: Url,
    /// Sent as `location` with every upstream command.
    pub location: String,
    pub headers: BTreeMap<String, String>,
    pub request_timeout: Duration,
}

impl ClientContext {
    pub fn from_config(cfg: &SyncConfig) -> Result<Self, TransportError> {
        let poll_url = parse_url(&cfg.poll_url)?;
        let clear_url = parse_url(&cfg.clear_url)?;
        let push_url = match cfg.push_url.as_deref() {
            Some(raw) => parse_url(raw)?,
            None => derive_push_url(&poll_url)?,
        };
        let location = cfg
            .location
            .clone()
            .unwrap_or_else(|| host_with_port(&poll_url));
        Ok(Self {
            poll_url,
            clear_url,
            push_url,
            location,
            headers: cfg.headers.clone(),
            request_timeout: cfg.request_timeout(),
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, TransportError> {
    Url::parse(raw).map_err(|source| TransportError::Endpoint {
        url: raw.to_string(),
        source,
    })
}

/// Same host and path as the poll endpoint, with `http` -> `ws` and
/// `https` -> `wss`.
pub fn derive_push_url(poll_url: &Url) -> Result<Url, TransportError> {
    let scheme = match poll_url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        _ => return Err(TransportError::PushUrl(poll_url.to_string())),
    };
    let mut push = poll_url.clone();
    push.set_scheme(scheme)
        .map_err(|()| TransportError::PushUrl(poll_url.to_string()))?;
    Ok(push)
}

fn host_with_port(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}
