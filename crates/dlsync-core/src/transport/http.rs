//! Poll and clear endpoints over libcurl.
//!
//! curl is blocking, so every request runs on `spawn_blocking`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::{SnapshotSource, TransportError};
use crate::context::ClientContext;
use crate::protocol::{self, PollSnapshot};

/// Request/response transport for the poll (`GET`) and clear (`POST`) endpoints.
#[derive(Debug, Clone)]
pub struct HttpPoller {
    poll_url: Url,
    clear_url: Url,
    headers: BTreeMap<String, String>,
    timeout: Duration,
}

impl HttpPoller {
    pub fn new(ctx: &ClientContext) -> Self {
        Self {
            poll_url: ctx.poll_url.clone(),
            clear_url: ctx.clear_url.clone(),
            headers: ctx.headers.clone(),
            timeout: ctx.request_timeout,
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpPoller {
    async fn fetch_snapshot(&self) -> Result<PollSnapshot, TransportError> {
        let this = self.clone();
        let body = tokio::task::spawn_blocking(move || {
            perform(&this.poll_url, &this.headers, this.timeout, None)
        })
        .await??;
        Ok(protocol::decode_poll_response(&body)?)
    }

    async fn clear(&self, filepath: &str) -> Result<(), TransportError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("filepath", filepath)
            .finish();
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            perform(&this.clear_url, &this.headers, this.timeout, Some(form.as_bytes()))
        })
        .await??;
        Ok(())
    }
}

/// Runs one request in the current thread: `GET` without a body, form `POST`
/// with one. Returns the response body on 2xx.
fn perform(
    url: &Url,
    headers: &BTreeMap<String, String>,
    timeout: Duration,
    form: Option<&[u8]>,
) -> Result<Vec<u8>, TransportError> {
    let method = if form.is_some() { "POST" } else { "GET" };
    let mut body = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url.as_str())?;
    easy.follow_location(true)?;
    easy.connect_timeout(timeout.min(Duration::from_secs(15)))?;
    easy.timeout(timeout)?;

    let mut list = curl::easy::List::new();
    list.append("Accept: application/json")?;
    list.append("X-Requested-With: XMLHttpRequest")?;
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if let Some(form) = form {
        list.append("Content-Type: application/x-www-form-urlencoded")?;
        easy.post(true)?;
        easy.post_fields_copy(form)?;
    }
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    if !(200..300).contains(&status) {
        return Err(TransportError::Http {
            method,
            url: url.to_string(),
            status,
        });
    }
    tracing::debug!(method, url = %url, status, bytes = body.len(), "request done");
    Ok(body)
}
