//! Push channel over a websocket.
//!
//! After the handshake two pump tasks bridge the socket to plain channels: a
//! writer (outbound strings -> text frames) and a reader (text frames ->
//! inbound strings). The reader drops its sender on close or error, which is
//! how the supervisor sees the channel go away.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{Connection, Connector, TransportError};
use crate::context::ClientContext;

#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    headers: BTreeMap<String, String>,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(ctx: &ClientContext) -> Self {
        Self {
            url: ctx.push_url.clone(),
            headers: ctx.headers.clone(),
            connect_timeout: ctx.request_timeout,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection, TransportError> {
        let mut request = self.url.as_str().into_client_request()?;
        for (name, value) in &self.headers {
            let header_name =
                HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| TransportError::Header {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value.trim()).map_err(|e| TransportError::Header {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            request.headers_mut().insert(header_name, header_value);
        }

        let (stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))??;
        tracing::debug!(url = %self.url, "push channel handshake complete");

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::debug!("push channel write: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                        tracing::debug!(reason = %reason, "push channel closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("push channel read: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Connection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
