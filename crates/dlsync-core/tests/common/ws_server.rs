//! Local websocket server standing in for the push endpoint. Each accepted
//! connection is handed to the test as a [`WsPeer`].

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub struct WsPeer {
    stream: WebSocketStream<TcpStream>,
}

impl WsPeer {
    /// Next text frame from the client, or `None` once it went away.
    pub async fn recv_text(&mut self) -> Option<String> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
        None
    }

    pub async fn send_text(&mut self, text: String) {
        self.stream.send(Message::Text(text)).await.unwrap();
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}

pub struct WsServer {
    pub url: String,
    pub peers: mpsc::UnboundedReceiver<WsPeer>,
}

impl WsServer {
    pub async fn next_peer(&mut self) -> WsPeer {
        self.peers.recv().await.expect("ws server running")
    }
}

pub async fn start() -> WsServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().unwrap().port();
    let (tx, peers) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(stream) = tokio_tungstenite::accept_async(stream).await {
                    let _ = tx.send(WsPeer { stream });
                }
            });
        }
    });
    WsServer {
        url: format!("ws://127.0.0.1:{}/ws/downloads/", port),
        peers,
    }
}
