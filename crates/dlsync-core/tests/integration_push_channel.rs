//! Integration test: websocket push channel, supervisor reconnect and the
//! full client against local servers.

mod common;

use std::time::Duration;

use dlsync_core::client;
use dlsync_core::config::{SyncConfig, TransportMode};
use dlsync_core::context::ClientContext;
use dlsync_core::supervisor::ChannelState;
use dlsync_core::transport::{Connector, WsConnector};
use serde_json::{json, Value};
use tokio::time::timeout;

fn command_type(frame: &str) -> String {
    let value: Value = serde_json::from_str(frame).unwrap();
    value["eventType"].as_str().unwrap().to_string()
}

fn snapshot_frame(percentage: u8) -> String {
    json!({
        "eventType": "initAllDownloads",
        "data": [{
            "key": "d1",
            "name": "report.csv",
            "filepath": "downloads/d1/report.csv",
            "percentage": percentage,
            "complete": false,
        }],
    })
    .to_string()
}

fn push_config(ws_url: &str) -> SyncConfig {
    SyncConfig {
        push_url: Some(ws_url.to_string()),
        location: Some("localhost:8000".to_string()),
        mode: TransportMode::Push,
        reconnect_delay_ms: 50,
        item_refresh: false,
        request_timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn connector_bridges_text_frames() {
    let mut server = common::ws_server::start().await;
    let ctx = ClientContext::from_config(&push_config(&server.url)).unwrap();
    let mut conn = WsConnector::new(&ctx).connect().await.expect("connect");
    let mut peer = server.next_peer().await;

    conn.outbound.send("hello".to_string()).unwrap();
    assert_eq!(peer.recv_text().await.as_deref(), Some("hello"));

    peer.send_text("world".to_string()).await;
    assert_eq!(conn.inbound.recv().await.as_deref(), Some("world"));

    peer.close().await;
    let end = timeout(Duration::from_secs(5), conn.inbound.recv()).await;
    assert_eq!(end.unwrap(), None);
}

#[tokio::test]
async fn client_resyncs_after_server_drops_the_channel() {
    let mut server = common::ws_server::start().await;
    let view = common::KeysView::default();
    let keys = view.keys.clone();
    let handle = client::start(&push_config(&server.url), view).expect("start client");

    let mut first = server.next_peer().await;
    let hello = first.recv_text().await.unwrap();
    assert_eq!(command_type(&hello), "initAllDownloads");
    let sent: Value = serde_json::from_str(&hello).unwrap();
    assert_eq!(sent["location"], "localhost:8000");
    first.send_text(snapshot_frame(10)).await;
    first.close().await;

    let mut second = timeout(Duration::from_secs(5), server.next_peer())
        .await
        .expect("client reconnects");
    let hello = second.recv_text().await.unwrap();
    assert_eq!(command_type(&hello), "initAllDownloads");
    second.send_text(snapshot_frame(70)).await;

    let mut snapshot = handle.snapshot().await.unwrap();
    for _ in 0..50 {
        if snapshot.records.first().map(|r| r.percentage) == Some(70) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        snapshot = handle.snapshot().await.unwrap();
    }
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(snapshot.records[0].percentage, 70);
    assert!(snapshot.any_in_progress);
    assert_eq!(handle.channel_state(), ChannelState::Open);
    assert_eq!(*keys.lock().unwrap(), vec!["d1"]);

    handle.shutdown().await;
}
