use crate::cli::ModeArg;
use crate::cli::apply_overrides;
use dlsync_core::config::{SyncConfig, TransportMode};

#[test]
fn flags_override_config() {
    let cfg = apply_overrides(
        SyncConfig::default(),
        Some(ModeArg::Poll),
        Some("http://example.com/poll/".into()),
        Some("ws://example.com/push/".into()),
    );
    assert_eq!(cfg.mode, TransportMode::Poll);
    assert_eq!(cfg.poll_url, "http://example.com/poll/");
    assert_eq!(cfg.push_url.as_deref(), Some("ws://example.com/push/"));
}

#[test]
fn absent_flags_keep_config() {
    let base = SyncConfig {
        push_url: Some("wss://app.example.com/ws/".into()),
        ..Default::default()
    };
    let cfg = apply_overrides(base, None, None, None);
    assert_eq!(cfg.mode, TransportMode::Push);
    assert_eq!(cfg.push_url.as_deref(), Some("wss://app.example.com/ws/"));
}
