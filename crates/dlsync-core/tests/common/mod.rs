#![allow(dead_code)]

pub mod http_server;
pub mod ws_server;

use std::sync::{Arc, Mutex};

use dlsync_core::registry::DownloadRegistry;
use dlsync_core::view::DownloadView;

/// View that keeps the keys of the last render.
#[derive(Debug, Clone, Default)]
pub struct KeysView {
    pub keys: Arc<Mutex<Vec<String>>>,
}

impl DownloadView for KeysView {
    fn render(&mut self, registry: &DownloadRegistry) {
        *self.keys.lock().unwrap() = registry.keys();
    }
}
