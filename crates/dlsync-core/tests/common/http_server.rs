//! Minimal HTTP/1.1 server standing in for the poll and clear endpoints.
//!
//! `GET` on any path answers with the current poll body; `POST` records the
//! form body and answers `{}`. Every request is recorded for assertions.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

pub const POLL_PATH: &str = "/async_downloads/ajax_update/";
pub const CLEAR_PATH: &str = "/async_downloads/ajax_clear_download/";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    /// Raw request head, lowercased.
    pub head: String,
    pub body: String,
}

#[derive(Debug)]
struct State {
    poll_body: String,
    status: u16,
    requests: Vec<Recorded>,
}

#[derive(Debug, Clone)]
pub struct PollServer {
    pub base: String,
    state: Arc<Mutex<State>>,
}

impl PollServer {
    pub fn poll_url(&self) -> String {
        format!("{}{}", self.base, POLL_PATH)
    }

    pub fn clear_url(&self) -> String {
        format!("{}{}", self.base, CLEAR_PATH)
    }

    pub fn set_poll_body(&self, body: &str) {
        self.state.lock().unwrap().poll_body = body.to_string();
    }

    pub fn set_status(&self, status: u16) {
        self.state.lock().unwrap().status = status;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }
}

/// Starts a server in a background thread. The server runs until the process
/// exits.
pub fn start(poll_body: &str) -> PollServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(State {
        poll_body: poll_body.to_string(),
        status: 200,
        requests: Vec::new(),
    }));
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &state));
        }
    });
    PollServer {
        base: format!("http://127.0.0.1:{}", port),
        state,
    }
}

fn handle(mut stream: std::net::TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };

    let (status, body) = {
        let mut state = state.lock().unwrap();
        let reply = if request.method.eq_ignore_ascii_case("POST") {
            (state.status, "{}".to_string())
        } else {
            (state.status, state.poll_body.clone())
        };
        state.requests.push(request);
        reply
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        if status < 300 { "OK" } else { "Error" },
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn read_request(stream: &mut std::net::TcpStream) -> Option<Recorded> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while data.len() < head_end + content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let body = String::from_utf8_lossy(&data[head_end..]).to_string();
    Some(Recorded {
        method,
        path,
        head: head.to_ascii_lowercase(),
        body,
    })
}
