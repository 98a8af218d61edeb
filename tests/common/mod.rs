//! In-process mock bridge for integration tests.
//!
//! Accepts WebSocket connections on a random local port and answers
//! `check_connection` and `raw` frames according to a mutable script.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bridge_client::{
    BridgeClient, ClientEvent, ConnectionState, RetryPolicy, Role, protocol::decode_data_url,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Script
// ============================================================================

/// How the bridge answers `check_connection`.
#[derive(Debug, Clone)]
pub enum ProbeReply {
    Connected(Option<String>),
    Unreachable(Option<String>),
    Silent,
}

/// How the bridge answers a `file_upload` envelope.
#[derive(Debug, Clone)]
pub enum UploadReply {
    /// `upload_success`, echoing filename and size.
    Success,
    /// `error` with the given message.
    Error(String),
    Silent,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub probe: ProbeReply,
    pub upload: UploadReply,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            probe: ProbeReply::Connected(Some("COM3".to_string())),
            upload: UploadReply::Success,
        }
    }
}

/// A `file_upload` the bridge received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedUpload {
    pub filename: String,
    pub size: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
enum Control {
    /// Close every open connection.
    Drop,
    /// Send a frame on every open connection.
    Push(String),
}

// ============================================================================
// MockBridge
// ============================================================================

struct Shared {
    script: Mutex<Script>,
    connections: AtomicUsize,
    probes: AtomicUsize,
    uploads: Mutex<Vec<ReceivedUpload>>,
    control: broadcast::Sender<Control>,
}

pub struct MockBridge {
    port: u16,
    shared: Arc<Shared>,
}

impl MockBridge {
    /// Starts a bridge with the default script (device on `COM3`).
    pub async fn start() -> Self {
        Self::with_script(Script::default()).await
    }

    pub async fn with_script(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let (control, _) = broadcast::channel(16);

        let shared = Arc::new(Shared {
            script: Mutex::new(script),
            connections: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            control,
        });

        let accept_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_shared)));
            }
        });

        Self { port, shared }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    pub fn set_probe(&self, probe: ProbeReply) {
        self.shared.script.lock().probe = probe;
    }

    pub fn set_upload(&self, upload: UploadReply) {
        self.shared.script.lock().upload = upload;
    }

    /// Number of WebSocket connections accepted so far.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Number of `check_connection` frames received so far.
    pub fn probes(&self) -> usize {
        self.shared.probes.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.shared.uploads.lock().clone()
    }

    /// Closes every open connection from the bridge side.
    pub fn drop_connections(&self) {
        let _ = self.shared.control.send(Control::Drop);
    }

    /// Sends an unsolicited frame on every open connection.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.shared.control.send(Control::Push(frame.into()));
    }

    /// Waits until at least `count` connections were accepted.
    pub async fn wait_for_connections(&self, count: usize) {
        timeout(WAIT, async {
            while self.connections() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection count not reached");
    }
}

async fn serve(stream: TcpStream, shared: Arc<Shared>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    let mut control = shared.control.subscribe();
    shared.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = respond(&shared, text.as_str())
                        && ws.send(Message::Text(reply.into())).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },

            control = control.recv() => match control {
                Ok(Control::Drop) => {
                    let _ = ws.close(None).await;
                    break;
                }
                Ok(Control::Push(frame)) => {
                    if ws.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(_) => {}
            },
        }
    }
}

/// Builds the scripted reply to one client frame.
fn respond(shared: &Shared, text: &str) -> Option<String> {
    let frame: Value = serde_json::from_str(text).ok()?;

    match frame.get("type")?.as_str()? {
        "check_connection" => {
            shared.probes.fetch_add(1, Ordering::SeqCst);
            let reply = match shared.script.lock().probe.clone() {
                ProbeReply::Connected(port) => {
                    json!({"type": "connection_status", "connected": true, "port": port})
                }
                ProbeReply::Unreachable(Some(reason)) => {
                    json!({"type": "connection_status", "connected": false, "reason": reason})
                }
                ProbeReply::Unreachable(None) => {
                    json!({"type": "connection_status", "connected": false})
                }
                ProbeReply::Silent => return None,
            };
            Some(reply.to_string())
        }

        "raw" => {
            let data = frame.get("data")?.as_str()?;
            let inner: Value = serde_json::from_str(data).ok()?;

            if inner.get("type").and_then(Value::as_str) != Some("file_upload") {
                return Some(json!({"type": "ack", "len": data.len()}).to_string());
            }

            let filename = inner.get("filename")?.as_str()?.to_string();
            let size = inner.get("size")?.as_u64()?;
            let payload = decode_data_url(inner.get("data")?.as_str()?).ok()?;
            shared.uploads.lock().push(ReceivedUpload {
                filename: filename.clone(),
                size,
                payload,
            });

            let reply = match shared.script.lock().upload.clone() {
                UploadReply::Success => {
                    json!({"type": "upload_success", "filename": filename, "size": size})
                }
                UploadReply::Error(message) => json!({"type": "error", "message": message}),
                UploadReply::Silent => return None,
            };
            Some(reply.to_string())
        }

        _ => None,
    }
}

// ============================================================================
// Client Helpers
// ============================================================================

/// Short timings so scenarios finish quickly.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_connect_timeout(Duration::from_secs(1))
        .with_probe_interval(Duration::from_secs(60))
        .with_probe_timeout(Duration::from_millis(300))
        .with_reconnect_delay(Duration::from_millis(200))
        .with_request_timeout(Duration::from_millis(500))
}

pub fn spawn_client(
    url: &str,
    role: Role,
    policy: RetryPolicy,
) -> (BridgeClient, mpsc::UnboundedReceiver<ClientEvent>) {
    init_tracing();
    let (tx, rx) = mpsc::unbounded_channel();
    let client = BridgeClient::builder()
        .url(url, role)
        .policy(policy)
        .spawn(tx)
        .expect("spawn client");
    (client, rx)
}

pub async fn wait_for_state(client: &BridgeClient, state: ConnectionState) {
    let mut status = client.watch_status();
    timeout(WAIT, status.wait_for(|s| s.state == state))
        .await
        .unwrap_or_else(|_| panic!("state {state} not reached, at {}", client.state()))
        .expect("supervisor alive");
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("addr").port()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
