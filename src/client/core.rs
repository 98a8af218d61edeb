//! Bridge client handle.
//!
//! [`BridgeClient`] is a cheap, cloneable handle to a running supervisor.
//! Every method is a message to the supervisor task; state is read from the
//! status feed it publishes.
//!
//! # Example
//!
//! ```no_run
//! use bridge_client::{BridgeClient, ClientEvent};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> bridge_client::Result<()> {
//! let (events, _rx) = mpsc::unbounded_channel::<ClientEvent>();
//! let client = BridgeClient::builder().transmit().spawn(events)?;
//!
//! let device = client.check_connection().await?;
//! println!("{}", device.label());
//!
//! let receipt = client.upload_file("test.bin", 3, &[1, 2, 3]).await?;
//! println!("sent {} ({} bytes)", receipt.filename, receipt.size);
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{FileUpload, MAX_UPLOAD_SIZE, Outbound};

use super::builder::ClientBuilder;
use super::config::ClientConfig;
use super::exchange::{Reply, RequestKind, UploadReceipt};
use super::observer::Observer;
use super::state::ConnectionState;
use super::status::{ClientStatus, DeviceStatus};
use super::supervisor::{Command, Supervisor};

// ============================================================================
// Types
// ============================================================================

/// Shared state behind every handle.
struct ClientInner {
    /// Validated configuration.
    config: ClientConfig,
    /// Commands to the supervisor task.
    command_tx: mpsc::UnboundedSender<Command>,
    /// Status published by the supervisor task.
    status_rx: watch::Receiver<ClientStatus>,
}

// ============================================================================
// BridgeClient
// ============================================================================

/// Client for one bridge endpoint.
///
/// Cloning shares the same supervisor. Dropping the last handle tears the
/// connection down.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("url", &self.inner.config.url.as_str())
            .field("role", &self.inner.config.role)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BridgeClient - Public API
// ============================================================================

impl BridgeClient {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Requests a session.
    ///
    /// A no-op while an attempt is in flight; re-probes the device if the
    /// client is already `Ready`. Returns immediately.
    ///
    /// # Errors
    ///
    /// [`Error::Shutdown`] if the client was shut down.
    pub fn connect(&self) -> Result<()> {
        self.send(Command::Connect)
    }

    /// Checks that the device is reachable through the bridge.
    ///
    /// Opens a session first if none is open. Concurrent calls share one
    /// probe.
    ///
    /// # Errors
    ///
    /// - [`Error::DeviceUnreachable`] if the bridge reports the device missing
    /// - [`Error::Timeout`] if the bridge does not answer the probe in time
    /// - [`Error::ConnectionTimeout`] / [`Error::Transport`] if the session
    ///   could not be opened
    /// - [`Error::Cancelled`] if the client shuts down meanwhile
    /// - [`Error::Shutdown`] if the client was shut down
    pub async fn check_connection(&self) -> Result<DeviceStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CheckConnection { reply })?;

        match Self::await_reply(rx).await? {
            Reply::Device(device) => Ok(device),
            other => Err(Error::protocol(format!("unexpected probe reply: {other:?}"))),
        }
    }

    /// Uploads a file to the device.
    ///
    /// `payload` is encoded as a data URL and wrapped in a `raw` envelope.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the endpoint role does not accept
    ///   uploads or the payload exceeds [`MAX_UPLOAD_SIZE`]
    /// - [`Error::NotReady`] unless the client is `Ready`
    /// - [`Error::RequestInFlight`] if another upload or raw request is pending
    /// - [`Error::TransferRejected`] if the bridge answers with `error`
    /// - [`Error::Timeout`] if the bridge does not answer in time
    /// - [`Error::Cancelled`] if the session is lost meanwhile
    pub async fn upload_file(
        &self,
        filename: impl Into<String>,
        size: u64,
        payload: &[u8],
    ) -> Result<UploadReceipt> {
        if payload.len() as u64 > MAX_UPLOAD_SIZE {
            return Err(Error::invalid_argument(format!(
                "payload of {} bytes exceeds the {MAX_UPLOAD_SIZE} byte limit",
                payload.len()
            )));
        }

        self.upload(FileUpload::new(filename, size, payload)).await
    }

    /// Uploads an already encoded file message.
    ///
    /// # Errors
    ///
    /// Same as [`upload_file`](Self::upload_file).
    pub async fn upload(&self, upload: FileUpload) -> Result<UploadReceipt> {
        let role = self.inner.config.role;
        if !role.accepts_uploads() {
            return Err(Error::invalid_argument(format!(
                "{role} endpoint does not accept uploads"
            )));
        }

        let frame = upload.to_envelope()?.to_json()?;
        debug!(filename = %upload.filename, size = upload.size, "Uploading file");

        match self.request(RequestKind::Upload, frame).await? {
            Reply::Uploaded(mut receipt) => {
                // The bridge may omit the echo
                if receipt.filename.is_empty() {
                    receipt.filename = upload.filename;
                }
                if receipt.size == 0 {
                    receipt.size = upload.size;
                }
                Ok(receipt)
            }
            other => Err(Error::protocol(format!("unexpected upload reply: {other:?}"))),
        }
    }

    /// Sends an application message in a `raw` envelope.
    ///
    /// Resolves with the byte count from the bridge's `ack`, if reported.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if `message` does not serialize
    /// - [`Error::NotReady`] unless the client is `Ready`
    /// - [`Error::RequestInFlight`] if another upload or raw request is pending
    /// - [`Error::TransferRejected`] if the bridge answers with `error`
    /// - [`Error::Timeout`] if the bridge does not answer in time
    pub async fn send_raw<T: Serialize + ?Sized>(&self, message: &T) -> Result<Option<u64>> {
        let frame = Outbound::envelope(message)?.to_json()?;

        match self.request(RequestKind::Raw, frame).await? {
            Reply::Acknowledged { len } => Ok(len),
            other => Err(Error::protocol(format!("unexpected raw reply: {other:?}"))),
        }
    }

    /// Returns the latest status snapshot.
    #[must_use]
    pub fn status(&self) -> ClientStatus {
        self.inner.status_rx.borrow().clone()
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.status_rx.borrow().state
    }

    /// Returns the last known device status.
    #[must_use]
    pub fn device_status(&self) -> DeviceStatus {
        self.inner.status_rx.borrow().device.clone()
    }

    /// Returns a receiver that observes every status change.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ClientStatus> {
        self.inner.status_rx.clone()
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Tears the connection down.
    ///
    /// Stops the monitor and reconnect timer, closes the session and
    /// cancels every pending request. Terminal: later calls fail with
    /// [`Error::Shutdown`]. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.send(Command::Shutdown { done }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Returns `true` once the supervisor has stopped.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.command_tx.is_closed()
    }
}

// ============================================================================
// BridgeClient - Internal API
// ============================================================================

impl BridgeClient {
    /// Spawns the supervisor for `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(config: ClientConfig, observer: impl Observer) -> Self {
        let (command_tx, status_rx) = Supervisor::spawn(config.clone(), Arc::new(observer));

        Self {
            inner: Arc::new(ClientInner {
                config,
                command_tx,
                status_rx,
            }),
        }
    }

    async fn request(&self, kind: RequestKind, frame: String) -> Result<Reply> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Request { kind, frame, reply })?;
        Self::await_reply(rx).await
    }

    fn send(&self, command: Command) -> Result<()> {
        self.inner
            .command_tx
            .send(command)
            .map_err(|_| Error::Shutdown)
    }

    /// Waits for the supervisor's answer. A dropped reply channel means the
    /// supervisor task is gone.
    async fn await_reply(rx: oneshot::Receiver<Result<Reply>>) -> Result<Reply> {
        rx.await?
    }
}

// ============================================================================
// Tests
// ============================================================================
