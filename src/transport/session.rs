//! WebSocket session and its I/O task.
//!
//! A [`Session`] owns exactly one socket to the bridge. Opening spawns a
//! tokio task that connects (bounded by the connect timeout) and then
//! shuttles frames in both directions.
//!
//! # Events
//!
//! The task reports every lifecycle change as a [`SessionEvent`] tagged with
//! the session's [`SessionGeneration`]:
//!
//! - [`SessionEvent::Opened`] once the WebSocket handshake completes
//! - [`SessionEvent::Message`] for every inbound text frame, in order
//! - [`SessionEvent::Closed`] when the bridge closes the socket
//! - [`SessionEvent::Errored`] on connect timeout, connect failure or I/O error
//!
//! Closing the session locally emits nothing; the owner already knows.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SessionGeneration;

// ============================================================================
// Types
// ============================================================================

/// Channel on which sessions report their events.
pub type EventSender = mpsc::UnboundedSender<(SessionGeneration, SessionEvent)>;

/// Receiving side of [`EventSender`].
pub type EventReceiver = mpsc::UnboundedReceiver<(SessionGeneration, SessionEvent)>;

// ============================================================================
// SessionEvent
// ============================================================================

/// Lifecycle and data events emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The WebSocket handshake completed.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The bridge closed the socket.
    Closed,
    /// The session failed.
    Errored(SessionError),
}

/// Why a session failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The transport did not open within the connect timeout.
    TimedOut {
        /// Milliseconds waited.
        timeout_ms: u64,
    },
    /// Connect, read or write failed.
    Failed(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut { .. } => f.write_str("timeout"),
            Self::Failed(reason) => f.write_str(reason),
        }
    }
}

// ============================================================================
// TransportState
// ============================================================================

/// State of the underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Handshake in progress.
    Connecting,
    /// Frames can be sent.
    Open,
    /// Closed locally or remotely. Terminal.
    Closed,
}

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the I/O task.
enum SessionCommand {
    /// Write a text frame.
    Send(String),
    /// Close the socket.
    Close,
}

// ============================================================================
// Session
// ============================================================================

/// One WebSocket connection to the bridge.
///
/// Sessions are never reused: a reconnect opens a new session with the next
/// generation. Dropping a session closes it.
pub struct Session {
    /// Generation tag attached to every event.
    generation: SessionGeneration,
    /// Endpoint this session connects to.
    url: Url,
    /// When the session was created.
    created_at: Instant,
    /// Socket state (shared with the I/O task).
    state: Arc<Mutex<TransportState>>,
    /// Channel for sending commands to the I/O task.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation)
            .field("url", &self.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens a session to `url`.
    ///
    /// Returns immediately; the outcome arrives on `events` as
    /// [`SessionEvent::Opened`] or [`SessionEvent::Errored`]. If the
    /// handshake does not complete within `connect_timeout` the attempt is
    /// abandoned and `Errored(SessionError::TimedOut)` is emitted instead.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        generation: SessionGeneration,
        url: Url,
        connect_timeout: Duration,
        events: EventSender,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(TransportState::Connecting));

        tokio::spawn(Self::run_io_loop(
            generation,
            url.clone(),
            connect_timeout,
            Arc::clone(&state),
            command_rx,
            events,
        ));

        debug!(%generation, url = %url, "Session opening");

        Self {
            generation,
            url,
            created_at: Instant::now(),
            state,
            command_tx,
        }
    }

    /// Returns the session's generation.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns when the session was created.
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns the current socket state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> TransportState {
        *self.state.lock()
    }

    /// Returns `true` if frames can be sent.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == TransportState::Open
    }

    /// Queues a text frame for sending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the session is not open. Write
    /// failures after queueing surface as [`SessionEvent::Errored`].
    pub fn send(&self, text: String) -> Result<()> {
        let state = self.state();
        if state != TransportState::Open {
            return Err(Error::transport(format!(
                "session {} is not open ({state:?})",
                self.generation
            )));
        }

        self.command_tx
            .send(SessionCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the session. Closing an already-closed session is a no-op.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if *state == TransportState::Closed {
                return;
            }
            *state = TransportState::Closed;
        }

        let _ = self.command_tx.send(SessionCommand::Close);
        debug!(generation = %self.generation, "Session closed locally");
    }

    /// Marks the session closed. Returns `false` if it already was.
    fn mark_closed(state: &Mutex<TransportState>) -> bool {
        let mut state = state.lock();
        if *state == TransportState::Closed {
            return false;
        }
        *state = TransportState::Closed;
        true
    }

    /// Connects, then runs the read/write loop until the socket ends.
    async fn run_io_loop(
        generation: SessionGeneration,
        url: Url,
        connect_timeout: Duration,
        state: Arc<Mutex<TransportState>>,
        mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        events: EventSender,
    ) {
        let emit = |event: SessionEvent| {
            let _ = events.send((generation, event));
        };

        // Connect phase: the owner may close before the handshake finishes
        let connect = timeout(connect_timeout, connect_async(url.as_str()));
        tokio::pin!(connect);

        let ws_stream = loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok(Ok((ws_stream, _response))) => break ws_stream,
                    Ok(Err(e)) => {
                        if Self::mark_closed(&state) {
                            warn!(%generation, error = %e, "Session connect failed");
                            emit(SessionEvent::Errored(SessionError::Failed(e.to_string())));
                        }
                        return;
                    }
                    Err(_) => {
                        if Self::mark_closed(&state) {
                            let timeout_ms = connect_timeout.as_millis() as u64;
                            warn!(%generation, timeout_ms, "Session connect timed out");
                            emit(SessionEvent::Errored(SessionError::TimedOut { timeout_ms }));
                        }
                        return;
                    }
                },

                command = command_rx.recv() => match command {
                    Some(SessionCommand::Send(_)) => {
                        warn!(%generation, "Dropping frame queued before open");
                    }
                    Some(SessionCommand::Close) | None => {
                        debug!(%generation, "Session closed before open");
                        return;
                    }
                },
            }
        };

        {
            let mut state = state.lock();
            if *state == TransportState::Closed {
                return;
            }
            *state = TransportState::Open;
        }

        info!(%generation, url = %url, "Session open");
        emit(SessionEvent::Opened);

        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the bridge
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(%generation, len = text.len(), "Frame received");
                            emit(SessionEvent::Message(text.as_str().to_owned()));
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            if Self::mark_closed(&state) {
                                debug!(%generation, "Session closed by remote");
                                emit(SessionEvent::Closed);
                            }
                            break;
                        }

                        Some(Err(e)) => {
                            if Self::mark_closed(&state) {
                                warn!(%generation, error = %e, "Session read failed");
                                emit(SessionEvent::Errored(SessionError::Failed(e.to_string())));
                            }
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the owner
                command = command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Send(text)) => {
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                if Self::mark_closed(&state) {
                                    warn!(%generation, error = %e, "Session write failed");
                                    emit(SessionEvent::Errored(SessionError::Failed(e.to_string())));
                                }
                                break;
                            }
                            trace!(%generation, "Frame sent");
                        }

                        Some(SessionCommand::Close) | None => {
                            let _ = ws_write.close().await;
                            Self::mark_closed(&state);
                            break;
                        }
                    }
                }
            }
        }

        debug!(%generation, "Session I/O loop terminated");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
