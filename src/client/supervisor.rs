//! Reconnection supervisor.
//!
//! One spawned task owns every piece of mutable client state: the
//! [`ConnectionState`], the current [`Session`], the [`Exchange`] of pending
//! requests and the [`LivenessMonitor`]. Handles talk to it over a command
//! channel; sessions report to it over an event channel. Nothing else
//! mutates state, so a superseded session can never be probed or resolve a
//! request.
//!
//! # Event Loop
//!
//! ```text
//!              ┌──────────── commands (connect, check, upload, raw, shutdown)
//!              │  ┌───────── session events (generation-tagged)
//!              ▼  ▼
//!        ┌──────────────┐ ◄── liveness tick
//!        │  Supervisor  │ ◄── reconnect timer
//!        └──────────────┘ ◄── earliest request deadline
//!              │
//!              ▼
//!          Observer
//! ```
//!
//! Failed attempts are retried after a fixed delay, forever.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionGeneration;
use crate::protocol::{ConnectionStatus, Inbound, Outbound};
use crate::transport::{EventReceiver, EventSender, Session, SessionError, SessionEvent};

use super::config::ClientConfig;
use super::exchange::{Admission, Exchange, Reply, RequestKind, UploadReceipt, Waiter};
use super::monitor::LivenessMonitor;
use super::observer::Observer;
use super::state::{ConnectionState, Trigger};
use super::status::{ClientStatus, DeviceStatus};

// ============================================================================
// Constants
// ============================================================================

const STATUS_CONNECTING: &str = "Connecting to device...";
const STATUS_UPLOADED: &str = "File sent to device";
const STATUS_DISCONNECTED: &str = "Disconnected";
const DATA_RECEIVED: &str = "New data received";
const TRANSFER_CANCELLED: &str = "Transfer cancelled";
const TRANSFER_TIMED_OUT: &str = "Transfer timed out";

// ============================================================================
// Command
// ============================================================================

/// Requests from [`BridgeClient`](super::BridgeClient) handles.
#[derive(Debug)]
pub(crate) enum Command {
    /// Open a session (or re-probe if ready).
    Connect,
    /// Probe the device, opening a session first if needed.
    CheckConnection {
        /// Caller's reply channel.
        reply: Waiter,
    },
    /// Send an application frame and await its response.
    Request {
        /// Upload or raw.
        kind: RequestKind,
        /// Serialized `raw` envelope.
        frame: String,
        /// Caller's reply channel.
        reply: Waiter,
    },
    /// Tear everything down and stop.
    Shutdown {
        /// Signalled once teardown completed.
        done: oneshot::Sender<()>,
    },
}

// ============================================================================
// Failure
// ============================================================================

/// Why a session or attempt was lost.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    /// The transport did not open in time.
    ConnectTimeout { timeout_ms: u64 },
    /// The transport failed to open or errored.
    Transport(String),
    /// The transport closed.
    Closed,
    /// The probe got no answer in time.
    ProbeTimeout { timeout_ms: u64 },
    /// The bridge reported the device unreachable.
    Unreachable(String),
}

impl Failure {
    /// Trigger applied to a state that is not `Ready`.
    fn trigger(&self) -> Trigger {
        match self {
            Self::ConnectTimeout { .. } | Self::Transport(_) => Trigger::TransportFailed,
            Self::Closed => Trigger::TransportClosed,
            Self::ProbeTimeout { .. } | Self::Unreachable(_) => Trigger::ProbeFailed,
        }
    }

    /// Error handed to probe callers.
    fn error(&self) -> Error {
        match self {
            Self::ConnectTimeout { timeout_ms } => Error::connection_timeout(*timeout_ms),
            Self::Transport(message) => Error::transport(message.clone()),
            Self::Closed => Error::ConnectionClosed,
            Self::ProbeTimeout { timeout_ms } => Error::timeout("check_connection", *timeout_ms),
            Self::Unreachable(reason) => Error::device_unreachable(reason.clone()),
        }
    }

    fn status_text(&self) -> &str {
        match self {
            Self::ConnectTimeout { .. } => "Connection timeout",
            Self::Transport(_) => "Connection failed",
            Self::Closed => "Connection lost",
            Self::ProbeTimeout { .. } => "Device check timed out",
            Self::Unreachable(reason) => reason,
        }
    }

    fn indicator_label(&self) -> &str {
        match self {
            Self::ConnectTimeout { .. } => "Connection failed",
            _ => self.status_text(),
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Owner of the connection lifecycle.
pub(crate) struct Supervisor {
    config: ClientConfig,
    observer: Arc<dyn Observer>,
    state: ConnectionState,
    /// Generation of the current (or last) session.
    generation: SessionGeneration,
    session: Option<Session>,
    exchange: Exchange,
    monitor: LivenessMonitor,
    /// When the next attempt starts, if one is scheduled.
    retry_at: Option<Instant>,
    /// Consecutive failed attempts since the last `Ready`.
    failures: u32,
    /// Last emitted device indicator.
    indicator: Option<(bool, String)>,
    device: DeviceStatus,
    events_tx: EventSender,
    status_tx: watch::Sender<ClientStatus>,
}

impl Supervisor {
    /// Creates an idle supervisor.
    pub fn new(
        config: ClientConfig,
        observer: Arc<dyn Observer>,
        events_tx: EventSender,
        status_tx: watch::Sender<ClientStatus>,
    ) -> Self {
        let monitor = LivenessMonitor::new(config.policy.probe_interval);

        Self {
            config,
            observer,
            state: ConnectionState::Idle,
            generation: SessionGeneration::NONE,
            session: None,
            exchange: Exchange::new(),
            monitor,
            retry_at: None,
            failures: 0,
            indicator: None,
            device: DeviceStatus::default(),
            events_tx,
            status_tx,
        }
    }

    /// Spawns the supervisor task.
    ///
    /// Returns the command channel and the status feed. The task ends on
    /// [`Command::Shutdown`] or when every command sender is dropped.
    pub fn spawn(
        config: ClientConfig,
        observer: Arc<dyn Observer>,
    ) -> (mpsc::UnboundedSender<Command>, watch::Receiver<ClientStatus>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ClientStatus::default());

        let supervisor = Self::new(config, observer, events_tx, status_tx);
        tokio::spawn(supervisor.run(command_rx, events_rx));

        (command_tx, status_rx)
    }

    /// Runs the event loop.
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, mut events: EventReceiver) {
        debug!(url = %self.config.url, role = %self.config.role, "Supervisor started");

        loop {
            let retry_at = self.retry_at;
            let deadline = self.exchange.next_deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Some(done) = self.on_command(command) {
                            Self::refuse_queued(&mut commands);
                            let _ = done.send(());
                            break;
                        }
                    }
                    None => {
                        debug!("All client handles dropped");
                        self.teardown();
                        break;
                    }
                },

                Some((generation, event)) = events.recv() => {
                    self.on_session_event(generation, event);
                }

                () = self.monitor.tick() => self.on_liveness_tick(),

                () = sleep_until_opt(retry_at) => {
                    self.retry_at = None;
                    self.attempt_reconnect();
                }

                () = sleep_until_opt(deadline) => self.on_deadlines(),
            }
        }

        debug!("Supervisor terminated");
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Closes the command channel and answers everything still queued with
    /// [`Error::Shutdown`].
    fn refuse_queued(commands: &mut mpsc::UnboundedReceiver<Command>) {
        commands.close();

        let mut refused = 0usize;
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Connect => {}
                Command::CheckConnection { reply } | Command::Request { reply, .. } => {
                    let _ = reply.send(Err(Error::Shutdown));
                }
                Command::Shutdown { done } => {
                    let _ = done.send(());
                }
            }
            refused += 1;
        }

        if refused > 0 {
            debug!(refused, "Refused commands queued behind shutdown");
        }
    }

    /// Handles one command. Returns the acknowledgement channel once the
    /// supervisor has been torn down.
    fn on_command(&mut self, command: Command) -> Option<oneshot::Sender<()>> {
        match command {
            Command::Connect => self.request_open(),
            Command::CheckConnection { reply } => self.check_connection(reply),
            Command::Request { kind, frame, reply } => self.begin_request(kind, frame, reply),
            Command::Shutdown { done } => {
                self.teardown();
                return Some(done);
            }
        }
        None
    }

    /// Opens a session unless one is already opening or open. A ready
    /// session is re-probed instead.
    fn request_open(&mut self) {
        match self.state {
            ConnectionState::Idle | ConnectionState::Failed | ConnectionState::Closed => {
                if self.transition(Trigger::OpenRequested) {
                    self.open_session();
                }
            }
            ConnectionState::Ready => self.issue_probe(None),
            state => trace!(?state, "Open already in progress"),
        }
    }

    fn check_connection(&mut self, reply: Waiter) {
        match self.state {
            ConnectionState::Idle | ConnectionState::Failed | ConnectionState::Closed => {
                self.exchange.park(reply);
                self.request_open();
            }
            ConnectionState::Connecting => self.exchange.park(reply),
            ConnectionState::Open | ConnectionState::Verifying | ConnectionState::Ready => {
                self.issue_probe(Some(reply));
            }
        }
    }

    fn begin_request(&mut self, kind: RequestKind, frame: String, reply: Waiter) {
        if !self.state.is_ready() {
            let _ = reply.send(Err(Error::not_ready(self.state)));
            return;
        }

        let deadline = Instant::now() + self.config.policy.request_timeout;
        match self.exchange.begin(kind, self.generation, deadline, Some(reply)) {
            Admission::Issued => {
                debug!(%kind, generation = %self.generation, len = frame.len(), "Sending request");
                if let Err(e) = self.send_frame(frame) {
                    warn!(%kind, error = %e, "Request send failed");
                    let message = e.to_string();
                    self.exchange.reject(kind, || Error::transport(message.clone()));
                    if kind == RequestKind::Upload {
                        self.observer.transfer_completed(false, &message);
                    }
                }
            }
            Admission::Rejected { waiter, busy } => {
                debug!(%kind, %busy, "Request rejected, another is in flight");
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Err(Error::request_in_flight(busy)));
                }
            }
            Admission::Joined => {}
        }
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Starts a fresh session with the next generation.
    fn open_session(&mut self) {
        self.retry_at = None;
        self.monitor.stop();
        if let Some(previous) = self.session.take() {
            previous.close();
        }

        self.generation = self.generation.next();
        info!(
            generation = %self.generation,
            url = %self.config.url,
            failures = self.failures,
            "Opening session"
        );

        self.session = Some(Session::open(
            self.generation,
            self.config.url.clone(),
            self.config.policy.connect_timeout,
            self.events_tx.clone(),
        ));

        self.publish();
        self.observer.connection_status_changed(STATUS_CONNECTING, false);
    }

    /// Retry path out of `Failed`/`Closed`.
    fn attempt_reconnect(&mut self) {
        self.retry_at = None;
        if self.transition(Trigger::RetryElapsed) {
            self.open_session();
        }
    }

    fn on_session_event(&mut self, generation: SessionGeneration, event: SessionEvent) {
        if generation != self.generation || self.session.is_none() {
            trace!(%generation, current = %self.generation, ?event, "Discarding event from superseded session");
            return;
        }

        match event {
            SessionEvent::Opened => {
                if self.transition(Trigger::TransportOpened) {
                    self.issue_probe(None);
                }
            }
            SessionEvent::Message(text) => self.on_frame(&text),
            SessionEvent::Closed => self.lose_session(Failure::Closed),
            SessionEvent::Errored(SessionError::TimedOut { timeout_ms }) => {
                self.lose_session(Failure::ConnectTimeout { timeout_ms });
            }
            SessionEvent::Errored(SessionError::Failed(message)) => {
                self.lose_session(Failure::Transport(message));
            }
        }
    }

    /// Discards the session after `failure` and schedules a retry.
    fn lose_session(&mut self, failure: Failure) {
        // Ready sessions always fall back through Closed
        let trigger = if self.state.is_ready() {
            Trigger::TransportClosed
        } else {
            failure.trigger()
        };

        if !self.transition(trigger) {
            trace!(state = ?self.state, ?failure, "Failure ignored");
            return;
        }

        self.monitor.stop();
        if let Some(session) = self.session.take() {
            session.close();
        }

        if let Failure::Unreachable(reason) = &failure {
            self.device = DeviceStatus::unreachable(Some(reason.clone()));
        }

        self.failures = self.failures.saturating_add(1);
        let delay = self.config.policy.reconnect_delay;
        self.retry_at = Some(Instant::now() + delay);
        self.publish();

        warn!(
            generation = %self.generation,
            state = ?self.state,
            reason = failure.status_text(),
            failures = self.failures,
            retry_in_ms = delay.as_millis() as u64,
            "Session lost, retry scheduled"
        );

        self.exchange.reject(RequestKind::Probe, || failure.error());
        self.exchange.reject_parked(|| failure.error());
        let cancelled = self.exchange.cancel_all();

        self.observer.connection_status_changed(failure.status_text(), true);
        self.set_indicator(false, failure.indicator_label());
        if cancelled.contains(&RequestKind::Upload) {
            self.observer.transfer_completed(false, TRANSFER_CANCELLED);
        }
    }

    /// Explicit teardown. Terminal.
    fn teardown(&mut self) {
        debug!(
            state = ?self.state,
            pending = self.exchange.pending_count(),
            parked = self.exchange.parked_count(),
            monitor = self.monitor.is_running(),
            "Tearing down"
        );

        self.monitor.stop();
        self.retry_at = None;
        if let Some(session) = self.session.take() {
            session.close();
        }

        let cancelled = self.exchange.cancel_all();
        self.transition(Trigger::Teardown);

        info!(generation = %self.generation, "Client shut down");

        self.observer.connection_status_changed(STATUS_DISCONNECTED, false);
        self.set_indicator(false, STATUS_DISCONNECTED);
        if cancelled.contains(&RequestKind::Upload) {
            self.observer.transfer_completed(false, TRANSFER_CANCELLED);
        }
    }

    // ------------------------------------------------------------------------
    // Probing
    // ------------------------------------------------------------------------

    /// Sends a probe, or joins the outstanding one.
    fn issue_probe(&mut self, waiter: Option<Waiter>) {
        let deadline = Instant::now() + self.config.policy.probe_timeout;

        match self.exchange.begin(RequestKind::Probe, self.generation, deadline, waiter) {
            Admission::Issued => {}
            Admission::Joined => {
                trace!(generation = %self.generation, "Joined outstanding probe");
                return;
            }
            Admission::Rejected { waiter, busy } => {
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Err(Error::request_in_flight(busy)));
                }
                return;
            }
        }

        let sent = Outbound::CheckConnection
            .to_json()
            .and_then(|frame| self.send_frame(frame));

        match sent {
            Ok(()) => {
                trace!(generation = %self.generation, "Probe sent");
                if self.state == ConnectionState::Open {
                    self.transition(Trigger::ProbeIssued);
                }
            }
            Err(e) => {
                warn!(generation = %self.generation, error = %e, "Probe send failed");
                self.lose_session(Failure::Transport(e.to_string()));
            }
        }
    }

    /// Liveness tick: probe if the session is alive, reconnect if it died.
    fn on_liveness_tick(&mut self) {
        if !self.state.is_ready() {
            self.monitor.stop();
            return;
        }

        if self.session.as_ref().is_some_and(Session::is_open) {
            self.issue_probe(None);
        } else {
            info!(generation = %self.generation, "Session died between probes");
            self.lose_session(Failure::Closed);
            self.attempt_reconnect();
        }
    }

    /// Expires overdue requests. A probe timeout loses the session, which
    /// cancels whatever else was pending, so later kinds may already be gone.
    fn on_deadlines(&mut self) {
        for kind in self.exchange.expired(Instant::now()) {
            match kind {
                RequestKind::Probe => {
                    let timeout_ms = self.config.policy.probe_timeout.as_millis() as u64;
                    if self
                        .exchange
                        .reject(kind, || Error::timeout(kind.operation(), timeout_ms))
                    {
                        warn!(generation = %self.generation, timeout_ms, "Probe timed out");
                        self.lose_session(Failure::ProbeTimeout { timeout_ms });
                    }
                }
                RequestKind::Upload | RequestKind::Raw => {
                    let timeout_ms = self.config.policy.request_timeout.as_millis() as u64;
                    if !self
                        .exchange
                        .reject(kind, || Error::timeout(kind.operation(), timeout_ms))
                    {
                        trace!(%kind, "Expired request already resolved");
                        continue;
                    }

                    warn!(%kind, timeout_ms, "Request timed out");
                    if kind == RequestKind::Upload {
                        self.observer.transfer_completed(false, TRANSFER_TIMED_OUT);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Inbound frames
    // ------------------------------------------------------------------------

    fn on_frame(&mut self, text: &str) {
        let inbound = match Inbound::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(generation = %self.generation, error = %e, "Discarding malformed frame");
                return;
            }
        };

        trace!(generation = %self.generation, kind = inbound.kind(), "Frame received");

        match inbound {
            Inbound::ConnectionStatus(status) => self.on_connection_status(status),

            Inbound::UploadSuccess { filename, size } => {
                let receipt = UploadReceipt {
                    filename: filename.unwrap_or_default(),
                    size: size.unwrap_or_default(),
                };
                if self
                    .exchange
                    .resolve(RequestKind::Upload, self.generation, Reply::Uploaded(receipt.clone()))
                {
                    info!(filename = %receipt.filename, size = receipt.size, "Upload confirmed");
                    self.observer.connection_status_changed(STATUS_UPLOADED, false);
                    self.observer.transfer_completed(true, STATUS_UPLOADED);
                } else {
                    debug!("Unsolicited upload_success");
                }
            }

            Inbound::Error { message } => self.on_bridge_error(message),

            Inbound::Ack { len } => {
                if !self
                    .exchange
                    .resolve(RequestKind::Raw, self.generation, Reply::Acknowledged { len })
                {
                    debug!(?len, "Unsolicited ack");
                    self.observer.notification("Bridge acknowledged data");
                }
            }

            Inbound::DataReceived { .. } => self.observer.notification(DATA_RECEIVED),

            Inbound::Unknown { kind } => {
                debug!(%kind, "Unhandled frame type");
                self.observer.notification(&format!("Unhandled message: {kind}"));
            }
        }
    }

    fn on_connection_status(&mut self, status: ConnectionStatus) {
        if !status.connected {
            let device = DeviceStatus::unreachable(status.reason);
            let reason = device.label();
            info!(generation = %self.generation, %reason, "Device unreachable");
            self.lose_session(Failure::Unreachable(reason));
            return;
        }

        let device = DeviceStatus::reachable(status.port);
        let label = device.label();
        self.device = device.clone();

        let entered_ready = self.transition(Trigger::ProbeSucceeded);
        if entered_ready {
            info!(generation = %self.generation, device = %label, "Device ready");
            self.failures = 0;
            self.monitor.start();
        } else {
            self.publish();
        }

        self.exchange
            .resolve(RequestKind::Probe, self.generation, Reply::Device(device));

        if entered_ready {
            self.observer.connection_status_changed(&label, false);
        }
        self.set_indicator(true, &label);
    }

    /// `error` frames reject the outstanding upload or raw request.
    fn on_bridge_error(&mut self, message: String) {
        let target = [RequestKind::Upload, RequestKind::Raw]
            .into_iter()
            .find(|kind| self.exchange.is_pending(*kind));

        warn!(%message, request = ?target, "Bridge reported error");
        self.observer.connection_status_changed(&message, true);

        if let Some(kind) = target {
            self.exchange
                .reject(kind, || Error::transfer_rejected(message.clone()));
            if kind == RequestKind::Upload {
                self.observer.transfer_completed(false, &message);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn send_frame(&self, frame: String) -> Result<()> {
        match &self.session {
            Some(session) => session.send(frame),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Applies `trigger`. Returns `false` if it does not apply.
    fn transition(&mut self, trigger: Trigger) -> bool {
        match self.state.next(trigger) {
            Some(next) => {
                debug!(
                    generation = %self.generation,
                    from = ?self.state,
                    to = ?next,
                    ?trigger,
                    "State transition"
                );
                self.state = next;
                self.publish();
                true
            }
            None => {
                trace!(state = ?self.state, ?trigger, "Trigger ignored");
                false
            }
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(ClientStatus {
            state: self.state,
            generation: self.generation,
            device: self.device.clone(),
        });
    }

    /// Emits the indicator only when it changes.
    fn set_indicator(&mut self, connected: bool, label: &str) {
        if self
            .indicator
            .as_ref()
            .is_some_and(|(c, l)| *c == connected && l == label)
        {
            return;
        }

        self.observer.device_indicator_changed(connected, label);
        self.indicator = Some((connected, label.to_string()));
    }
}

/// Sleeps until `deadline`, or forever if there is none.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
