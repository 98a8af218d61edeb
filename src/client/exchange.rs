//! Request/response correlation.
//!
//! The wire protocol has no request IDs, so correlation is by kind: at most
//! one request of each kind is outstanding and it is resolved by the next
//! inbound frame of the matching `type`.
//!
//! | Kind | Sent as | Resolved by | Rejected by |
//! |------|---------|-------------|-------------|
//! | [`RequestKind::Probe`] | `check_connection` | `connection_status` (connected) | `connection_status` (not connected), deadline |
//! | [`RequestKind::Upload`] | `raw` + `file_upload` | `upload_success` | `error`, deadline |
//! | [`RequestKind::Raw`] | `raw` | `ack` | `error`, deadline |
//!
//! Upload and raw requests share the `error` response, so only one of them
//! may be outstanding at a time. Probe callers that arrive while a probe is
//! outstanding join it instead of issuing a second one.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionGeneration;

use super::status::DeviceStatus;

// ============================================================================
// RequestKind
// ============================================================================

/// Kind of an outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestKind {
    /// `check_connection` probe.
    Probe,
    /// File upload in a raw envelope.
    Upload,
    /// Arbitrary application message in a raw envelope.
    Raw,
}

impl RequestKind {
    /// Returns `true` for kinds carried in the `raw` envelope.
    #[inline]
    #[must_use]
    pub const fn is_application(self) -> bool {
        !matches!(self, Self::Probe)
    }

    /// Operation name used in timeout errors.
    #[inline]
    #[must_use]
    pub const fn operation(self) -> &'static str {
        match self {
            Self::Probe => "check_connection",
            Self::Upload => "file_upload",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe => f.write_str("probe"),
            Self::Upload => f.write_str("upload"),
            Self::Raw => f.write_str("raw"),
        }
    }
}

// ============================================================================
// Reply
// ============================================================================

/// Successful outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The device answered the probe.
    Device(DeviceStatus),
    /// The bridge accepted an upload.
    Uploaded(UploadReceipt),
    /// The bridge acknowledged a raw envelope.
    Acknowledged {
        /// Bytes written, if reported.
        len: Option<u64>,
    },
}

/// Confirmation of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// File name as confirmed by the bridge (or as sent).
    pub filename: String,
    /// Size as confirmed by the bridge (or as sent).
    pub size: u64,
}

// ============================================================================
// Types
// ============================================================================

/// Reply channel of one caller.
pub(crate) type Waiter = oneshot::Sender<Result<Reply>>;

/// One outstanding request.
#[derive(Debug)]
struct PendingRequest {
    /// Session the request was sent on.
    generation: SessionGeneration,
    /// When the request times out.
    deadline: Instant,
    /// Callers waiting for the outcome. Empty for internal probes.
    waiters: Vec<Waiter>,
}

/// Result of [`Exchange::begin`].
#[derive(Debug)]
pub(crate) enum Admission {
    /// A new request was registered; the caller must send its frame.
    Issued,
    /// An identical probe is already outstanding; the caller joined it.
    Joined,
    /// A conflicting request is outstanding.
    Rejected {
        /// The caller's waiter, handed back for an immediate error reply.
        waiter: Option<Waiter>,
        /// Kind of the outstanding request.
        busy: RequestKind,
    },
}

// ============================================================================
// Exchange
// ============================================================================

/// Table of outstanding requests, owned by the supervisor.
#[derive(Debug, Default)]
pub(crate) struct Exchange {
    /// Outstanding requests by kind.
    pending: FxHashMap<RequestKind, PendingRequest>,
    /// Probe callers waiting for a session to open.
    parked: Vec<Waiter>,
}

impl Exchange {
    /// Creates an empty exchange.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request.
    ///
    /// Probes join an outstanding probe, so repeated checks never create a
    /// second deadline. A new probe also picks up every parked caller.
    pub fn begin(
        &mut self,
        kind: RequestKind,
        generation: SessionGeneration,
        deadline: Instant,
        waiter: Option<Waiter>,
    ) -> Admission {
        if let Some(existing) = self.pending.get_mut(&kind) {
            if kind == RequestKind::Probe {
                existing.waiters.extend(waiter);
                return Admission::Joined;
            }
            return Admission::Rejected { waiter, busy: kind };
        }

        if kind.is_application()
            && let Some(busy) = self.pending.keys().copied().find(|k| k.is_application())
        {
            return Admission::Rejected { waiter, busy };
        }

        let mut waiters: Vec<Waiter> = waiter.into_iter().collect();
        if kind == RequestKind::Probe {
            waiters.append(&mut self.parked);
        }

        self.pending.insert(
            kind,
            PendingRequest {
                generation,
                deadline,
                waiters,
            },
        );

        debug!(%kind, %generation, "Request registered");
        Admission::Issued
    }

    /// Parks a probe caller until the next probe is issued.
    pub fn park(&mut self, waiter: Waiter) {
        self.parked.push(waiter);
    }

    /// Returns `true` if a request of `kind` is outstanding.
    #[inline]
    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.pending.contains_key(&kind)
    }

    /// Returns the number of outstanding requests.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns the number of parked probe callers.
    #[inline]
    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Resolves the outstanding request of `kind` with `reply`.
    ///
    /// Returns `false` if nothing of that kind is outstanding on `generation`.
    pub fn resolve(&mut self, kind: RequestKind, generation: SessionGeneration, reply: Reply) -> bool {
        let Some(pending) = self.take(kind, generation) else {
            return false;
        };

        for waiter in pending.waiters {
            let _ = waiter.send(Ok(reply.clone()));
        }
        true
    }

    /// Rejects the outstanding request of `kind`, building one error per
    /// caller.
    ///
    /// Returns `false` if nothing of that kind is outstanding.
    pub fn reject(&mut self, kind: RequestKind, make_error: impl Fn() -> Error) -> bool {
        let Some(pending) = self.pending.remove(&kind) else {
            return false;
        };

        for waiter in pending.waiters {
            let _ = waiter.send(Err(make_error()));
        }
        true
    }

    /// Rejects every parked probe caller.
    pub fn reject_parked(&mut self, make_error: impl Fn() -> Error) {
        for waiter in self.parked.drain(..) {
            let _ = waiter.send(Err(make_error()));
        }
    }

    /// Rejects everything with [`Error::Cancelled`].
    ///
    /// Returns the kinds that were outstanding.
    pub fn cancel_all(&mut self) -> Vec<RequestKind> {
        let mut kinds: Vec<RequestKind> = self.pending.keys().copied().collect();
        kinds.sort();

        for kind in &kinds {
            self.reject(*kind, || Error::Cancelled);
        }
        self.reject_parked(|| Error::Cancelled);

        if !kinds.is_empty() {
            debug!(count = kinds.len(), "Cancelled pending requests");
        }
        kinds
    }

    /// Returns the earliest deadline of any outstanding request.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Returns the kinds whose deadline has passed at `now`.
    pub fn expired(&self, now: Instant) -> Vec<RequestKind> {
        let mut kinds: Vec<RequestKind> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(kind, _)| *kind)
            .collect();
        kinds.sort();
        kinds
    }

    /// Removes the request of `kind` if it belongs to `generation`.
    fn take(&mut self, kind: RequestKind, generation: SessionGeneration) -> Option<PendingRequest> {
        match self.pending.get(&kind) {
            Some(pending) if pending.generation == generation => self.pending.remove(&kind),
            Some(pending) => {
                warn!(
                    %kind,
                    expected = %pending.generation,
                    got = %generation,
                    "Ignoring response from superseded session"
                );
                None
            }
            None => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
