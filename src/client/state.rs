//! Connection state machine.
//!
//! [`ConnectionState::next`] is the only place transitions are decided.
//! The supervisor feeds it a [`Trigger`] for every transport event and
//! exchange outcome and applies whatever it returns.
//!
//! ```text
//! Idle ──open──► Connecting ──opened──► Open ──probe sent──► Verifying ──ok──► Ready
//!                  ▲    │                 │                     │               │
//!                  │    └─error/timeout───┴──────────┬──────────┘ fail/timeout  │ closed
//!                  │                                 ▼                          ▼
//!                  └──────────── retry ───────────  Failed            Closed ──┘
//!                                                                    (retry → Connecting)
//! ```
//!
//! Any state moves to `Idle` on explicit teardown.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// State of the client's connection to the bridge and device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session and none requested.
    #[default]
    Idle,
    /// A session is being opened.
    Connecting,
    /// The socket is open; the probe is about to be sent.
    Open,
    /// Waiting for the probe response.
    Verifying,
    /// The device answered the probe.
    Ready,
    /// A ready session was lost; a retry is scheduled.
    Closed,
    /// An attempt failed before reaching `Ready`; a retry is scheduled.
    Failed,
}

impl ConnectionState {
    /// Returns the state that `trigger` leads to, or `None` if the trigger
    /// does not apply in this state.
    #[must_use]
    pub fn next(self, trigger: Trigger) -> Option<Self> {
        use ConnectionState::*;
        use Trigger::*;

        match (self, trigger) {
            (_, Teardown) => Some(Idle),

            (Idle | Failed | Closed, OpenRequested) => Some(Connecting),
            (Failed | Closed, RetryElapsed) => Some(Connecting),

            (Connecting, TransportOpened) => Some(Open),
            (Open, ProbeIssued) => Some(Verifying),
            (Verifying, ProbeSucceeded) => Some(Ready),

            (Connecting | Open | Verifying, TransportFailed | TransportClosed) => Some(Failed),
            (Verifying, ProbeFailed) => Some(Failed),

            (Ready, TransportClosed | TransportFailed) => Some(Closed),

            _ => None,
        }
    }

    /// Returns `true` while an attempt is in flight.
    #[inline]
    #[must_use]
    pub fn is_attempting(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Verifying)
    }

    /// Returns `true` while waiting for the reconnect delay.
    #[inline]
    #[must_use]
    pub fn is_awaiting_retry(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    /// Returns `true` if application requests may be issued.
    #[inline]
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Trigger
// ============================================================================

/// Inputs that drive [`ConnectionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The caller asked for a session.
    OpenRequested,
    /// The reconnect delay elapsed.
    RetryElapsed,
    /// The transport reached `Open`.
    TransportOpened,
    /// The verification probe was sent.
    ProbeIssued,
    /// The device answered the probe.
    ProbeSucceeded,
    /// The probe was answered negatively or timed out.
    ProbeFailed,
    /// The transport timed out or errored.
    TransportFailed,
    /// The transport closed.
    TransportClosed,
    /// Explicit teardown.
    Teardown,
}

// ============================================================================
// Tests
// ============================================================================
