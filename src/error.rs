//! Error types for the bridge client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use bridge_client::{BridgeClient, Result};
//!
//! async fn example(client: &BridgeClient) -> Result<()> {
//!     let device = client.check_connection().await?;
//!     println!("{}", device.label());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Transport | [`Error::Transport`], [`Error::ConnectionClosed`] |
//! | Timeout | [`Error::ConnectionTimeout`], [`Error::Timeout`] |
//! | Device | [`Error::DeviceUnreachable`] |
//! | Protocol | [`Error::Protocol`] |
//! | Transfer | [`Error::TransferRejected`] |
//! | Lifecycle | [`Error::NotReady`], [`Error::RequestInFlight`], [`Error::Cancelled`], [`Error::Shutdown`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::client::{ConnectionState, RequestKind};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the client builder is given an invalid endpoint or policy.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to an operation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Socket could not be created, opened or written.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// WebSocket connection closed.
    ///
    /// Returned when the session is lost while a request is outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Timeout Errors
    // ========================================================================
    /// The transport did not open within the connect timeout.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// A request received no correlated response before its deadline.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The bridge answered the probe with `connected: false`.
    #[error("Device unreachable: {reason}")]
    DeviceUnreachable {
        /// Reason reported by the bridge.
        reason: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed or unparseable frame.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Transfer Errors
    // ========================================================================
    /// The bridge answered an application request with `{type: "error"}`.
    ///
    /// Never retried automatically.
    #[error("Transfer rejected: {message}")]
    TransferRejected {
        /// Message reported by the bridge.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Application requests are only issued while the client is `Ready`.
    #[error("Client not ready (state: {state})")]
    NotReady {
        /// State at the time of the request.
        state: ConnectionState,
    },

    /// Another request of a conflicting kind is already outstanding.
    #[error("Request already in flight: {kind}")]
    RequestInFlight {
        /// Kind of the outstanding request.
        kind: RequestKind,
    },

    /// The request was cancelled because its session was closed or the
    /// client was torn down.
    #[error("Request cancelled")]
    Cancelled,

    /// The client has been shut down.
    #[error("Client has been shut down")]
    Shutdown,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a device unreachable error.
    #[inline]
    pub fn device_unreachable(reason: impl Into<String>) -> Self {
        Self::DeviceUnreachable {
            reason: reason.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a transfer rejected error.
    #[inline]
    pub fn transfer_rejected(message: impl Into<String>) -> Self {
        Self::TransferRejected {
            message: message.into(),
        }
    }

    /// Creates a not ready error.
    #[inline]
    pub fn not_ready(state: ConnectionState) -> Self {
        Self::NotReady { state }
    }

    /// Creates a request in flight error.
    #[inline]
    pub fn request_in_flight(kind: RequestKind) -> Self {
        Self::RequestInFlight { kind }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the supervisor recovers from this error on its own.
    ///
    /// Transport, timeout and unreachable failures are retried after the
    /// reconnect delay. Transfer rejections are not.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::ConnectionClosed
                | Self::ConnectionTimeout { .. }
                | Self::Timeout { .. }
                | Self::DeviceUnreachable { .. }
        )
    }

    /// Short operator-facing reason.
    ///
    /// Timeouts all read `"timeout"`, unreachable devices carry the bridge's
    /// reason verbatim, everything else falls back to the display text.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::ConnectionTimeout { .. } | Self::Timeout { .. } => "timeout".to_string(),
            Self::DeviceUnreachable { reason } => reason.clone(),
            Self::TransferRejected { message } => message.clone(),
            Self::Cancelled => "cancelled".to_string(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
