//! Endpoint and retry policy configuration.
//!
//! Two well-known local bridges exist, one per role:
//!
//! | Role | Endpoint | Uploads |
//! |------|----------|---------|
//! | [`Role::Transmit`] | `ws://127.0.0.1:8765` | yes |
//! | [`Role::Receive`] | `ws://127.0.0.1:8766` | no |
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use bridge_client::{Endpoint, RetryPolicy};
//!
//! let endpoint = Endpoint::receive();
//! let policy = RetryPolicy::default().with_reconnect_delay(Duration::from_secs(1));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Port of the transmit-role bridge.
pub const TRANSMIT_PORT: u16 = 8765;

/// Port of the receive-role bridge.
pub const RECEIVE_PORT: u16 = 8766;

/// Host both local bridges listen on.
const LOCAL_HOST: &str = "127.0.0.1";

// ============================================================================
// Role
// ============================================================================

/// Which bridge the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Pushes files to the device.
    #[default]
    Transmit,
    /// Listens for data from the device.
    Receive,
}

impl Role {
    /// Returns `true` if file uploads may be sent in this role.
    #[inline]
    #[must_use]
    pub const fn accepts_uploads(self) -> bool {
        matches!(self, Self::Transmit)
    }

    /// Returns the well-known local port for this role.
    #[inline]
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Transmit => TRANSMIT_PORT,
            Self::Receive => RECEIVE_PORT,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transmit => f.write_str("transmit"),
            Self::Receive => f.write_str("receive"),
        }
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Bridge address plus the role it plays.
///
/// The URL is validated when the client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// WebSocket URL.
    url: String,
    /// Role of the bridge at this URL.
    role: Role,
}

impl Endpoint {
    /// Creates an endpoint for an arbitrary URL.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>, role: Role) -> Self {
        Self {
            url: url.into(),
            role,
        }
    }

    /// The local bridge for `role` on its well-known port.
    #[must_use]
    pub fn local(role: Role) -> Self {
        Self::new(format!("ws://{LOCAL_HOST}:{}", role.default_port()), role)
    }

    /// The local transmit bridge (`ws://127.0.0.1:8765`).
    #[inline]
    #[must_use]
    pub fn transmit() -> Self {
        Self::local(Role::Transmit)
    }

    /// The local receive bridge (`ws://127.0.0.1:8766`).
    #[inline]
    #[must_use]
    pub fn receive() -> Self {
        Self::local(Role::Receive)
    }

    /// Returns the URL as given.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the role.
    #[inline]
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Parses and checks the URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL does not parse, is not `ws`/`wss`,
    /// or has no host.
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.url)
            .map_err(|e| Error::config(format!("invalid endpoint URL {:?}: {e}", self.url)))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "endpoint URL must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::config("endpoint URL has no host"));
        }

        Ok(url)
    }
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Timing parameters of the connection lifecycle.
///
/// Fixed for the lifetime of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How long the transport may take to open.
    pub connect_timeout: Duration,
    /// Period of the liveness probe while ready.
    pub probe_interval: Duration,
    /// How long a probe may wait for `connection_status`.
    pub probe_timeout: Duration,
    /// Delay before reopening after a failure or loss.
    pub reconnect_delay: Duration,
    /// How long an upload or raw request may wait for its response.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            probe_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }

    /// Sets the liveness probe interval.
    #[inline]
    #[must_use]
    pub fn with_probe_interval(mut self, value: Duration) -> Self {
        self.probe_interval = value;
        self
    }

    /// Sets the probe timeout.
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, value: Duration) -> Self {
        self.probe_timeout = value;
        self
    }

    /// Sets the reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, value: Duration) -> Self {
        self.reconnect_delay = value;
        self
    }

    /// Sets the application request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, value: Duration) -> Self {
        self.request_timeout = value;
        self
    }

    /// Checks that every duration is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first zero duration.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("connect_timeout", self.connect_timeout),
            ("probe_interval", self.probe_interval),
            ("probe_timeout", self.probe_timeout),
            ("reconnect_delay", self.reconnect_delay),
            ("request_timeout", self.request_timeout),
        ];

        match fields.iter().find(|(_, value)| value.is_zero()) {
            Some((name, _)) => Err(Error::config(format!("{name} must be non-zero"))),
            None => Ok(()),
        }
    }
}

// ============================================================================
// ClientConfig
// ============================================================================

/// Validated, immutable client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Parsed endpoint URL.
    pub url: Url,
    /// Role of the bridge.
    pub role: Role,
    /// Timing parameters.
    pub policy: RetryPolicy,
}

// ============================================================================
// Tests
// ============================================================================
