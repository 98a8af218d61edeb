//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and spawning [`BridgeClient`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use bridge_client::{BridgeClient, ClientEvent};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> bridge_client::Result<()> {
//! let (events, _rx) = mpsc::unbounded_channel::<ClientEvent>();
//!
//! let client = BridgeClient::builder()
//!     .transmit()
//!     .reconnect_delay(Duration::from_secs(3))
//!     .spawn(events)?;
//!
//! client.connect()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

use super::config::{ClientConfig, Endpoint, RetryPolicy, Role};
use super::core::BridgeClient;
use super::observer::Observer;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`BridgeClient`].
///
/// Use [`BridgeClient::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    /// Bridge endpoint.
    endpoint: Option<Endpoint>,
    /// Timing parameters.
    policy: RetryPolicy,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with the default policy and no endpoint.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Targets the local transmit bridge.
    #[inline]
    #[must_use]
    pub fn transmit(self) -> Self {
        self.endpoint(Endpoint::transmit())
    }

    /// Targets the local receive bridge.
    #[inline]
    #[must_use]
    pub fn receive(self) -> Self {
        self.endpoint(Endpoint::receive())
    }

    /// Targets an arbitrary URL in the given role.
    #[inline]
    #[must_use]
    pub fn url(self, url: impl Into<String>, role: Role) -> Self {
        self.endpoint(Endpoint::new(url, role))
    }

    /// Replaces the whole retry policy.
    #[inline]
    #[must_use]
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, value: Duration) -> Self {
        self.policy.connect_timeout = value;
        self
    }

    /// Sets the liveness probe interval.
    #[inline]
    #[must_use]
    pub fn probe_interval(mut self, value: Duration) -> Self {
        self.policy.probe_interval = value;
        self
    }

    /// Sets the probe timeout.
    #[inline]
    #[must_use]
    pub fn probe_timeout(mut self, value: Duration) -> Self {
        self.policy.probe_timeout = value;
        self
    }

    /// Sets the reconnect delay.
    #[inline]
    #[must_use]
    pub fn reconnect_delay(mut self, value: Duration) -> Self {
        self.policy.reconnect_delay = value;
        self
    }

    /// Sets the upload/raw request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, value: Duration) -> Self {
        self.policy.request_timeout = value;
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no endpoint was set
    /// - [`Error::Config`] if the endpoint URL is invalid
    /// - [`Error::Config`] if any policy duration is zero
    pub fn build(self) -> Result<ClientConfig> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| Error::config("endpoint is required"))?;

        let url = endpoint.validate()?;
        self.policy.validate()?;

        Ok(ClientConfig {
            url,
            role: endpoint.role(),
            policy: self.policy,
        })
    }

    /// Validates the configuration and spawns the client.
    ///
    /// The client starts `Idle`; call [`BridgeClient::connect`] to open.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn spawn(self, observer: impl Observer) -> Result<BridgeClient> {
        let config = self.build()?;
        Ok(BridgeClient::spawn(config, observer))
    }
}

// ============================================================================
// Tests
// ============================================================================
