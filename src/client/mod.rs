//! Connection lifecycle and message exchange.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`BridgeClient`] | Handle used by application code |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`Endpoint`], [`Role`], [`RetryPolicy`] | Configuration |
//! | [`ConnectionState`] | Lifecycle state machine |
//! | [`DeviceStatus`], [`ClientStatus`] | Status snapshots |
//! | [`Observer`], [`ClientEvent`] | Outbound notifications |
//!
//! The supervisor, exchange and liveness monitor are internal; they run on
//! the task spawned by [`ClientBuilder::spawn`].
//!
//! # Example
//!
//! ```no_run
//! use bridge_client::{BridgeClient, ClientEvent, ConnectionState};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> bridge_client::Result<()> {
//! let (events, _rx) = mpsc::unbounded_channel::<ClientEvent>();
//! let client = BridgeClient::builder().receive().spawn(events)?;
//!
//! client.connect()?;
//!
//! let mut status = client.watch_status();
//! status
//!     .wait_for(|s| s.state == ConnectionState::Ready)
//!     .await
//!     .ok();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Endpoint, role and retry policy.
pub mod config;

/// Client handle.
pub mod core;

/// Request/response correlation.
pub mod exchange;

/// Periodic liveness timer.
mod monitor;

/// Observer interface.
pub mod observer;

/// Connection state machine.
pub mod state;

/// Device and client status.
pub mod status;

/// Lifecycle owner task.
mod supervisor;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use config::{ClientConfig, Endpoint, RECEIVE_PORT, RetryPolicy, Role, TRANSMIT_PORT};
pub use core::BridgeClient;
pub use exchange::{Reply, RequestKind, UploadReceipt};
pub use observer::{ClientEvent, Observer};
pub use state::{ConnectionState, Trigger};
pub use status::{ClientStatus, DEFAULT_UNREACHABLE_REASON, DeviceStatus};
