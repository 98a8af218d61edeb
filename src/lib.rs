//! Bridge client - connection lifecycle and message exchange for a local
//! device bridge.
//!
//! A bridge is a local process exposing a WebSocket endpoint and talking to
//! an embedded device over its own link (serial, USB). This crate is the
//! client half: it opens the socket, verifies the device is actually
//! reachable, keeps checking, reconnects after failure and delivers one-shot
//! application messages such as file uploads.
//!
//! # Architecture
//!
//! - **Transport Session**: one WebSocket, one I/O task, generation-tagged events
//! - **Reconnection Supervisor**: single task owning state, session and timers
//! - **Message Exchange**: matches responses to requests by `type`
//! - **Liveness Monitor**: periodic `check_connection` probe while ready
//! - **Observer Interface**: callbacks consumed by presentation code
//!
//! # Quick Start
//!
//! ```no_run
//! use bridge_client::{BridgeClient, ClientEvent, Result};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (events, mut rx) = mpsc::unbounded_channel::<ClientEvent>();
//!
//!     let client = BridgeClient::builder().transmit().spawn(events)?;
//!
//!     let device = client.check_connection().await?;
//!     println!("Device: {}", device.label());
//!
//!     let receipt = client.upload_file("test.bin", 4, b"\x00\x01\x02\x03").await?;
//!     println!("Uploaded {}", receipt.filename);
//!
//!     while let Ok(event) = rx.try_recv() {
//!         println!("{event:?}");
//!     }
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`BridgeClient`], configuration, state machine, observer |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Session generation tag |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | WebSocket session (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Connection lifecycle and message exchange.
///
/// Use [`BridgeClient::builder()`] to configure and spawn a client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket protocol message types.
///
/// Frames exchanged with the bridge and the upload payload codec.
pub mod protocol;

/// WebSocket transport layer.
///
/// Internal module owning the socket and its I/O task.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    BridgeClient, ClientBuilder, ClientConfig, ClientEvent, ClientStatus, ConnectionState,
    DeviceStatus, Endpoint, Observer, Reply, RequestKind, RetryPolicy, Role, UploadReceipt,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::SessionGeneration;

// Protocol types
pub use protocol::{FileUpload, MAX_UPLOAD_SIZE};
