//! WebSocket protocol message types.
//!
//! This module defines the JSON text frames exchanged between the client
//! and the bridge process.
//!
//! # Protocol Overview
//!
//! | Frame `type` | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `check_connection` | Client → Bridge | Device reachability probe |
//! | `raw` | Client → Bridge | Envelope carrying an application message |
//! | `connection_status` | Bridge → Client | Probe response |
//! | `upload_success` | Bridge → Client | File upload accepted |
//! | `ack` | Bridge → Client | Raw envelope written to the device |
//! | `error` | Bridge → Client | Application request rejected |
//! | `data_received` | Bridge → Client | Unsolicited notification |
//!
//! The protocol carries no request IDs. Responses are matched to requests
//! by `type` alone, which is why at most one request per kind is outstanding.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Outbound and inbound frames |
//! | `upload` | File upload message and data URL codec |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound and inbound frame types.
pub mod message;

/// File upload message and payload encoding.
pub mod upload;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{ConnectionStatus, Inbound, Outbound};
pub use upload::{FileUpload, MAX_UPLOAD_SIZE, decode_data_url, encode_data_url};
