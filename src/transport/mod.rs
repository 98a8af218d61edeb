//! WebSocket transport layer.
//!
//! This module owns the raw socket to the bridge process and nothing else:
//! no probing, no retry policy, no response correlation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  BridgeClient   │                              │  Bridge         │
//! │                 │         WebSocket            │  (local process)│
//! │  Supervisor     │◄────────────────────────────►│                 │
//! │  → Session      │      127.0.0.1:8765/8766     │  serial ↔ device│
//! │                 │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `Session::open` - Spawn I/O task, start handshake under connect timeout
//! 2. `SessionEvent::Opened` - Frames may be sent
//! 3. `SessionEvent::Message` - Inbound frames in transport order
//! 4. `SessionEvent::Closed` / `SessionEvent::Errored` - Session is dead
//! 5. `Session::close` - Local close, idempotent, also run on drop
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `session` | WebSocket session and I/O task |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket session and I/O task.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use session::{
    EventReceiver, EventSender, Session, SessionError, SessionEvent, TransportState,
};
