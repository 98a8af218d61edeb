//! Device reachability and client status snapshots.

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::SessionGeneration;

use super::state::ConnectionState;

// ============================================================================
// Constants
// ============================================================================

/// Reason used when the bridge reports `connected: false` without one.
pub const DEFAULT_UNREACHABLE_REASON: &str = "Device not found";

// ============================================================================
// DeviceStatus
// ============================================================================

/// Last known reachability of the downstream device.
///
/// Updated only from probe responses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceStatus {
    /// Whether the bridge reported the device as reachable.
    pub reachable: bool,
    /// Port or identifier reported with a positive probe.
    pub port: Option<String>,
    /// Reason reported with a negative probe.
    pub reason: Option<String>,
}

impl DeviceStatus {
    /// A device the bridge reached on `port`.
    #[inline]
    #[must_use]
    pub fn reachable(port: Option<String>) -> Self {
        Self {
            reachable: true,
            port,
            reason: None,
        }
    }

    /// A device the bridge could not reach.
    ///
    /// An absent reason becomes [`DEFAULT_UNREACHABLE_REASON`].
    #[inline]
    #[must_use]
    pub fn unreachable(reason: Option<String>) -> Self {
        Self {
            reachable: false,
            port: None,
            reason: Some(reason.unwrap_or_else(|| DEFAULT_UNREACHABLE_REASON.to_string())),
        }
    }

    /// Human-readable label, e.g. `Connected (COM3)`.
    #[must_use]
    pub fn label(&self) -> String {
        match (self.reachable, &self.port, &self.reason) {
            (true, Some(port), _) => format!("Connected ({port})"),
            (true, None, _) => "Connected".to_string(),
            (false, _, Some(reason)) => reason.clone(),
            (false, _, None) => "Unknown".to_string(),
        }
    }
}

// ============================================================================
// ClientStatus
// ============================================================================

/// Snapshot of the client published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientStatus {
    /// Current connection state.
    pub state: ConnectionState,
    /// Generation of the current (or last) session.
    pub generation: SessionGeneration,
    /// Last known device reachability.
    pub device: DeviceStatus,
}

// ============================================================================
// Tests
// ============================================================================
