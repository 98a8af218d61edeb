//! Observer interface consumed by presentation code.
//!
//! The client never touches presentation state. It reports every externally
//! meaningful change through an [`Observer`], in this order within one
//! transition: connection status, device indicator, transfer result,
//! notification.
//!
//! # Example
//!
//! ```ignore
//! use bridge_client::{BridgeClient, ClientEvent};
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::unbounded_channel::<ClientEvent>();
//! let client = BridgeClient::builder().transmit().spawn(tx)?;
//! client.connect()?;
//!
//! while let Some(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;

// ============================================================================
// Observer
// ============================================================================

/// Callbacks for connection, device and transfer changes.
///
/// All methods default to no-ops. Callbacks run on the supervisor task and
/// must not block.
pub trait Observer: Send + Sync + 'static {
    /// Status line text changed.
    fn connection_status_changed(&self, _text: &str, _is_error: bool) {}

    /// Device indicator changed. Only emitted when `(connected, label)`
    /// differs from the previous call.
    fn device_indicator_changed(&self, _connected: bool, _label: &str) {}

    /// An upload finished. Emitted exactly once per upload.
    fn transfer_completed(&self, _ok: bool, _detail: &str) {}

    /// Out-of-band message from the bridge.
    fn notification(&self, _text: &str) {}
}

// ============================================================================
// ClientEvent
// ============================================================================

/// Observer callbacks as values, for channel-based consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// See [`Observer::connection_status_changed`].
    ConnectionStatusChanged {
        /// Status text.
        text: String,
        /// Whether the status describes a failure.
        is_error: bool,
    },
    /// See [`Observer::device_indicator_changed`].
    DeviceIndicatorChanged {
        /// Whether the device is reachable.
        connected: bool,
        /// Indicator label.
        label: String,
    },
    /// See [`Observer::transfer_completed`].
    TransferCompleted {
        /// Whether the transfer succeeded.
        ok: bool,
        /// Outcome detail.
        detail: String,
    },
    /// See [`Observer::notification`].
    Notification {
        /// Notification text.
        text: String,
    },
}

impl Observer for mpsc::UnboundedSender<ClientEvent> {
    fn connection_status_changed(&self, text: &str, is_error: bool) {
        let _ = self.send(ClientEvent::ConnectionStatusChanged {
            text: text.to_string(),
            is_error,
        });
    }

    fn device_indicator_changed(&self, connected: bool, label: &str) {
        let _ = self.send(ClientEvent::DeviceIndicatorChanged {
            connected,
            label: label.to_string(),
        });
    }

    fn transfer_completed(&self, ok: bool, detail: &str) {
        let _ = self.send(ClientEvent::TransferCompleted {
            ok,
            detail: detail.to_string(),
        });
    }

    fn notification(&self, text: &str) {
        let _ = self.send(ClientEvent::Notification {
            text: text.to_string(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tx.connection_status_changed("Connection lost", true);
        tx.device_indicator_changed(false, "Connection lost");
        tx.notification("New data received");

        assert_eq!(
            rx.try_recv().ok(),
            Some(ClientEvent::ConnectionStatusChanged {
                text: "Connection lost".into(),
                is_error: true
            })
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(ClientEvent::DeviceIndicatorChanged {
                connected: false,
                label: "Connection lost".into()
            })
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(ClientEvent::Notification {
                text: "New data received".into()
            })
        );
    }

    #[test]
    fn test_default_methods_are_noops() {
        struct Silent;
        impl Observer for Silent {}

        let observer = Silent;
        observer.transfer_completed(true, "ignored");
        observer.notification("ignored");
    }
}
