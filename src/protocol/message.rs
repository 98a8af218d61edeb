//! Outbound and inbound frame types.
//!
//! Every frame is a JSON object discriminated by its `type` field.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str, from_value, to_string};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Message used when the bridge sends `{type: "error"}` without one.
const DEFAULT_ERROR_MESSAGE: &str = "Unknown error";

// ============================================================================
// Outbound
// ============================================================================

/// A frame sent from the client to the bridge.
///
/// # Format
///
/// ```json
/// { "type": "check_connection" }
/// { "type": "raw", "data": "{\"type\":\"file_upload\",...}" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Device reachability probe.
    CheckConnection,

    /// Envelope around an application message.
    ///
    /// `data` is the JSON text of the inner message; the bridge unwraps it.
    Raw {
        /// JSON-encoded inner message.
        data: String,
    },
}

impl Outbound {
    /// Wraps an application message in a `raw` envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the inner message cannot be serialized.
    pub fn envelope<T: Serialize + ?Sized>(inner: &T) -> Result<Self> {
        Ok(Self::Raw {
            data: to_string(inner)?,
        })
    }

    /// Serializes the frame to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Body of a `connection_status` frame.
///
/// # Format
///
/// ```json
/// { "type": "connection_status", "connected": true, "port": "COM3" }
/// { "type": "connection_status", "connected": false, "reason": "No device" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionStatus {
    /// Whether the bridge can reach the device.
    pub connected: bool,

    /// Serial port or other identifier of the device.
    #[serde(default)]
    pub port: Option<String>,

    /// Why the device is unreachable.
    #[serde(default)]
    pub reason: Option<String>,
}

// ============================================================================
// Inbound
// ============================================================================

/// A frame received from the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Probe response.
    ConnectionStatus(ConnectionStatus),

    /// The bridge accepted a file upload.
    UploadSuccess {
        /// File name echoed by the bridge.
        filename: Option<String>,
        /// Byte count echoed by the bridge.
        size: Option<u64>,
    },

    /// The bridge rejected an application request.
    Error {
        /// Reason reported by the bridge.
        message: String,
    },

    /// The bridge wrote a raw envelope to the device.
    Ack {
        /// Number of bytes written.
        len: Option<u64>,
    },

    /// The device sent data through the bridge.
    DataReceived {
        /// Payload, if the bridge attached one.
        data: Option<Value>,
    },

    /// Any other `type`.
    Unknown {
        /// The unrecognized `type` value.
        kind: String,
    },
}

impl Inbound {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the frame is not a JSON object with a
    /// string `type`, or a `connection_status` frame lacks `connected`.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            from_str(text).map_err(|e| Error::protocol(format!("malformed frame: {e}")))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("frame has no string `type` field"))?
            .to_string();

        let inbound = match kind.as_str() {
            "connection_status" => {
                let status = from_value(value)
                    .map_err(|e| Error::protocol(format!("bad connection_status: {e}")))?;
                Self::ConnectionStatus(status)
            }
            "upload_success" => Self::UploadSuccess {
                filename: value
                    .get("filename")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                size: value.get("size").and_then(Value::as_u64),
            },
            "error" => Self::Error {
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_ERROR_MESSAGE)
                    .to_string(),
            },
            "ack" => Self::Ack {
                len: value.get("len").and_then(Value::as_u64),
            },
            "data_received" => Self::DataReceived {
                data: value.get("data").cloned(),
            },
            _ => Self::Unknown { kind },
        };

        Ok(inbound)
    }

    /// Returns the frame's `type` value.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::ConnectionStatus(_) => "connection_status",
            Self::UploadSuccess { .. } => "upload_success",
            Self::Error { .. } => "error",
            Self::Ack { .. } => "ack",
            Self::DataReceived { .. } => "data_received",
            Self::Unknown { kind } => kind,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
