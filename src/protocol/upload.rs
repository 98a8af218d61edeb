//! File upload message and payload encoding.
//!
//! The transport only carries text frames, so file bytes travel as a data
//! URL (`data:<media type>;base64,<payload>`), the same self-describing form
//! a browser `FileReader` produces.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::Outbound;

// ============================================================================
// Constants
// ============================================================================

/// Largest file accepted for upload (10 MiB).
pub const MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Media type written into data URLs.
const DATA_URL_MEDIA_TYPE: &str = "application/octet-stream";

// ============================================================================
// FileUpload
// ============================================================================

/// A `file_upload` application message.
///
/// # Format
///
/// ```json
/// {
///   "type": "file_upload",
///   "filename": "firmware.bin",
///   "size": 1024,
///   "data": "data:application/octet-stream;base64,AAEC..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// File name shown to the bridge.
    pub filename: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Payload as a data URL.
    pub data: String,
}

/// Wire shape of application messages carried inside the `raw` envelope.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApplicationMessage<'a> {
    FileUpload {
        filename: &'a str,
        size: u64,
        data: &'a str,
    },
}

impl FileUpload {
    /// Creates an upload message, encoding `payload` as a data URL.
    #[must_use]
    pub fn new(filename: impl Into<String>, size: u64, payload: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            size,
            data: encode_data_url(payload),
        }
    }

    /// Reads a file from disk into an upload message.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the file exceeds [`MAX_UPLOAD_SIZE`]
    ///   or has no usable file name
    /// - [`Error::Io`] if the file cannot be read
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let size = tokio::fs::metadata(path).await?.len();

        if size > MAX_UPLOAD_SIZE {
            return Err(Error::invalid_argument(format!(
                "file size {size} exceeds {MAX_UPLOAD_SIZE} byte limit"
            )));
        }

        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::invalid_argument(format!("no file name in {}", path.display())))?
            .to_string();

        let payload = tokio::fs::read(path).await?;
        debug!(%filename, size, "Read upload payload");

        Ok(Self::new(filename, payload.len() as u64, &payload))
    }

    /// Wraps the message in a `raw` envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_envelope(&self) -> Result<Outbound> {
        Outbound::envelope(&ApplicationMessage::FileUpload {
            filename: &self.filename,
            size: self.size,
            data: &self.data,
        })
    }
}

// ============================================================================
// Data URL Codec
// ============================================================================

/// Encodes bytes as a base64 data URL.
#[must_use]
pub fn encode_data_url(payload: &[u8]) -> String {
    format!("data:{DATA_URL_MEDIA_TYPE};base64,{}", STANDARD.encode(payload))
}

/// Decodes a base64 data URL back into bytes.
///
/// Any media type is accepted; only base64 payloads are supported.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the text is not a base64 data URL.
pub fn decode_data_url(text: &str) -> Result<Vec<u8>> {
    let rest = text
        .strip_prefix("data:")
        .ok_or_else(|| Error::protocol("data URL must start with `data:`"))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::protocol("data URL has no payload separator"))?;

    if !header.ends_with(";base64") {
        return Err(Error::protocol("data URL is not base64 encoded"));
    }

    STANDARD
        .decode(payload)
        .map_err(|e| Error::protocol(format!("invalid base64 payload: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
