//! Newline-delimited JSON framing for the guest agent channel.
//!
//! Requests are encoded as one JSON object followed by a single `\n`.
//! Responses are accumulated chunk by chunk until a chunk carries a `\n`
//! or the peer closes; the accumulated bytes are then decoded as UTF-8.

use crate::models::GuestCommand;
use crate::{AppError, Result};

/// Maximum number of response bytes accumulated for a single reply: 32 MiB.
///
/// `guest-exec-status` replies carry base64-encoded process output, so the
/// limit is generous; it only guards against a peer that never sends `\n`.
pub const MAX_RESPONSE_BYTES: usize = 32 * 1024 * 1024;

/// Encode `command` as a `\n`-terminated JSON line.
///
/// # Errors
///
/// Returns `AppError::Protocol` if the command cannot be serialized.
pub fn encode_request(command: &GuestCommand) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(command)
        .map_err(|err| AppError::Protocol(format!("failed to encode request: {err}")))?;
    line.push(b'\n');
    Ok(line)
}

/// Accumulates response chunks until one complete line has been seen.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    bytes: Vec<u8>,
    complete: bool,
}

impl ResponseBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk read from the channel.
    ///
    /// Returns `true` once the chunk carries a newline, meaning the reply
    /// is complete and no further reads are needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` when the reply grows beyond
    /// [`MAX_RESPONSE_BYTES`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<bool> {
        if self.bytes.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(AppError::Protocol(format!(
                "response too long: exceeded {MAX_RESPONSE_BYTES} bytes"
            )));
        }
        self.bytes.extend_from_slice(chunk);
        if chunk.contains(&b'\n') {
            self.complete = true;
        }
        Ok(self.complete)
    }

    /// Whether a newline has been received.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of bytes accumulated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the accumulated bytes as UTF-8 text, unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the bytes are not valid UTF-8.
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.bytes)
            .map_err(|err| AppError::Protocol(format!("response is not valid utf-8: {err}")))
    }
}
