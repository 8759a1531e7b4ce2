//! Inbound guest agent response.
//!
//! Every reply line is either `{"return": <value>}` or
//! `{"error": {"class": ..., "desc": ...}}`. Anything else is a protocol
//! violation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppError, Result};

/// Error object reported by the guest agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestError {
    /// Error class, e.g. `GenericError`.
    #[serde(default)]
    pub class: String,
    /// Human-readable description.
    #[serde(default)]
    pub desc: String,
}

/// A decoded guest agent reply.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestResponse {
    /// Successful reply carrying the operation-specific payload.
    Return(Value),
    /// Failed reply carrying the agent's error object.
    Error(GuestError),
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(rename = "return")]
    ret: Option<Value>,
    error: Option<GuestError>,
}

impl GuestResponse {
    /// Parse one response line (surrounding whitespace is ignored).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` for empty input, invalid JSON, or an
    /// object carrying neither `return` nor `error`.
    pub fn parse(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(AppError::Protocol("empty response".into()));
        }

        let raw: RawResponse = serde_json::from_str(trimmed)
            .map_err(|err| AppError::Protocol(format!("invalid response json: {err}")))?;

        match (raw.ret, raw.error) {
            (_, Some(error)) => Ok(Self::Error(error)),
            (Some(value), None) => Ok(Self::Return(value)),
            (None, None) => Err(AppError::Protocol(
                "response has neither `return` nor `error`".into(),
            )),
        }
    }

    /// Convert into the `return` payload, mapping agent errors to
    /// `AppError::Operation`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Operation` for the `Error` variant.
    pub fn into_result(self) -> Result<Value> {
        match self {
            Self::Return(value) => Ok(value),
            Self::Error(error) => Err(AppError::Operation(format!(
                "{}: {}",
                error.class, error.desc
            ))),
        }
    }
}
