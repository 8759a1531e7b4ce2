//! Outbound guest agent command.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::exec::GuestExecRequest;
use crate::{AppError, Result};

/// A single guest agent request: `{"execute": ..., "arguments": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestCommand {
    /// Operation name, e.g. `guest-exec`.
    pub execute: String,
    /// Operation arguments; omitted from the wire when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

impl GuestCommand {
    /// Command without arguments.
    #[must_use]
    pub fn new(execute: impl Into<String>) -> Self {
        Self {
            execute: execute.into(),
            arguments: None,
        }
    }

    /// Attach an argument map.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// `guest-ping`.
    #[must_use]
    pub fn ping() -> Self {
        Self::new("guest-ping")
    }

    /// `guest-info`.
    #[must_use]
    pub fn info() -> Self {
        Self::new("guest-info")
    }

    /// `guest-exec` for the given process request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the request cannot be represented
    /// as a JSON object.
    pub fn guest_exec(request: &GuestExecRequest) -> Result<Self> {
        match serde_json::to_value(request) {
            Ok(Value::Object(arguments)) => Ok(Self::new("guest-exec").with_arguments(arguments)),
            Ok(other) => Err(AppError::Protocol(format!(
                "guest-exec arguments must be an object, got {other}"
            ))),
            Err(err) => Err(AppError::Protocol(format!(
                "failed to encode guest-exec arguments: {err}"
            ))),
        }
    }

    /// `guest-exec-status` for a previously started process.
    #[must_use]
    pub fn guest_exec_status(pid: i64) -> Self {
        let mut arguments = Map::new();
        arguments.insert("pid".into(), Value::from(pid));
        Self::new("guest-exec-status").with_arguments(arguments)
    }

    /// Parse a command from caller-supplied JSON text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the text is not a JSON object with
    /// a string `execute` field.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| AppError::Protocol(format!("invalid command json: {err}")))
    }
}
