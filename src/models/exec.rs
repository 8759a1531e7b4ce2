//! `guest-exec` and `guest-exec-status` payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Arguments of a `guest-exec` command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct GuestExecRequest {
    /// Absolute path of the program inside the guest.
    pub path: String,
    /// Program arguments.
    #[serde(default)]
    pub arg: Vec<String>,
    /// Extra environment entries as `KEY=VALUE`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Base64-encoded data written to the process stdin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data: Option<String>,
    /// Whether the agent should buffer stdout and stderr.
    #[serde(default)]
    pub capture_output: bool,
}

impl GuestExecRequest {
    /// Request that runs `path` with `arg` and captures its output.
    #[must_use]
    pub fn captured(path: impl Into<String>, arg: Vec<String>) -> Self {
        Self {
            path: path.into(),
            arg,
            env: Vec::new(),
            input_data: None,
            capture_output: true,
        }
    }
}

/// `return` payload of `guest-exec`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestExecPid {
    /// Opaque handle of the started process.
    pub pid: i64,
}

/// `return` payload of `guest-exec-status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct GuestExecStatus {
    /// Whether the process has finished.
    pub exited: bool,
    /// Exit code when the process exited normally.
    #[serde(default)]
    pub exitcode: Option<i32>,
    /// Signal number when the process was killed.
    #[serde(default)]
    pub signal: Option<i32>,
    /// Base64-encoded captured stdout.
    #[serde(default)]
    pub out_data: Option<String>,
    /// Base64-encoded captured stderr.
    #[serde(default)]
    pub err_data: Option<String>,
    /// Stdout exceeded the agent's capture buffer.
    #[serde(default)]
    pub out_truncated: Option<bool>,
    /// Stderr exceeded the agent's capture buffer.
    #[serde(default)]
    pub err_truncated: Option<bool>,
}

impl GuestExecStatus {
    /// Decoded stdout, or empty text when the agent sent none.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` on invalid base64 or UTF-8.
    pub fn stdout(&self) -> Result<String> {
        decode_payload("out-data", self.out_data.as_deref())
    }

    /// Decoded stderr, or empty text when the agent sent none.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` on invalid base64 or UTF-8.
    pub fn stderr(&self) -> Result<String> {
        decode_payload("err-data", self.err_data.as_deref())
    }
}

/// Decoded result of a finished guest process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Process handle returned by `guest-exec`.
    pub pid: i64,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Terminating signal, if any.
    pub signal: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Either stream was truncated by the agent.
    pub truncated: bool,
}

impl ExecOutcome {
    /// Build an outcome from a final status payload.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the process has not exited or the
    /// captured data cannot be decoded.
    pub fn from_status(pid: i64, status: &GuestExecStatus) -> Result<Self> {
        if !status.exited {
            return Err(AppError::Protocol(format!("process {pid} has not exited")));
        }

        Ok(Self {
            pid,
            exit_code: status.exitcode,
            signal: status.signal,
            stdout: status.stdout()?,
            stderr: status.stderr()?,
            truncated: status.out_truncated.unwrap_or(false)
                || status.err_truncated.unwrap_or(false),
        })
    }

    /// Whether the process exited normally with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.signal.is_none() && self.exit_code == Some(0)
    }

    /// How the process ended, e.g. `exited with 1` or `killed by signal 9`.
    #[must_use]
    pub fn exit_description(&self) -> String {
        match (self.exit_code, self.signal) {
            (_, Some(signal)) => format!("killed by signal {signal}"),
            (Some(code), None) => format!("exited with {code}"),
            (None, None) => "finished without exit code".to_owned(),
        }
    }
}

fn decode_payload(field: &str, data: Option<&str>) -> Result<String> {
    let Some(encoded) = data else {
        return Ok(String::new());
    };

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|err| AppError::Protocol(format!("{field} is not valid base64: {err}")))?;

    String::from_utf8(bytes)
        .map_err(|err| AppError::Protocol(format!("{field} is not valid utf-8: {err}")))
}
