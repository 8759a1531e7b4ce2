//! Error types shared across the application.

use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Endpoint path missing, not listening, or connection refused.
    Connection(String),
    /// Connect, request write, or a wait for data exceeded the window.
    Timeout(Duration),
    /// Any other transport fault on an established or pending channel.
    Channel(String),
    /// Response bytes are not UTF-8, not JSON, or have an unexpected shape.
    Protocol(String),
    /// The guest agent answered with an error object or the guest
    /// process failed.
    Operation(String),
    /// A started guest operation did not finish within the poll budget.
    OperationTimeout(String),
}

impl AppError {
    /// Whether a caller may reasonably retry the failed operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::OperationTimeout(_)
        )
    }

    /// Process exit status for this error kind (sysexits-style).
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 78,
            Self::Connection(_) => 69,
            Self::Timeout(_) | Self::OperationTimeout(_) => 75,
            Self::Protocol(_) => 76,
            Self::Operation(_) => 70,
            Self::Channel(_) => 74,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Connection(msg) => write!(f, "connection: {msg}"),
            Self::Timeout(window) => write!(f, "timeout: no response received within {window:?}"),
            Self::Channel(msg) => write!(f, "channel: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Operation(msg) => write!(f, "operation: {msg}"),
            Self::OperationTimeout(msg) => write!(f, "operation timeout: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
