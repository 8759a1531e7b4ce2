//! Global configuration parsing, validation, and environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{AppError, Result};

/// Environment variable that overrides the guest agent socket path.
pub const SOCKET_ENV_VAR: &str = "QEMU_GA_SOCKET";

/// Socket path used when neither config, env, nor CLI provide one.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/qemu-virtserialport.sock";

/// Control channel endpoint and per-exchange timeout.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ChannelConfig {
    /// Filesystem path of the guest agent stream socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Bound applied to connect and to each wait for readable data.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ChannelConfig {
    /// Per-exchange timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Backoff settings for polling `guest-exec-status`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PollConfig {
    /// Delay after the first incomplete status poll.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for the doubled delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Number of status polls before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Guest-side API key helper invocation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ApiKeyConfig {
    /// Absolute path of the key helper inside the guest.
    #[serde(default = "default_apikey_binary")]
    pub binary: String,
    /// Guest user the key is created for.
    #[serde(default = "default_apikey_user")]
    pub user: String,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            binary: default_apikey_binary(),
            user: default_apikey_user(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_timeout_seconds() -> u64 {
    5
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    4000
}

fn default_max_attempts() -> u32 {
    12
}

fn default_apikey_binary() -> String {
    "/usr/local/bin/opn-apikey".into()
}

fn default_apikey_user() -> String {
    "root".into()
}

/// Values given on the command line, applied after the file and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `--socket`
    pub socket_path: Option<PathBuf>,
    /// `--timeout`
    pub timeout_seconds: Option<u64>,
    /// `--user`
    pub user: Option<String>,
}

/// Global configuration parsed from an optional `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Control channel settings.
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Status polling settings.
    #[serde(default)]
    pub poll: PollConfig,
    /// API key helper settings.
    #[serde(default)]
    pub apikey: ApiKeyConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Layer configuration: defaults, then `path`, then the environment,
    /// then `overrides`, and validate the result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be loaded or the final
    /// configuration is invalid.
    pub fn resolve(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();

        if let Some(socket) = &overrides.socket_path {
            config.channel.socket_path.clone_from(socket);
        }
        if let Some(timeout) = overrides.timeout_seconds {
            config.channel.timeout_seconds = timeout;
        }
        if let Some(user) = &overrides.user {
            config.apikey.user.clone_from(user);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply the `QEMU_GA_SOCKET` override from the process environment.
    ///
    /// Called once at startup by the binaries; library code never reads
    /// the environment on its own.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = env::var(SOCKET_ENV_VAR) {
            if path.is_empty() {
                return;
            }
            debug!(socket = %path, "socket path taken from {SOCKET_ENV_VAR}");
            self.channel.socket_path = PathBuf::from(path);
        }
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.channel.socket_path.as_os_str().is_empty() {
            return Err(AppError::Config("channel.socket_path must not be empty".into()));
        }

        if self.channel.timeout_seconds == 0 {
            return Err(AppError::Config(
                "channel.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.poll.max_attempts == 0 {
            return Err(AppError::Config(
                "poll.max_attempts must be greater than zero".into(),
            ));
        }

        if self.poll.initial_delay_ms > self.poll.max_delay_ms {
            return Err(AppError::Config(
                "poll.initial_delay_ms must not exceed poll.max_delay_ms".into(),
            ));
        }

        if self.apikey.binary.trim().is_empty() {
            return Err(AppError::Config("apikey.binary must not be empty".into()));
        }

        Ok(())
    }
}
