//! API key creation inside the guest.
//!
//! Runs the guest-side key helper as `<binary> -u <user> create` with
//! output capture, waits for it via [`ExecPoller`], and returns the decoded
//! stdout (the key material).

use tracing::{info, warn};

use super::exec_poller::ExecPoller;
use crate::channel::ChannelClient;
use crate::config::ApiKeyConfig;
use crate::models::GuestExecRequest;
use crate::{AppError, Result};

/// Result of a successful key creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyOutput {
    /// Guest pid of the helper process.
    pub pid: i64,
    /// Raw `guest-exec-status` reply line.
    pub raw_status: String,
    /// Decoded and trimmed helper stdout.
    pub payload: String,
}

/// Build the `guest-exec` request for the key helper.
#[must_use]
pub fn apikey_request(config: &ApiKeyConfig) -> GuestExecRequest {
    GuestExecRequest::captured(
        config.binary.clone(),
        vec!["-u".into(), config.user.clone(), "create".into()],
    )
}

/// Create an API key in the guest.
///
/// # Errors
///
/// - Transport, protocol and timeout errors from the underlying exchanges.
/// - `AppError::Operation` if the helper exits non-zero or is killed.
/// - `AppError::Protocol` if the helper succeeds without printing anything.
pub async fn create_api_key(
    client: &ChannelClient,
    poller: &ExecPoller,
    config: &ApiKeyConfig,
) -> Result<ApiKeyOutput> {
    let request = apikey_request(config);
    let finished = poller.run(client, &request).await?;
    let outcome = finished.outcome;

    if !outcome.success() {
        let detail = outcome.stderr.trim();
        return Err(AppError::Operation(format!(
            "{} {}: {detail}",
            config.binary,
            outcome.exit_description()
        )));
    }

    if outcome.truncated {
        warn!(pid = outcome.pid, "key helper output was truncated by the agent");
    }

    let payload = outcome.stdout.trim().to_owned();
    if payload.is_empty() {
        return Err(AppError::Protocol(format!(
            "{} produced no out-data",
            config.binary
        )));
    }

    info!(pid = outcome.pid, user = %config.user, "api key created");
    Ok(ApiKeyOutput {
        pid: outcome.pid,
        raw_status: finished.raw_status,
        payload,
    })
}
