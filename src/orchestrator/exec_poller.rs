//! Guest process runner: starts a `guest-exec` and polls its status.
//!
//! After the process is started, `guest-exec-status` is polled until the
//! agent reports `exited`. Between incomplete polls the delay doubles, capped
//! at the configured maximum. Exhausting the attempt budget fails with
//! `AppError::OperationTimeout`.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, info_span, Instrument};

use crate::channel::ChannelClient;
use crate::config::PollConfig;
use crate::models::{ExecOutcome, GuestCommand, GuestExecPid, GuestExecRequest, GuestExecStatus};
use crate::{AppError, Result};

/// Final status of a polled process with the raw reply it came from.
#[derive(Debug, Clone)]
pub struct FinishedExec {
    /// Decoded outcome.
    pub outcome: ExecOutcome,
    /// Raw `guest-exec-status` reply line that reported `exited`.
    pub raw_status: String,
}

/// Polls `guest-exec-status` with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecPoller {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl ExecPoller {
    /// Create a poller with explicit limits.
    #[must_use]
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Create a poller from the `[poll]` configuration section.
    #[must_use]
    pub fn from_config(config: &PollConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.max_attempts,
        )
    }

    /// Delay slept after the first incomplete poll.
    #[must_use]
    pub fn first_delay(&self) -> Duration {
        self.initial_delay.min(self.max_delay)
    }

    /// Delay that follows `current`: doubled, capped at the maximum.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }

    /// Start `request` in the guest and return its pid.
    ///
    /// # Errors
    ///
    /// Channel, protocol, and operation errors from the `guest-exec` call.
    pub async fn start(&self, client: &ChannelClient, request: &GuestExecRequest) -> Result<i64> {
        let command = GuestCommand::guest_exec(request)?;
        let (started, raw): (GuestExecPid, String) = client.execute_with_raw(&command).await?;
        debug!(response = raw.trim_end(), "guest-exec accepted");
        info!(pid = started.pid, path = %request.path, "guest process started");
        Ok(started.pid)
    }

    /// Poll `pid` until it exits or the attempt budget is spent.
    ///
    /// # Errors
    ///
    /// `AppError::OperationTimeout` when the process is still running after
    /// the last attempt, otherwise the errors of the status call.
    pub async fn wait(&self, client: &ChannelClient, pid: i64) -> Result<FinishedExec> {
        self.poll_until_exited(client, pid)
            .instrument(info_span!("exec_wait", pid))
            .await
    }

    async fn poll_until_exited(&self, client: &ChannelClient, pid: i64) -> Result<FinishedExec> {
        let command = GuestCommand::guest_exec_status(pid);
        let mut delay = self.first_delay();

        for attempt in 1..=self.max_attempts {
            let (status, raw): (GuestExecStatus, String) =
                client.execute_with_raw(&command).await?;

            if status.exited {
                let outcome = ExecOutcome::from_status(pid, &status)?;
                info!(
                    attempt,
                    exit_code = ?outcome.exit_code,
                    signal = ?outcome.signal,
                    "guest process exited"
                );
                return Ok(FinishedExec {
                    outcome,
                    raw_status: raw,
                });
            }

            if attempt == self.max_attempts {
                break;
            }

            debug!(attempt, ?delay, "guest process still running");
            sleep(delay).await;
            delay = self.next_delay(delay);
        }

        Err(AppError::OperationTimeout(format!(
            "process {pid} still running after {} status polls",
            self.max_attempts
        )))
    }

    /// Start `request` and wait for it to finish.
    ///
    /// # Errors
    ///
    /// As [`ExecPoller::start`] and [`ExecPoller::wait`].
    pub async fn run(
        &self,
        client: &ChannelClient,
        request: &GuestExecRequest,
    ) -> Result<FinishedExec> {
        let pid = self.start(client, request).await?;
        self.wait(client, pid).await
    }
}

impl Default for ExecPoller {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}
