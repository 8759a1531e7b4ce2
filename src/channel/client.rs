//! Control channel client for the QEMU guest agent socket.
//!
//! Each exchange opens its own connection using the `interprocess` crate
//! (Unix domain socket addressed by file path), writes one request line,
//! reads one response line, and drops the connection. Connect, the request
//! write, and every wait for readable data are bounded by the configured
//! timeout.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use interprocess::local_socket::tokio::Stream;
use interprocess::local_socket::traits::tokio::Stream as _;
use interprocess::local_socket::{GenericFilePath, ToFsName};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info_span, warn, Instrument};

use super::codec::{encode_request, ResponseBuffer};
use crate::config::ChannelConfig;
use crate::models::{GuestCommand, GuestResponse};
use crate::{AppError, Result};

/// Size of a single read from the channel.
const READ_CHUNK_BYTES: usize = 4096;

/// Send one request over a fresh connection and return the raw reply text.
///
/// The returned text is exactly what the peer sent (including the trailing
/// newline when present). If the peer closes before sending a newline, the
/// bytes received so far are returned.
///
/// # Errors
///
/// - `AppError::Connection` if the endpoint is missing or refuses the
///   connection.
/// - `AppError::Timeout` if connecting, writing the request, or any wait
///   for data exceeds `window`.
/// - `AppError::Channel` for other transport faults.
/// - `AppError::Protocol` if the reply is not UTF-8 or is oversized.
pub async fn send(command: &GuestCommand, endpoint: &Path, window: Duration) -> Result<String> {
    let span = info_span!(
        "qga_exchange",
        execute = %command.execute,
        endpoint = %endpoint.display()
    );
    exchange(command, endpoint, window).instrument(span).await
}

async fn exchange(command: &GuestCommand, endpoint: &Path, window: Duration) -> Result<String> {
    let request = encode_request(command)?;

    let mut stream = connect(endpoint, window).await?;

    match timeout(window, write_request(&mut stream, &request)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            return Err(AppError::Channel(format!("failed to write request: {err}")));
        }
        Err(_) => {
            warn!(bytes = request.len(), ?window, "peer did not accept request within timeout");
            return Err(AppError::Timeout(window));
        }
    }
    debug!(bytes = request.len(), "request written");

    let mut response = ResponseBuffer::new();
    let mut chunk = [0_u8; READ_CHUNK_BYTES];
    loop {
        let read = match timeout(window, stream.read(&mut chunk)).await {
            Ok(Ok(read)) => read,
            Ok(Err(err)) => {
                return Err(AppError::Channel(format!("failed to read response: {err}")));
            }
            Err(_) => {
                warn!(received = response.len(), ?window, "no data within timeout");
                return Err(AppError::Timeout(window));
            }
        };

        if read == 0 {
            if !response.is_complete() {
                debug!(received = response.len(), "peer closed before newline");
            }
            break;
        }

        if response.push(&chunk[..read])? {
            break;
        }
    }

    debug!(bytes = response.len(), "response received");
    response.into_text()
}

async fn write_request(stream: &mut Stream, request: &[u8]) -> io::Result<()> {
    stream.write_all(request).await?;
    stream.flush().await
}

async fn connect(endpoint: &Path, window: Duration) -> Result<Stream> {
    let name = endpoint
        .to_fs_name::<GenericFilePath>()
        .map_err(|err| {
            AppError::Connection(format!("invalid endpoint '{}': {err}", endpoint.display()))
        })?;

    connect_within(endpoint, window, Stream::connect(name)).await
}

/// Bound a pending connect by `window` and tag its failure.
async fn connect_within<T, F>(endpoint: &Path, window: Duration, connecting: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(window, connecting).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(err)) => Err(map_connect_error(endpoint, &err)),
        Err(_) => {
            warn!(?window, "connect did not complete within timeout");
            Err(AppError::Timeout(window))
        }
    }
}

fn map_connect_error(endpoint: &Path, err: &io::Error) -> AppError {
    match err.kind() {
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => AppError::Connection(format!(
            "cannot connect to '{}': {err}",
            endpoint.display()
        )),
        _ => AppError::Channel(format!(
            "cannot connect to '{}': {err}",
            endpoint.display()
        )),
    }
}

/// Guest agent client bound to one endpoint and timeout.
#[derive(Debug, Clone)]
pub struct ChannelClient {
    endpoint: PathBuf,
    timeout: Duration,
}

impl ChannelClient {
    /// Create a client for `endpoint` with a per-exchange `timeout`.
    #[must_use]
    pub fn new(endpoint: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Create a client from the `[channel]` configuration section.
    #[must_use]
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.socket_path.clone(), config.timeout())
    }

    /// Endpoint path this client connects to.
    #[must_use]
    pub fn endpoint(&self) -> &Path {
        &self.endpoint
    }

    /// Per-exchange timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `command` and return the raw reply text.
    ///
    /// # Errors
    ///
    /// See [`send`].
    pub async fn send_raw(&self, command: &GuestCommand) -> Result<String> {
        send(command, &self.endpoint, self.timeout).await
    }

    /// Send `command` and return its `return` payload.
    ///
    /// # Errors
    ///
    /// Transport errors as in [`send`], `AppError::Protocol` for a
    /// malformed reply, and `AppError::Operation` when the agent answers
    /// with an error object.
    pub async fn execute(&self, command: &GuestCommand) -> Result<Value> {
        let raw = self.send_raw(command).await?;
        GuestResponse::parse(&raw)?.into_result()
    }

    /// Send `command` and deserialize its `return` payload into `T`.
    ///
    /// # Errors
    ///
    /// As [`ChannelClient::execute`], plus `AppError::Protocol` when the
    /// payload does not match `T`.
    pub async fn execute_as<T: DeserializeOwned>(&self, command: &GuestCommand) -> Result<T> {
        let value = self.execute(command).await?;
        decode_return(&command.execute, value)
    }

    /// Like [`ChannelClient::execute_as`] but also returns the raw line.
    ///
    /// # Errors
    ///
    /// As [`ChannelClient::execute_as`].
    pub async fn execute_with_raw<T: DeserializeOwned>(
        &self,
        command: &GuestCommand,
    ) -> Result<(T, String)> {
        let raw = self.send_raw(command).await?;
        let value = GuestResponse::parse(&raw)?.into_result()?;
        Ok((decode_return(&command.execute, value)?, raw))
    }
}

fn decode_return<T: DeserializeOwned>(execute: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| AppError::Protocol(format!("unexpected {execute} payload: {err}")))
}
