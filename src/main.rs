#![forbid(unsafe_code)]

//! `qga-apikey`: creates an API key inside a guest through the QEMU guest
//! agent socket.
//!
//! Starts the key helper with `guest-exec`, polls `guest-exec-status` until
//! it exits, prints the raw status reply on stdout and the decoded key
//! material on stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use qga_apikey::channel::ChannelClient;
use qga_apikey::config::{ConfigOverrides, GlobalConfig};
use qga_apikey::logging::{init_tracing, LogFormat};
use qga_apikey::orchestrator::{create_api_key, ExecPoller};
use qga_apikey::{AppError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "qga-apikey",
    about = "Create an API key inside a guest via the QEMU guest agent",
    version,
    long_about = None
)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Guest agent socket path (overrides config and `QEMU_GA_SOCKET`).
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Per-exchange timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Guest user the key is created for.
    #[arg(long)]
    user: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("error: {err}");
        return ExitCode::from(err.exit_code());
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, retryable = err.is_retryable(), "api key creation failed");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(args: Cli) -> Result<()> {
    let overrides = ConfigOverrides {
        socket_path: args.socket,
        timeout_seconds: args.timeout,
        user: args.user,
    };
    let config = GlobalConfig::resolve(args.config.as_deref(), &overrides)?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(create(config))
}

async fn create(config: GlobalConfig) -> Result<()> {
    let client = ChannelClient::from_config(&config.channel);
    let poller = ExecPoller::from_config(&config.poll);
    info!(
        socket = %client.endpoint().display(),
        timeout = ?client.timeout(),
        "connecting to guest agent"
    );

    let created = create_api_key(&client, &poller, &config.apikey).await?;

    println!("{}", created.raw_status.trim());
    eprintln!("{}", created.payload);
    Ok(())
}
