#![forbid(unsafe_code)]

//! `qga-ctl`: low-level companion CLI for the QEMU guest agent socket.
//!
//! Sends a single guest agent command and prints the raw reply line.
//! Useful for checking that the agent is reachable before running
//! `qga-apikey`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use qga_apikey::channel::ChannelClient;
use qga_apikey::config::{ConfigOverrides, GlobalConfig};
use qga_apikey::logging::{init_tracing, LogFormat};
use qga_apikey::models::{GuestCommand, GuestExecRequest, GuestResponse};
use qga_apikey::orchestrator::ExecPoller;
use qga_apikey::{AppError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "qga-ctl",
    about = "Send commands to a QEMU guest agent socket",
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

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the agent answers (`guest-ping`).
    Ping,

    /// Show agent version and supported commands (`guest-info`).
    Info,

    /// Start a process in the guest (`guest-exec`).
    Exec {
        /// Absolute program path inside the guest.
        path: String,
        /// Program arguments.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Poll until the process exits and print its decoded output.
        #[arg(long)]
        wait: bool,
    },

    /// Query a started process (`guest-exec-status`).
    ExecStatus {
        /// Pid returned by `exec`.
        pid: i64,
    },

    /// Send an arbitrary command given as JSON.
    Raw {
        /// Command object, e.g. `{"execute":"guest-ping"}`.
        json: String,
    },
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
            error!(%err, "command failed");
            eprintln!("error: {err}");
            if matches!(err, AppError::Connection(_)) {
                eprintln!("Is the guest agent socket present and listening?");
            }
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(args: Cli) -> Result<()> {
    let overrides = ConfigOverrides {
        socket_path: args.socket,
        timeout_seconds: args.timeout,
        user: None,
    };
    let config = GlobalConfig::resolve(args.config.as_deref(), &overrides)?;

    let client = ChannelClient::from_config(&config.channel);
    let poller = ExecPoller::from_config(&config.poll);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(dispatch(args.command, &client, &poller))
}

async fn dispatch(command: Command, client: &ChannelClient, poller: &ExecPoller) -> Result<()> {
    let request = match command {
        Command::Ping => GuestCommand::ping(),
        Command::Info => GuestCommand::info(),
        Command::Exec { path, args, wait } => {
            let exec = GuestExecRequest::captured(path, args);
            if wait {
                let finished = poller.run(client, &exec).await?;
                println!("{}", finished.raw_status.trim());
                eprint!("{}", finished.outcome.stdout);
                if !finished.outcome.stderr.is_empty() {
                    eprint!("{}", finished.outcome.stderr);
                }
                return if finished.outcome.success() {
                    Ok(())
                } else {
                    Err(AppError::Operation(format!(
                        "process {} {}",
                        finished.outcome.pid,
                        finished.outcome.exit_description()
                    )))
                };
            }
            GuestCommand::guest_exec(&exec)?
        }
        Command::ExecStatus { pid } => GuestCommand::guest_exec_status(pid),
        Command::Raw { json } => GuestCommand::from_json_str(&json)?,
    };

    let raw = client.send_raw(&request).await?;
    println!("{}", raw.trim_end());

    // Surface agent-side errors through the exit code.
    GuestResponse::parse(&raw)?.into_result().map(|_| ())
}
