#![forbid(unsafe_code)]

//! Client for the QEMU guest agent control channel.
//!
//! The [`channel`] module implements the request/response exchange over the
//! agent's local socket, [`models`] holds the typed wire payloads, and
//! [`orchestrator`] builds process execution and API key creation on top.

pub mod channel;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod orchestrator;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
