//! Guest agent control channel.
//!
//! Speaks the newline-delimited JSON convention of the QEMU guest agent over
//! a local stream socket: one request line, one response line, one
//! connection per exchange.

pub mod client;
pub mod codec;

pub use client::{send, ChannelClient};
