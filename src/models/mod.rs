//! Wire model declarations for the guest agent protocol.

pub mod command;
pub mod exec;
pub mod response;

pub use command::GuestCommand;
pub use exec::{ExecOutcome, GuestExecPid, GuestExecRequest, GuestExecStatus};
pub use response::{GuestError, GuestResponse};
