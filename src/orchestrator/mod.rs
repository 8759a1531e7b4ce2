//! Orchestration layered on top of the control channel.

pub mod apikey;
pub mod exec_poller;

pub use apikey::{create_api_key, ApiKeyOutput};
pub use exec_poller::{ExecPoller, FinishedExec};
