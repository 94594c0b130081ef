pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod roles;
pub mod state;
pub mod util;

pub use error::{Error, Result};
pub use orchestration::{Orchestrator, RunResult, StopReason};
