//! Orchestration: the per-run coordinator and its outcome types.

mod orchestrator;

pub use orchestrator::{Orchestrator, RunResult, StopReason};
