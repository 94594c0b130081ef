//! Role executors: the typed boundary between the orchestrator and
//! whatever actually plans, produces, reviews and records work.
//!
//! Each role is a trait with exactly one capability method. Concrete
//! implementations are injected into the orchestrator at construction,
//! so a role may be backed by an external command, a local heuristic,
//! or a scripted double in tests.

mod builtin;
mod command;
mod journal;
mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use builtin::{GoalPlanner, NoopLogger};
pub use command::{CommandRole, DEFAULT_COMMAND_TIMEOUT_SECS};
pub use journal::{JsonlLogger, EVENTS_FILE_NAME};
pub use types::{
    LogEvent, LoggerAck, OutstandingTask, PlanRequest, ProduceRequest, ProducerOutput,
    ProducerStatus, ReviewRequest, ReviewStatus, ReviewerOutput, RoleKind, TaskAssignment,
};

/// Decomposes the goal, or the previous round's leftovers, into assignments.
///
/// An empty list means nothing further needs doing.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &PlanRequest) -> Result<Vec<TaskAssignment>>;
}

/// Performs the work for one task. May write to the workspace.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, request: &ProduceRequest) -> Result<ProducerOutput>;
}

/// Judges a producer's output. Must give the same verdict for the same input.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewerOutput>;
}

/// Records audit events. Failures here never affect the run.
#[async_trait]
pub trait Logger: Send + Sync {
    async fn log(&self, event: &LogEvent) -> Result<LoggerAck>;
}
