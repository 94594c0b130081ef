//! Built-in roles that need no external service.

use async_trait::async_trait;

use super::{LogEvent, Logger, LoggerAck, PlanRequest, Planner, TaskAssignment};
use crate::error::Result;

/// Planner that treats the whole goal as one task.
///
/// Round 1 yields the fallback assignment for the goal. Later rounds
/// re-issue every outstanding node as a replacement with the same pair,
/// file and focus, and yield nothing once no node is outstanding.
#[derive(Debug, Clone, Default)]
pub struct GoalPlanner;

#[async_trait]
impl Planner for GoalPlanner {
    async fn plan(&self, request: &PlanRequest) -> Result<Vec<TaskAssignment>> {
        if request.round <= 1 {
            return Ok(vec![TaskAssignment::fallback(&request.goal)]);
        }

        Ok(request
            .outstanding
            .iter()
            .map(|task| {
                let mut assignment = TaskAssignment::new(
                    task.producer_id.map(|id| id.0).unwrap_or(1),
                    task.reviewer_id.map(|id| id.0).unwrap_or(1),
                    task.description.clone(),
                )
                .replacing(task.id);
                assignment.file_path = task.file_path.clone();
                if let Some(focus) = &task.reviewer_focus {
                    assignment.reviewer_focus = focus.clone();
                }
                assignment
            })
            .collect())
    }
}

/// Logger that acknowledges and discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopLogger;

#[async_trait]
impl Logger for NoopLogger {
    async fn log(&self, _event: &LogEvent) -> Result<LoggerAck> {
        Ok(LoggerAck::ok("discarded"))
    }
}
