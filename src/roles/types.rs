//! Request and response records exchanged with role executors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::{StatusCounts, TaskId, TaskNode, TaskStatus, WorkerId};

/// The four collaborator roles the orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Planner,
    Producer,
    Reviewer,
    Logger,
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleKind::Planner => write!(f, "planner"),
            RoleKind::Producer => write!(f, "producer"),
            RoleKind::Reviewer => write!(f, "reviewer"),
            RoleKind::Logger => write!(f, "logger"),
        }
    }
}

/// One unit of work handed out by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub producer_id: WorkerId,
    pub reviewer_id: WorkerId,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    pub producer_instruction: String,
    #[serde(default)]
    pub reviewer_focus: String,
    /// Attach under this node instead of the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    /// Failed or rejected node this assignment re-plans. The new node
    /// becomes a sibling of it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaces: Option<TaskId>,
}

impl TaskAssignment {
    pub fn new(producer_id: u32, reviewer_id: u32, instruction: impl Into<String>) -> Self {
        Self {
            producer_id: WorkerId(producer_id),
            reviewer_id: WorkerId(reviewer_id),
            file_path: None,
            producer_instruction: instruction.into(),
            reviewer_focus: String::new(),
            parent_id: None,
            replaces: None,
        }
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.reviewer_focus = focus.into();
        self
    }

    pub fn under(mut self, parent: TaskId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn replacing(mut self, id: TaskId) -> Self {
        self.replaces = Some(id);
        self
    }

    /// The single assignment used when planning produced nothing usable.
    pub fn fallback(goal: &str) -> Self {
        Self::new(1, 1, goal).with_focus("overall correctness and completeness")
    }

    /// An assignment with a blank instruction cannot be executed.
    pub fn is_well_formed(&self) -> bool {
        !self.producer_instruction.trim().is_empty()
    }
}

/// A failed or rejected node reported back to the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingTask {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
    pub file_path: Option<PathBuf>,
    pub producer_id: Option<WorkerId>,
    pub reviewer_id: Option<WorkerId>,
    pub reviewer_focus: Option<String>,
    /// Reviewer comments for rejections, producer message for failures.
    pub feedback: Option<String>,
}

impl OutstandingTask {
    pub fn from_node(node: &TaskNode) -> Self {
        let feedback = match node.status {
            TaskStatus::Rejected => node.reviewer_output.as_ref().map(|r| r.comments.clone()),
            _ => node.producer_output.as_ref().map(|p| p.message.clone()),
        };
        Self {
            id: node.id,
            description: node.description.clone(),
            status: node.status,
            file_path: node.file_path.clone(),
            producer_id: node.assigned_producer_id,
            reviewer_id: node.assigned_reviewer_id,
            reviewer_focus: node.metadata_str("reviewer_focus").map(str::to_string),
            feedback,
        }
    }
}

/// Planner input: the goal plus what the tree already knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    pub round: u32,
    /// Failed and rejected nodes of the previous round. Empty in round 1.
    pub outstanding: Vec<OutstandingTask>,
    /// Descriptions of work already approved.
    pub approved: Vec<String>,
    /// One line per finished round.
    pub summaries: Vec<String>,
}

/// Producer input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceRequest {
    pub task_id: TaskId,
    pub round: u32,
    pub description: String,
    pub assignment: TaskAssignment,
    pub project_path: PathBuf,
    /// Feedback on the node this task replaces, if any.
    pub previous_feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerStatus {
    Success,
    Error,
}

/// Producer result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerOutput {
    pub status: ProducerStatus,
    pub message: String,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub artifact: Option<String>,
}

impl ProducerOutput {
    pub fn success(message: impl Into<String>, file_path: Option<PathBuf>) -> Self {
        Self {
            status: ProducerStatus::Success,
            message: message.into(),
            file_path,
            artifact: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ProducerStatus::Error,
            message: message.into(),
            file_path: None,
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ProducerStatus::Success
    }
}

/// Reviewer input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub task_id: TaskId,
    pub round: u32,
    pub description: String,
    pub file_path: Option<PathBuf>,
    pub reviewer_focus: String,
    pub producer_output: ProducerOutput,
    pub project_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    Rejected,
}

/// Reviewer verdict. The `approved` flag decides the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerOutput {
    pub status: ReviewStatus,
    pub comments: String,
    pub approved: bool,
}

impl ReviewerOutput {
    pub fn approved(comments: impl Into<String>) -> Self {
        Self {
            status: ReviewStatus::Approved,
            comments: comments.into(),
            approved: true,
        }
    }

    pub fn rejected(comments: impl Into<String>) -> Self {
        Self {
            status: ReviewStatus::Rejected,
            comments: comments.into(),
            approved: false,
        }
    }
}

/// Logger reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerAck {
    pub status: String,
    pub message: String,
}

impl LoggerAck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }
}

/// Audit event handed to the logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    /// A node reached a round-terminal status.
    TaskFinished {
        round: u32,
        task_id: TaskId,
        parent_id: Option<TaskId>,
        description: String,
        file_path: Option<PathBuf>,
        status: TaskStatus,
        producer_id: Option<WorkerId>,
        reviewer_id: Option<WorkerId>,
        producer_output: Option<ProducerOutput>,
        reviewer_output: Option<ReviewerOutput>,
        at: DateTime<Utc>,
    },
    /// All of a round's tasks are settled.
    RoundFinished {
        round: u32,
        counts: StatusCounts,
        summary: String,
        at: DateTime<Utc>,
    },
}

impl LogEvent {
    pub fn task_finished(round: u32, node: &TaskNode) -> Self {
        LogEvent::TaskFinished {
            round,
            task_id: node.id,
            parent_id: node.parent_id,
            description: node.description.clone(),
            file_path: node.file_path.clone(),
            status: node.status,
            producer_id: node.assigned_producer_id,
            reviewer_id: node.assigned_reviewer_id,
            producer_output: node.producer_output.clone(),
            reviewer_output: node.reviewer_output.clone(),
            at: Utc::now(),
        }
    }

    pub fn round_finished(round: u32, counts: StatusCounts, summary: impl Into<String>) -> Self {
        LogEvent::RoundFinished {
            round,
            counts,
            summary: summary.into(),
            at: Utc::now(),
        }
    }

    pub fn round(&self) -> u32 {
        match self {
            LogEvent::TaskFinished { round, .. } | LogEvent::RoundFinished { round, .. } => *round,
        }
    }

    /// The node this event is about, for task events.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            LogEvent::TaskFinished { task_id, .. } => Some(*task_id),
            LogEvent::RoundFinished { .. } => None,
        }
    }
}
