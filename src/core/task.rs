//! Task node data model for the decomposition tree.
//!
//! A `TaskNode` is one unit of work. It owns its children, tracks its
//! assignment to a producer/reviewer pair, and moves forward through a
//! fixed status machine as the orchestrator records role results on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::roles::{ProducerOutput, ReviewerOutput, RoleKind};

/// Unique identifier for a task node.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Integer identifier of a producer or reviewer worker.
///
/// Several tasks may share a worker id within one round; pool sizing is
/// the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u32);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task status in its lifecycle.
///
/// `Completed` means the producer finished and the node awaits review.
/// `Approved` and `Rejected` are the post-review terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Approved,
    Rejected,
}

impl TaskStatus {
    /// Whether the forward edge `self -> target` exists.
    pub fn can_transition(self, target: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, target),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Completed, Approved)
                | (Completed, Rejected)
        )
    }

    /// Terminal for the current round: nothing more happens to the node
    /// until a later round plans a replacement.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Failed | TaskStatus::Approved | TaskStatus::Rejected
        )
    }

    /// Failed or rejected work that a later round may re-plan.
    pub fn needs_rework(self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Rejected)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// A metadata value. Restricted to kinds that serialize cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    String(String),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        MetadataValue::Number(f64::from(value))
    }
}

/// Extension fields attached to a node.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single node in the task tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
    pub assigned_producer_id: Option<WorkerId>,
    pub assigned_reviewer_id: Option<WorkerId>,
    pub file_path: Option<PathBuf>,
    pub producer_output: Option<ProducerOutput>,
    pub reviewer_output: Option<ReviewerOutput>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub children: Vec<TaskNode>,
    pub parent_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskNode {
    /// Create a pending node with a fresh id.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            description: description.into(),
            status: TaskStatus::Pending,
            assigned_producer_id: None,
            assigned_reviewer_id: None,
            file_path: None,
            producer_output: None,
            reviewer_output: None,
            metadata: Metadata::new(),
            children: Vec::new(),
            parent_id: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Attach `child` as the last child of this node.
    ///
    /// Not idempotent: attaching the same node twice yields two children.
    pub fn add_child(&mut self, mut child: TaskNode) {
        child.parent_id = Some(self.id);
        self.children.push(child);
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Record the producer/reviewer pair. Assignment happens once.
    pub fn assign(&mut self, producer: WorkerId, reviewer: WorkerId) -> Result<()> {
        if self.assigned_producer_id.is_some() || self.assigned_reviewer_id.is_some() {
            return Err(Error::AlreadyAssigned(self.id));
        }
        self.assigned_producer_id = Some(producer);
        self.assigned_reviewer_id = Some(reviewer);
        Ok(())
    }

    fn transition(&mut self, target: TaskStatus) -> Result<()> {
        if !self.status.can_transition(target) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }

    /// PENDING -> IN_PROGRESS, called right before the producer runs.
    pub fn start(&mut self) -> Result<()> {
        self.transition(TaskStatus::InProgress)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Store the producer result and move to COMPLETED or FAILED.
    pub fn record_production(&mut self, output: ProducerOutput) -> Result<()> {
        if self.producer_output.is_some() {
            return Err(Error::OutputAlreadySet {
                task: self.id,
                role: RoleKind::Producer,
            });
        }
        let target = if output.is_success() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        self.transition(target)?;
        self.producer_output = Some(output);
        if target == TaskStatus::Failed {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Store the review verdict and move to APPROVED or REJECTED.
    ///
    /// Only legal on a COMPLETED node, so a review can never land on a
    /// node whose production failed or never ran.
    pub fn record_review(&mut self, output: ReviewerOutput) -> Result<()> {
        if self.reviewer_output.is_some() {
            return Err(Error::OutputAlreadySet {
                task: self.id,
                role: RoleKind::Reviewer,
            });
        }
        let target = if output.approved {
            TaskStatus::Approved
        } else {
            TaskStatus::Rejected
        };
        self.transition(target)?;
        self.reviewer_output = Some(output);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<MetadataValue>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetadataValue::as_str)
    }
}

impl Drop for TaskNode {
    /// Unlinks descendants onto a heap stack so dropping a deep chain
    /// does not recurse once per level.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}
