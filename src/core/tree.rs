//! The task tree: a single root goal owning its whole decomposition.
//!
//! Traversals use an explicit stack, and dropping a node unlinks its
//! descendants iteratively, so pathologically deep plans cannot exhaust
//! the call stack. Snapshots are the exception: `serde_json` refuses
//! nesting beyond 128 levels, which bounds the depth of a resumable tree.

use serde::{Deserialize, Serialize};

use super::task::{TaskId, TaskNode, TaskStatus};
use crate::error::{Error, Result};

/// Per-status tally of leaf nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Approved => self.approved += 1,
            TaskStatus::Rejected => self.rejected += 1,
        }
    }

    pub fn from_statuses(statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.record(status);
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.pending
            + self.in_progress
            + self.completed
            + self.failed
            + self.approved
            + self.rejected
    }

    /// True when there is at least one node and every node is approved.
    pub fn all_approved(&self) -> bool {
        self.total() > 0 && self.approved == self.total()
    }
}

impl std::fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} approved, {} rejected, {} failed",
            self.approved, self.rejected, self.failed
        )?;
        let open = self.pending + self.in_progress + self.completed;
        if open > 0 {
            write!(f, ", {} open", open)?;
        }
        Ok(())
    }
}

/// Pre-order, left-to-right iterator over a subtree.
pub struct PreOrder<'a> {
    stack: Vec<&'a TaskNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a TaskNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// The whole decomposition of one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTree {
    pub root: TaskNode,
}

impl TaskTree {
    /// Create a tree whose root describes the goal.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            root: TaskNode::new(goal),
        }
    }

    /// Iterate every node in pre-order, root first.
    pub fn iter(&self) -> PreOrder<'_> {
        iter_from(&self.root)
    }

    /// Depth-first lookup. Returns `None` for unknown ids.
    pub fn get_node(&self, id: &TaskId) -> Option<&TaskNode> {
        self.iter().find(|node| node.id == *id)
    }

    /// Mutable depth-first lookup with the same visiting order as `get_node`.
    pub fn get_node_mut(&mut self, id: &TaskId) -> Option<&mut TaskNode> {
        let mut stack: Vec<&mut TaskNode> = vec![&mut self.root];
        while let Some(node) = stack.pop() {
            if node.id == *id {
                return Some(node);
            }
            stack.extend(node.children.iter_mut().rev());
        }
        None
    }

    /// All childless nodes in pre-order. A childless root is its own leaf.
    pub fn get_leaves(&self) -> Vec<&TaskNode> {
        self.iter().filter(|node| node.is_leaf()).collect()
    }

    /// Attach `child` under the node `parent`, returning the child's id.
    pub fn attach(&mut self, parent: &TaskId, child: TaskNode) -> Result<TaskId> {
        let child_id = child.id;
        let parent = self
            .get_node_mut(parent)
            .ok_or(Error::TaskNotFound(*parent))?;
        parent.add_child(child);
        Ok(child_id)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_leaf()
    }

    /// Tally leaf statuses under `id`, aggregating results up the tree.
    pub fn rollup(&self, id: &TaskId) -> Option<StatusCounts> {
        let node = self.get_node(id)?;
        Some(StatusCounts::from_statuses(
            iter_from(node).filter(|n| n.is_leaf()).map(|n| n.status),
        ))
    }

    /// Tally of every leaf in the tree.
    pub fn leaf_counts(&self) -> StatusCounts {
        StatusCounts::from_statuses(self.get_leaves().into_iter().map(|n| n.status))
    }
}

fn iter_from(node: &TaskNode) -> PreOrder<'_> {
    PreOrder { stack: vec![node] }
}
