//! Core domain models for hive orchestration.
//!
//! This module contains the task node and the task tree that the
//! orchestrator builds and mutates across rounds.

pub mod task;
pub mod tree;

pub use task::{Metadata, MetadataValue, TaskId, TaskNode, TaskStatus, WorkerId};
pub use tree::{PreOrder, StatusCounts, TaskTree};
