use thiserror::Error;

use crate::core::TaskId;
use crate::roles::RoleKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Task already assigned: {0}")]
    AlreadyAssigned(TaskId),

    #[error("{role} output already recorded for task {task}")]
    OutputAlreadySet { task: TaskId, role: RoleKind },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("{role} error: {message}")]
    Role { role: RoleKind, message: String },
}

impl Error {
    /// Shorthand for a collaborator failure.
    pub fn role(role: RoleKind, message: impl Into<String>) -> Self {
        Self::Role {
            role,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
