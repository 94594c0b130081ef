//! Append-only JSON Lines event journal.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{LogEvent, Logger, LoggerAck};
use crate::error::Result;

/// Default journal file name inside the project directory.
pub const EVENTS_FILE_NAME: &str = "hive_events.jsonl";

/// Logger writing one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlLogger {
    path: PathBuf,
}

impl JsonlLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Journal at `<project>/hive_events.jsonl`.
    pub fn in_project(project_path: &Path) -> Self {
        Self::new(project_path.join(EVENTS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Logger for JsonlLogger {
    async fn log(&self, event: &LogEvent) -> Result<LoggerAck> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(LoggerAck::ok(format!("appended to {}", self.path.display())))
    }
}
