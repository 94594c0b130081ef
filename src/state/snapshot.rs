use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::TaskTree;
use crate::util::blocking;
use crate::{hlog_debug, Error, Result};

pub const STATE_FILE_NAME: &str = "hive_state.json";
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to continue a run after the last completed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub version: u32,
    pub goal: String,
    pub project_path: PathBuf,
    /// Last round that ran to completion.
    pub round: u32,
    pub summaries: Vec<String>,
    pub tree: TaskTree,
    pub saved_at: DateTime<Utc>,
}

impl RunSnapshot {
    pub fn new(
        goal: impl Into<String>,
        project_path: impl Into<PathBuf>,
        round: u32,
        summaries: Vec<String>,
        tree: TaskTree,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            goal: goal.into(),
            project_path: project_path.into(),
            round,
            summaries,
            tree,
            saved_at: Utc::now(),
        }
    }

    /// Snapshot location for a project.
    pub fn path_in(project_path: &Path) -> PathBuf {
        project_path.join(STATE_FILE_NAME)
    }

    pub async fn load(project_path: &Path) -> Result<Option<Self>> {
        let project_path = project_path.to_path_buf();
        blocking(move || Self::load_sync(&project_path)).await
    }

    /// Read the snapshot, or `None` when the project has none.
    pub fn load_sync(project_path: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(project_path);
        hlog_debug!("RunSnapshot::load path={}", path.display());

        if !path.exists() {
            hlog_debug!("No snapshot found");
            return Ok(None);
        }

        let snapshot: Self = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(Error::Validation(format!(
                "snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        hlog_debug!(
            "Snapshot loaded: round={}, nodes={}",
            snapshot.round,
            snapshot.tree.len()
        );
        Ok(Some(snapshot))
    }

    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        let project_path = self.project_path.clone();
        blocking(move || write_atomic(&project_path, &contents)).await
    }

    pub fn save_sync(&self) -> Result<()> {
        write_atomic(&self.project_path, &serde_json::to_string_pretty(self)?)
    }
}

fn write_atomic(project_path: &Path, contents: &str) -> Result<()> {
    if !project_path.exists() {
        hlog_debug!("Creating project directory: {}", project_path.display());
        fs::create_dir_all(project_path)?;
    }
    let path = RunSnapshot::path_in(project_path);
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, &path)?;
    hlog_debug!("Snapshot saved: {}", path.display());
    Ok(())
}
