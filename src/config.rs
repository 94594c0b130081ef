use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::util::expand_tilde;
use crate::{hlog_debug, Error, Result};

pub const DEFAULT_PAIRS: usize = 1;
pub const DEFAULT_ROUNDS: u32 = 3;

/// External command lines for each role. Unset roles fall back to the
/// built-in implementations where one exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleCommands {
    pub planner: Option<String>,
    pub producer: Option<String>,
    pub reviewer: Option<String>,
    pub logger: Option<String>,
}

/// User configuration stored in `~/.hive/hive.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pairs: usize,
    pub rounds: u32,
    /// Timeouts in seconds; 0 disables the timeout.
    pub planner_timeout_secs: u64,
    pub producer_timeout_secs: u64,
    pub reviewer_timeout_secs: u64,
    pub logger_timeout_secs: u64,
    pub persist_state: bool,
    pub roles: RoleCommands,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_PAIRS,
            rounds: DEFAULT_ROUNDS,
            planner_timeout_secs: 300,
            producer_timeout_secs: 600,
            reviewer_timeout_secs: 300,
            logger_timeout_secs: 30,
            persist_state: true,
            roles: RoleCommands::default(),
        }
    }
}

impl Config {
    pub fn hive_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".hive"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::hive_dir()?.join("hive.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`, returning defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        hlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            hlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        hlog_debug!(
            "Config loaded: pairs={}, rounds={}, persist_state={}",
            config.pairs,
            config.rounds,
            config.persist_state
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                hlog_debug!("Creating config directory {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        hlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        fn secs(value: u64) -> Option<Duration> {
            (value > 0).then(|| Duration::from_secs(value))
        }
        Timeouts {
            planner: secs(self.planner_timeout_secs),
            producer: secs(self.producer_timeout_secs),
            reviewer: secs(self.reviewer_timeout_secs),
            logger: secs(self.logger_timeout_secs),
        }
    }

    /// Build a run configuration for `goal` with this file's defaults.
    pub fn run_config(&self, goal: &str, project_path: &str) -> RunConfig {
        RunConfig::new(goal, expand_tilde(project_path))
            .with_pairs(self.pairs)
            .with_rounds(self.rounds)
            .with_timeouts(self.timeouts())
            .with_persist_state(self.persist_state)
    }
}

/// Per-role call timeouts. `None` means wait indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub planner: Option<Duration>,
    pub producer: Option<Duration>,
    pub reviewer: Option<Duration>,
    pub logger: Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Config::default().timeouts()
    }
}

impl Timeouts {
    pub fn none() -> Self {
        Self {
            planner: None,
            producer: None,
            reviewer: None,
            logger: None,
        }
    }
}

/// Parameters of one orchestration run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub goal: String,
    /// Filesystem root for artifacts, the event journal and the snapshot.
    pub project_path: PathBuf,
    /// Producer/reviewer pairs, i.e. how many tasks run at once.
    pub pairs: usize,
    /// Maximum number of planning rounds.
    pub rounds: u32,
    pub timeouts: Timeouts,
    pub persist_state: bool,
}

impl RunConfig {
    pub fn new(goal: impl Into<String>, project_path: impl Into<PathBuf>) -> Self {
        Self {
            goal: goal.into(),
            project_path: project_path.into(),
            pairs: DEFAULT_PAIRS,
            rounds: DEFAULT_ROUNDS,
            timeouts: Timeouts::default(),
            persist_state: false,
        }
    }

    pub fn with_pairs(mut self, pairs: usize) -> Self {
        self.pairs = pairs;
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_persist_state(mut self, persist: bool) -> Self {
        self.persist_state = persist;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.goal.trim().is_empty() {
            return Err(Error::Validation("goal must not be empty".to_string()));
        }
        if self.rounds == 0 {
            return Err(Error::Validation("rounds must be at least 1".to_string()));
        }
        if self.pairs == 0 {
            return Err(Error::Validation("pairs must be at least 1".to_string()));
        }
        Ok(())
    }
}
