//! Process-backed role adapter.
//!
//! Runs an external command per invocation, writes the JSON request to
//! its stdin and parses the JSON reply from its stdout. Any executable
//! that speaks this contract can serve as a planner, producer, reviewer
//! or logger.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{
    LogEvent, Logger, LoggerAck, PlanRequest, Planner, ProduceRequest, Producer, ProducerOutput,
    ReviewRequest, Reviewer, ReviewerOutput, RoleKind, TaskAssignment,
};
use crate::error::{Error, Result};
use crate::{hlog_debug, hlog_trace};

/// Default per-invocation timeout in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 900;

/// Planner replies may be a bare list or wrapped in `{"tasks": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlanReply {
    List(Vec<TaskAssignment>),
    Wrapped { tasks: Vec<TaskAssignment> },
}

/// An external command acting as one role.
#[derive(Debug, Clone)]
pub struct CommandRole {
    role: RoleKind,
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

impl CommandRole {
    pub fn new(role: RoleKind, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            role,
            program: program.into(),
            args,
            cwd: None,
            timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    /// Build from a whitespace-separated command line.
    pub fn from_command_line(role: RoleKind, line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| Error::Validation(format!("empty {} command", role)))?;
        Ok(Self::new(role, program, parts.collect()))
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn role(&self) -> RoleKind {
        self.role
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the command once with `request` on stdin.
    async fn invoke<Req, Resp>(&self, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)?;
        hlog_debug!(
            "CommandRole[{}]: running {} ({} bytes in)",
            self.role,
            self.program,
            payload.len()
        );

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("HIVE_ROLE", self.role.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn()?;
        let stdin = child.stdin.take();
        let role = self.role;
        // Feed stdin while stdout is drained so neither side can stall on a
        // full pipe. The pipe closes when `stdin` drops at the end.
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&payload).await {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    hlog_debug!(
                        "CommandRole[{}]: stdin closed before the request was read",
                        role
                    );
                    Ok(())
                }
                other => other,
            }
        };

        // Dropping the child on timeout kills it.
        let (fed, output) = tokio::time::timeout(self.timeout, async move {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        .map_err(|_| Error::Timeout(self.timeout))?;
        let output = output?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        hlog_trace!("CommandRole[{}]: stdout={}", self.role, stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!(
                    "{} exited with code {}",
                    self.program,
                    output.status.code().unwrap_or(-1)
                )
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::role(self.role, message));
        }
        fed?;

        serde_json::from_str(stdout.trim())
            .map_err(|e| Error::role(self.role, format!("unparsable reply: {}", e)))
    }
}

#[async_trait]
impl Planner for CommandRole {
    async fn plan(&self, request: &PlanRequest) -> Result<Vec<TaskAssignment>> {
        let reply: PlanReply = self.invoke(request).await?;
        Ok(match reply {
            PlanReply::List(tasks) | PlanReply::Wrapped { tasks } => tasks,
        })
    }
}

#[async_trait]
impl Producer for CommandRole {
    async fn produce(&self, request: &ProduceRequest) -> Result<ProducerOutput> {
        self.invoke(request).await
    }
}

#[async_trait]
impl Reviewer for CommandRole {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewerOutput> {
        self.invoke(request).await
    }
}

#[async_trait]
impl Logger for CommandRole {
    async fn log(&self, event: &LogEvent) -> Result<LoggerAck> {
        self.invoke(event).await
    }
}
