//! Round-based coordinator driving planner, producers, reviewers and logger.
//!
//! Each round the planner is asked for assignments, every assignment
//! becomes a new node in the tree, and the produce-then-review pipelines
//! run concurrently up to the configured number of pairs. Pipelines only
//! return outcomes; the coordinator applies them to the tree in planner
//! order once the whole batch is done.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{RunConfig, Timeouts};
use crate::core::{MetadataValue, StatusCounts, TaskId, TaskNode, TaskStatus, TaskTree};
use crate::roles::{
    LogEvent, Logger, OutstandingTask, PlanRequest, Planner, ProduceRequest, Producer,
    ProducerOutput, ReviewRequest, Reviewer, ReviewerOutput, TaskAssignment,
};
use crate::state::RunSnapshot;
use crate::util::{truncate, with_deadline};
use crate::{hlog, hlog_debug, hlog_warn, Error, Result};

const ROUND_KEY: &str = "round";
const FOCUS_KEY: &str = "reviewer_focus";
const REPLACES_KEY: &str = "replaces";

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every node created in the last round was approved.
    AllApproved,
    /// The planner returned no assignments.
    PlannerExhausted,
    /// The configured number of rounds ran out.
    RoundLimit,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::AllApproved => "all approved",
            StopReason::PlannerExhausted => "planner exhausted",
            StopReason::RoundLimit => "round limit reached",
            StopReason::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a run. Partial success is a normal result.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub tree: TaskTree,
    /// Every event handed to the logger, in emission order.
    pub events: Vec<LogEvent>,
    /// Rounds that executed at least one assignment.
    pub rounds_run: u32,
    pub planning_cycles: u32,
    /// Last round reached, counting rounds restored from a snapshot.
    pub last_round: u32,
    pub stop_reason: StopReason,
    pub summaries: Vec<String>,
    /// Per-status counts over the final tree's leaves.
    pub counts: StatusCounts,
}

/// A dispatched assignment, ready to run outside the tree.
struct Job {
    task_id: TaskId,
    round: u32,
    description: String,
    assignment: TaskAssignment,
    previous_feedback: Option<String>,
}

/// What a pipeline reports back for one node.
struct Outcome {
    task_id: TaskId,
    production: ProducerOutput,
    review: Option<ReviewerOutput>,
}

/// Coordinates one run. Not shared: build one per goal.
pub struct Orchestrator {
    config: RunConfig,
    planner: Arc<dyn Planner>,
    producer: Arc<dyn Producer>,
    reviewer: Arc<dyn Reviewer>,
    logger: Arc<dyn Logger>,
    tree: TaskTree,
    summaries: Vec<String>,
    next_round: u32,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: RunConfig,
        planner: Arc<dyn Planner>,
        producer: Arc<dyn Producer>,
        reviewer: Arc<dyn Reviewer>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let tree = TaskTree::new(config.goal.clone());
        Self {
            config,
            planner,
            producer,
            reviewer,
            logger,
            tree,
            summaries: Vec::new(),
            next_round: 1,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop before the next round once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Continue from a persisted snapshot instead of a fresh tree.
    pub fn resume(mut self, snapshot: RunSnapshot) -> Self {
        hlog!(
            "Resuming '{}' after round {} ({} nodes)",
            truncate(&snapshot.goal, 60),
            snapshot.round,
            snapshot.tree.len()
        );
        self.tree = snapshot.tree;
        self.summaries = snapshot.summaries;
        self.next_round = snapshot.round + 1;
        self
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run rounds until every new node is approved, the planner has
    /// nothing left, the round limit is hit or the run is cancelled.
    pub async fn run(mut self) -> Result<RunResult> {
        self.config.validate()?;
        hlog!(
            "Starting run: goal='{}', pairs={}, rounds={}, first_round={}",
            truncate(&self.config.goal, 60),
            self.config.pairs,
            self.config.rounds,
            self.next_round
        );

        if self.tree.root.status == TaskStatus::Pending {
            self.tree.root.start()?;
        }

        let mut events = Vec::new();
        let mut planning_cycles = 0;
        let mut rounds_run = 0;
        let mut last_round = self.next_round.saturating_sub(1);
        let mut stop_reason = StopReason::RoundLimit;

        for round in self.next_round..=self.config.rounds {
            if self.cancel.is_cancelled() {
                hlog!("Run cancelled before round {}", round);
                stop_reason = StopReason::Cancelled;
                break;
            }

            planning_cycles += 1;
            let assignments = self.plan(round).await;
            if assignments.is_empty() {
                hlog!("Planner has no further assignments in round {}", round);
                stop_reason = StopReason::PlannerExhausted;
                break;
            }

            rounds_run += 1;
            last_round = round;
            let round_counts = self.run_round(round, assignments, &mut events).await?;

            if round_counts.all_approved() {
                hlog!("All {} tasks approved in round {}", round_counts.total(), round);
                stop_reason = StopReason::AllApproved;
                break;
            }
        }

        let counts = self.tree.leaf_counts();
        hlog!(
            "Run finished: {} after {} round(s), {}",
            stop_reason,
            rounds_run,
            counts
        );

        Ok(RunResult {
            tree: self.tree,
            events,
            rounds_run,
            planning_cycles,
            last_round,
            stop_reason,
            summaries: self.summaries,
            counts,
        })
    }

    /// Dispatch, execute, record and log one round. Returns the counts of
    /// the nodes this round created.
    async fn run_round(
        &mut self,
        round: u32,
        assignments: Vec<TaskAssignment>,
        events: &mut Vec<LogEvent>,
    ) -> Result<StatusCounts> {
        warn_on_shared_files(round, &assignments);

        let mut jobs = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            jobs.push(self.dispatch(round, assignment)?);
        }
        let round_ids: Vec<TaskId> = jobs.iter().map(|job| job.task_id).collect();
        hlog_debug!("Round {}: {} task(s) dispatched", round, round_ids.len());

        let outcomes = self.execute(jobs).await;

        for outcome in outcomes {
            self.apply(outcome)?;
        }

        for id in &round_ids {
            let node = self.tree.get_node(id).ok_or(Error::TaskNotFound(*id))?;
            let event = LogEvent::task_finished(round, node);
            self.emit(event, events).await;
        }

        let counts = StatusCounts::from_statuses(
            round_ids
                .iter()
                .filter_map(|id| self.tree.get_node(id))
                .map(|node| node.status),
        );
        let summary = format!(
            "Round {} completed: {} approved, {} rejected, {} failed",
            round, counts.approved, counts.rejected, counts.failed
        );
        hlog!("{}", summary);
        self.summaries.push(summary.clone());
        self.emit(LogEvent::round_finished(round, counts, summary), events)
            .await;

        self.persist(round).await;
        Ok(counts)
    }

    /// Ask the planner for this round's work, falling back to one generic
    /// assignment when planning fails. An empty result is terminal.
    async fn plan(&self, round: u32) -> Vec<TaskAssignment> {
        let request = self.plan_request(round);
        hlog_debug!(
            "Planning round {}: {} outstanding, {} approved",
            round,
            request.outstanding.len(),
            request.approved.len()
        );

        let fallback = || vec![TaskAssignment::fallback(&self.config.goal)];
        match with_deadline(self.config.timeouts.planner, self.planner.plan(&request)).await {
            Ok(assignments) if assignments.is_empty() => Vec::new(),
            Ok(assignments) => {
                let total = assignments.len();
                let usable: Vec<TaskAssignment> = assignments
                    .into_iter()
                    .filter(|a| {
                        if !a.is_well_formed() {
                            hlog_warn!("Dropping malformed assignment in round {}", round);
                        }
                        a.is_well_formed()
                    })
                    .collect();
                if usable.is_empty() {
                    hlog_warn!(
                        "All {} assignments in round {} were malformed, using fallback",
                        total,
                        round
                    );
                    return fallback();
                }
                usable
            }
            Err(e) => {
                hlog_warn!("Planner failed in round {}: {}, using fallback", round, e);
                fallback()
            }
        }
    }

    fn plan_request(&self, round: u32) -> PlanRequest {
        let outstanding = self
            .tree
            .iter()
            .filter(|node| node_round(node) == Some(round - 1) && node.status.needs_rework())
            .map(OutstandingTask::from_node)
            .collect();
        let approved = self
            .tree
            .iter()
            .filter(|node| node.status == TaskStatus::Approved)
            .map(|node| node.description.clone())
            .collect();

        PlanRequest {
            goal: self.config.goal.clone(),
            round,
            outstanding,
            approved,
            summaries: self.summaries.clone(),
        }
    }

    /// Create, attach and start the node for `assignment`.
    fn dispatch(&mut self, round: u32, assignment: TaskAssignment) -> Result<Job> {
        let mut node = TaskNode::new(assignment.producer_instruction.clone());
        node.file_path = assignment.file_path.clone();
        node.assign(assignment.producer_id, assignment.reviewer_id)?;
        node.set_metadata(ROUND_KEY, round);
        if !assignment.reviewer_focus.is_empty() {
            node.set_metadata(FOCUS_KEY, assignment.reviewer_focus.as_str());
        }

        let mut previous_feedback = None;
        if let Some(replaced) = assignment.replaces {
            node.set_metadata(REPLACES_KEY, replaced.to_string());
            previous_feedback = self
                .tree
                .get_node(&replaced)
                .and_then(|old| OutstandingTask::from_node(old).feedback);
        }

        let parent = self.parent_for(&assignment);
        let task_id = self.tree.attach(&parent, node)?;
        let node = self
            .tree
            .get_node_mut(&task_id)
            .ok_or(Error::TaskNotFound(task_id))?;
        node.start()?;

        hlog_debug!(
            "Dispatched {} (producer {}, reviewer {}): {}",
            task_id.short(),
            assignment.producer_id,
            assignment.reviewer_id,
            truncate(&node.description, 60)
        );

        Ok(Job {
            task_id,
            round,
            description: node.description.clone(),
            assignment,
            previous_feedback,
        })
    }

    /// Explicit parent if known, else the replaced node's parent, else root.
    fn parent_for(&self, assignment: &TaskAssignment) -> TaskId {
        let root = self.tree.root.id;
        if let Some(parent) = assignment.parent_id {
            if self.tree.get_node(&parent).is_some() {
                return parent;
            }
            hlog_warn!("Unknown parent {} in assignment, attaching to root", parent);
            return root;
        }
        if let Some(replaced) = assignment.replaces {
            match self.tree.get_node(&replaced) {
                Some(node) => return node.parent_id.unwrap_or(root),
                None => hlog_warn!("Replaced task {} not found, attaching to root", replaced),
            }
        }
        root
    }

    /// Run every job's pipeline, at most `pairs` at a time. Outcomes come
    /// back in job order.
    async fn execute(&self, jobs: Vec<Job>) -> Vec<Outcome> {
        let pairs = self.config.pairs.max(1);
        stream::iter(jobs.into_iter().map(|job| {
            let producer = Arc::clone(&self.producer);
            let reviewer = Arc::clone(&self.reviewer);
            run_pipeline(
                job,
                producer,
                reviewer,
                self.config.timeouts,
                self.config.project_path.clone(),
            )
        }))
        .buffered(pairs)
        .collect()
        .await
    }

    fn apply(&mut self, outcome: Outcome) -> Result<()> {
        let node = self
            .tree
            .get_node_mut(&outcome.task_id)
            .ok_or(Error::TaskNotFound(outcome.task_id))?;
        if node.file_path.is_none() {
            node.file_path = outcome.production.file_path.clone();
        }
        node.record_production(outcome.production)?;
        if let Some(review) = outcome.review {
            node.record_review(review)?;
        }
        hlog_debug!("Task {} finished as {}", node.id.short(), node.status);
        Ok(())
    }

    /// Hand `event` to the logger. Failures end up in the file log only.
    async fn emit(&self, event: LogEvent, events: &mut Vec<LogEvent>) {
        match with_deadline(self.config.timeouts.logger, self.logger.log(&event)).await {
            Ok(ack) if ack.is_error() => hlog_warn!(
                "Logger rejected round {} event: {}",
                event.round(),
                ack.message
            ),
            Ok(_) => {}
            Err(e) => hlog_warn!("Logger failed for round {} event: {}", event.round(), e),
        }
        events.push(event);
    }

    async fn persist(&self, round: u32) {
        if !self.config.persist_state {
            return;
        }
        let snapshot = RunSnapshot::new(
            self.config.goal.clone(),
            self.config.project_path.clone(),
            round,
            self.summaries.clone(),
            self.tree.clone(),
        );
        if let Err(e) = snapshot.save().await {
            hlog_warn!("Failed to save snapshot after round {}: {}", round, e);
        }
    }
}

/// Produce, then review on success. Never fails: errors become outputs.
async fn run_pipeline(
    job: Job,
    producer: Arc<dyn Producer>,
    reviewer: Arc<dyn Reviewer>,
    timeouts: Timeouts,
    project_path: PathBuf,
) -> Outcome {
    let request = ProduceRequest {
        task_id: job.task_id,
        round: job.round,
        description: job.description.clone(),
        assignment: job.assignment.clone(),
        project_path: project_path.clone(),
        previous_feedback: job.previous_feedback,
    };

    // Each stage runs on its own task so a panicking role only costs its node.
    let stage = tokio::spawn(async move {
        with_deadline(timeouts.producer, producer.produce(&request)).await
    });
    let production = match stage.await {
        Ok(Ok(output)) => output,
        Ok(Err(Error::Timeout(limit))) => {
            ProducerOutput::error(format!("producer timed out after {:?}", limit))
        }
        Ok(Err(e)) => ProducerOutput::error(e.to_string()),
        Err(e) => {
            hlog_warn!("Producer for task {} panicked: {}", job.task_id.short(), e);
            ProducerOutput::error(format!("producer panicked: {}", e))
        }
    };

    if !production.is_success() {
        hlog_debug!(
            "Task {} failed in production: {}",
            job.task_id.short(),
            truncate(&production.message, 80)
        );
        return Outcome {
            task_id: job.task_id,
            production,
            review: None,
        };
    }

    let request = ReviewRequest {
        task_id: job.task_id,
        round: job.round,
        description: job.description,
        file_path: production
            .file_path
            .clone()
            .or_else(|| job.assignment.file_path.clone()),
        reviewer_focus: job.assignment.reviewer_focus.clone(),
        producer_output: production.clone(),
        project_path,
    };

    let stage = tokio::spawn(async move {
        with_deadline(timeouts.reviewer, reviewer.review(&request)).await
    });
    let review = match stage.await {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(Error::Timeout(_))) => ReviewerOutput::rejected("review timed out"),
        Ok(Err(e)) => ReviewerOutput::rejected(format!("review failed: {}", e)),
        Err(e) => {
            hlog_warn!("Reviewer for task {} panicked: {}", job.task_id.short(), e);
            ReviewerOutput::rejected(format!("review failed: {}", e))
        }
    };

    Outcome {
        task_id: job.task_id,
        production,
        review: Some(review),
    }
}

fn node_round(node: &TaskNode) -> Option<u32> {
    node.metadata
        .get(ROUND_KEY)
        .and_then(MetadataValue::as_f64)
        .map(|round| round as u32)
}

/// Two assignments writing the same file in one round can clobber each
/// other. Reported, not resolved.
fn warn_on_shared_files(round: u32, assignments: &[TaskAssignment]) {
    let mut seen: HashMap<&Path, usize> = HashMap::new();
    for assignment in assignments {
        if let Some(path) = assignment.file_path.as_deref() {
            *seen.entry(path).or_default() += 1;
        }
    }
    for (path, count) in seen {
        if count > 1 {
            hlog_warn!(
                "Round {}: {} assignments target {}",
                round,
                count,
                path.display()
            );
        }
    }
}
