//! Snapshots, resume and the event journal.

use std::sync::Arc;

use hive::core::TaskStatus;
use hive::roles::{JsonlLogger, LogEvent, EVENTS_FILE_NAME};
use hive::state::{RunSnapshot, STATE_FILE_NAME};
use hive::{Orchestrator, StopReason};

use crate::fixtures::{assignment, Harness, ScriptedPlanner, ScriptedProducer, ScriptedReviewer};

/// Test: Snapshot after each round
/// Given persistence enabled
/// Then the project holds a snapshot of the last completed round
#[tokio::test]
async fn test_snapshot_written_after_round() {
    let harness = Harness::new(
        ScriptedPlanner::new().round(1, vec![assignment(1, 1, "part")]),
        ScriptedProducer::new(),
        ScriptedReviewer::new(),
    );

    let result = harness
        .run(harness.config("Persist me").with_persist_state(true))
        .await;

    assert!(harness.project.path().join(STATE_FILE_NAME).exists());
    let snapshot = RunSnapshot::load(harness.project.path())
        .await
        .unwrap()
        .expect("snapshot should exist");
    assert_eq!(snapshot.goal, "Persist me");
    assert_eq!(snapshot.round, 1);
    assert_eq!(snapshot.tree, result.tree);
    assert_eq!(snapshot.summaries, result.summaries);
}

/// Test: Persistence disabled
#[tokio::test]
async fn test_no_snapshot_when_disabled() {
    let harness = Harness::new(
        ScriptedPlanner::new().round(1, vec![assignment(1, 1, "part")]),
        ScriptedProducer::new(),
        ScriptedReviewer::new(),
    );

    harness
        .run(harness.config("Ephemeral").with_persist_state(false))
        .await;

    assert!(RunSnapshot::load(harness.project.path())
        .await
        .unwrap()
        .is_none());
}

/// Test: Resume
/// Given a one-round run that left a rejection behind
/// When a second run resumes it with rounds = 2
/// Then only round 2 is planned and it sees the round-1 rejection
#[tokio::test]
async fn test_resume_continues_next_round() {
    let first = Harness::new(
        ScriptedPlanner::new().round(1, vec![assignment(1, 1, "draft")]),
        ScriptedProducer::new(),
        ScriptedReviewer::new().rejecting("draft"),
    );
    first
        .run(
            first
                .config("Write a report")
                .with_rounds(1)
                .with_persist_state(true),
        )
        .await;
    let snapshot = RunSnapshot::load_sync(first.project.path())
        .unwrap()
        .unwrap();
    let rejected_id = snapshot.tree.root.children[0].id;

    let second = Harness::new(
        ScriptedPlanner::new().otherwise(|request| {
            request
                .outstanding
                .iter()
                .map(|task| assignment(1, 1, "final").replacing(task.id))
                .collect()
        }),
        ScriptedProducer::new(),
        ScriptedReviewer::new(),
    );
    let config = second
        .config("Write a report")
        .with_rounds(2)
        .with_persist_state(true);
    let result = second
        .orchestrator(config)
        .resume(snapshot)
        .run()
        .await
        .unwrap();

    let requests = second.planner.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].round, 2);
    assert_eq!(requests[0].outstanding[0].id, rejected_id);
    assert_eq!(requests[0].summaries.len(), 1);

    assert_eq!(result.planning_cycles, 1);
    assert_eq!(result.last_round, 2);
    assert_eq!(result.summaries.len(), 2);
    assert_eq!(result.stop_reason, StopReason::AllApproved);

    let children = &result.tree.root.children;
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].status, TaskStatus::Rejected);
    assert_eq!(children[1].status, TaskStatus::Approved);

    let saved = RunSnapshot::load_sync(second.project.path())
        .unwrap()
        .unwrap();
    assert_eq!(saved.round, 2);
}

/// Test: Resume past the limit
/// Given a snapshot that already covers the configured rounds
/// Then the run returns at once without planning
#[tokio::test]
async fn test_resume_at_limit_does_nothing() {
    let harness = Harness::new(
        ScriptedPlanner::new().round(1, vec![assignment(1, 1, "x")]),
        ScriptedProducer::new(),
        ScriptedReviewer::new().rejecting("x"),
    );
    let first = harness
        .run(harness.config("Done already").with_rounds(1))
        .await;
    let snapshot = RunSnapshot::new(
        "Done already",
        harness.project.path(),
        first.last_round,
        first.summaries.clone(),
        first.tree.clone(),
    );

    let result = harness
        .orchestrator(harness.config("Done already").with_rounds(1))
        .resume(snapshot)
        .run()
        .await
        .unwrap();

    assert_eq!(result.stop_reason, StopReason::RoundLimit);
    assert_eq!(result.planning_cycles, 0);
    assert_eq!(result.rounds_run, 0);
    assert_eq!(result.tree, first.tree);
    assert_eq!(harness.planner.requests().len(), 1);
}

/// Test: JSON Lines journal
/// Given the journal logger
/// Then every event lands as one parseable line in the project
#[tokio::test]
async fn test_jsonl_journal_records_run() {
    let harness = Harness::new(
        ScriptedPlanner::new().round(1, vec![assignment(1, 1, "a"), assignment(1, 1, "b")]),
        ScriptedProducer::new(),
        ScriptedReviewer::new(),
    );
    let journal = Arc::new(JsonlLogger::in_project(harness.project.path()));

    let result = Orchestrator::new(
        harness.config("Journal"),
        harness.planner.clone(),
        harness.producer.clone(),
        harness.reviewer.clone(),
        journal.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(journal.path(), harness.project.path().join(EVENTS_FILE_NAME));
    let content = std::fs::read_to_string(journal.path()).unwrap();
    let events: Vec<LogEvent> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events, result.events);
    assert_eq!(events.len(), 3);
    assert!(matches!(events[2], LogEvent::RoundFinished { .. }));
}
