//! Logger failures must never change what the run decides.

use std::sync::Arc;

use hive::core::TaskStatus;
use hive::roles::{LogEvent, Logger, NoopLogger};
use hive::{Orchestrator, RunResult};

use crate::fixtures::{
    assignment, FailingLogger, Harness, Production, ScriptedPlanner, ScriptedProducer,
    ScriptedReviewer,
};

fn mixed_harness() -> Harness {
    Harness::new(
        ScriptedPlanner::new().round(
            1,
            vec![
                assignment(1, 1, "good"),
                assignment(2, 2, "bad"),
                assignment(3, 3, "weak"),
            ],
        ),
        ScriptedProducer::new().on("bad", Production::Fail("no output".to_string())),
        ScriptedReviewer::new().rejecting("weak"),
    )
}

async fn run_with(harness: &Harness, logger: Arc<dyn Logger>) -> RunResult {
    Orchestrator::new(
        harness.config("Logger check").with_rounds(1),
        harness.planner.clone(),
        harness.producer.clone(),
        harness.reviewer.clone(),
        logger,
    )
    .run()
    .await
    .expect("run should complete")
}

/// Test: Failing logger
/// Given an always-failing logger
/// Then status counts equal those of a no-op logger
#[tokio::test]
async fn test_failing_logger_matches_noop_logger() {
    let failing = run_with(&mixed_harness(), Arc::new(FailingLogger)).await;
    let noop = run_with(&mixed_harness(), Arc::new(NoopLogger)).await;

    assert_eq!(failing.counts, noop.counts);
    assert_eq!(failing.stop_reason, noop.stop_reason);
    assert_eq!(failing.summaries, noop.summaries);
    assert_eq!(failing.events.len(), noop.events.len());

    let statuses = |result: &RunResult| -> Vec<TaskStatus> {
        result
            .tree
            .root
            .children
            .iter()
            .map(|child| child.status)
            .collect()
    };
    assert_eq!(statuses(&failing), statuses(&noop));
    assert_eq!(
        statuses(&failing),
        vec![TaskStatus::Approved, TaskStatus::Failed, TaskStatus::Rejected]
    );
}

/// Test: Event stream
/// Every event handed to the logger is also returned, one per node in
/// planner order followed by the round summary.
#[tokio::test]
async fn test_events_match_logger_input() {
    let harness = mixed_harness();
    let result = harness.run(harness.config("Logger check").with_rounds(1)).await;

    let logged = harness.logger.events();
    assert_eq!(logged, result.events);
    assert_eq!(logged.len(), 4);

    for (event, expected) in logged.iter().zip(["good", "bad", "weak"]) {
        match event {
            LogEvent::TaskFinished {
                description,
                status,
                round,
                ..
            } => {
                assert_eq!(description, expected);
                assert!(status.is_terminal());
                assert_eq!(*round, 1);
            }
            other => panic!("expected TaskFinished, got {:?}", other),
        }
    }

    match &logged[3] {
        LogEvent::RoundFinished {
            round,
            counts,
            summary,
            ..
        } => {
            assert_eq!(*round, 1);
            assert_eq!(counts.total(), 3);
            assert_eq!(summary, "Round 1 completed: 1 approved, 1 rejected, 1 failed");
        }
        other => panic!("expected RoundFinished, got {:?}", other),
    }
}

/// Test: Logged node carries its outputs
#[tokio::test]
async fn test_task_event_carries_outputs() {
    let harness = mixed_harness();
    harness.run(harness.config("Logger check").with_rounds(1)).await;

    let events = harness.logger.events();
    let LogEvent::TaskFinished {
        producer_output,
        reviewer_output,
        parent_id,
        ..
    } = &events[0]
    else {
        panic!("expected TaskFinished first");
    };
    assert!(producer_output.as_ref().unwrap().is_success());
    assert!(reviewer_output.as_ref().unwrap().approved);
    assert!(parent_id.is_some());

    let LogEvent::TaskFinished {
        reviewer_output, ..
    } = &events[1]
    else {
        panic!("expected TaskFinished second");
    };
    assert!(reviewer_output.is_none());
}
