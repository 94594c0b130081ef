//! Deadline handling: no node is ever left pending or in progress.

use std::sync::Arc;
use std::time::Duration;

use hive::config::Timeouts;
use hive::core::TaskStatus;
use hive::Orchestrator;

use crate::fixtures::{
    assignment, Harness, Production, ScriptedPlanner, ScriptedProducer, ScriptedReviewer,
    StalledPlanner,
};

const SHORT: Duration = Duration::from_millis(50);

/// Test: Producer timeout
/// Given a producer slower than its deadline
/// Then the node is FAILED and never reviewed, while its sibling finishes
#[tokio::test]
async fn test_producer_timeout_fails_node() {
    let harness = Harness::new(
        ScriptedPlanner::new().round(
            1,
            vec![assignment(1, 1, "slow"), assignment(2, 2, "fast")],
        ),
        ScriptedProducer::new().on("slow", Production::Slow(Duration::from_secs(5))),
        ScriptedReviewer::new(),
    );
    let timeouts = Timeouts {
        producer: Some(SHORT),
        ..Timeouts::none()
    };

    let result = harness
        .run(
            harness
                .config("Race")
                .with_rounds(1)
                .with_pairs(2)
                .with_timeouts(timeouts),
        )
        .await;

    let slow = &result.tree.root.children[0];
    assert_eq!(slow.status, TaskStatus::Failed);
    assert!(slow
        .producer_output
        .as_ref()
        .unwrap()
        .message
        .contains("timed out"));
    assert!(slow.reviewer_output.is_none());
    assert_eq!(result.tree.root.children[1].status, TaskStatus::Approved);
    assert_eq!(harness.reviewer.requests().len(), 1);
}

/// Test: Reviewer timeout
/// Given a reviewer slower than its deadline
/// Then the node is REJECTED with comment "review timed out"
#[tokio::test]
async fn test_reviewer_timeout_rejects_node() {
    let harness = Harness::new(
        ScriptedPlanner::new().round(1, vec![assignment(1, 1, "essay")]),
        ScriptedProducer::new(),
        ScriptedReviewer::slow(Duration::from_secs(5)),
    );
    let timeouts = Timeouts {
        reviewer: Some(SHORT),
        ..Timeouts::none()
    };

    let result = harness
        .run(harness.config("Write").with_rounds(1).with_timeouts(timeouts))
        .await;

    let node = &result.tree.root.children[0];
    assert_eq!(node.status, TaskStatus::Rejected);
    assert_eq!(node.reviewer_output.as_ref().unwrap().comments, "review timed out");
    assert!(!node.reviewer_output.as_ref().unwrap().approved);
}

/// Test: Planner timeout
/// Given a planner that never answers
/// Then the fallback assignment for the whole goal runs
#[tokio::test]
async fn test_planner_timeout_uses_fallback() {
    let harness = Harness::new(
        ScriptedPlanner::new(),
        ScriptedProducer::new(),
        ScriptedReviewer::new(),
    );
    let timeouts = Timeouts {
        planner: Some(SHORT),
        ..Timeouts::none()
    };

    let result = Orchestrator::new(
        harness
            .config("Write test code")
            .with_rounds(1)
            .with_timeouts(timeouts),
        Arc::new(StalledPlanner),
        harness.producer.clone(),
        harness.reviewer.clone(),
        harness.logger.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(result.tree.root.children.len(), 1);
    assert_eq!(result.tree.root.children[0].description, "Write test code");
    assert_eq!(result.tree.root.children[0].status, TaskStatus::Approved);
    assert_eq!(harness.producer.descriptions(), vec!["Write test code"]);
}
