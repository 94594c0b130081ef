//! External command roles driven through a full run.
#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use hive::core::TaskStatus;
use hive::roles::{CommandRole, NoopLogger, RoleKind};
use hive::{Orchestrator, StopReason};
use tempfile::TempDir;

use crate::fixtures::{assignment, ScriptedPlanner};

fn sh(role: RoleKind, script: &str, cwd: &std::path::Path) -> CommandRole {
    CommandRole::new(role, "sh", vec!["-c".to_string(), script.to_string()])
        .with_cwd(cwd)
        .with_timeout(Duration::from_secs(10))
}

/// Test: Shell producer and reviewer
/// Given a producer script that writes a file and a reviewer that
/// approves only when the file exists
/// Then the node is APPROVED and the artifact is in the project
#[tokio::test]
async fn test_shell_roles_complete_task() {
    let project = TempDir::new().unwrap();
    let producer = sh(
        RoleKind::Producer,
        r#"cat > /dev/null; echo hello > out.txt; echo '{"status":"success","message":"wrote out.txt","file_path":"out.txt"}'"#,
        project.path(),
    );
    let reviewer = sh(
        RoleKind::Reviewer,
        r#"cat > /dev/null; if [ -f out.txt ]; then echo '{"status":"approved","comments":"file present","approved":true}'; else echo '{"status":"rejected","comments":"missing","approved":false}'; fi"#,
        project.path(),
    );

    let result = Orchestrator::new(
        hive::config::RunConfig::new("Write a greeting", project.path()),
        Arc::new(ScriptedPlanner::new().round(1, vec![assignment(1, 1, "greet")])),
        Arc::new(producer),
        Arc::new(reviewer),
        Arc::new(NoopLogger),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(result.stop_reason, StopReason::AllApproved);
    let node = &result.tree.root.children[0];
    assert_eq!(node.status, TaskStatus::Approved);
    assert_eq!(node.file_path.as_deref(), Some(std::path::Path::new("out.txt")));
    assert_eq!(node.reviewer_output.as_ref().unwrap().comments, "file present");
    assert!(project.path().join("out.txt").exists());
}

/// Test: Failing shell producer
/// Given a producer script that exits non-zero
/// Then the node is FAILED with the script's stderr
#[tokio::test]
async fn test_shell_producer_exit_code_fails_node() {
    let project = TempDir::new().unwrap();
    let producer = sh(
        RoleKind::Producer,
        "cat > /dev/null; echo 'out of disk' >&2; exit 2",
        project.path(),
    );
    let reviewer = sh(
        RoleKind::Reviewer,
        r#"cat > /dev/null; echo '{"status":"approved","comments":"","approved":true}'"#,
        project.path(),
    );

    let result = Orchestrator::new(
        hive::config::RunConfig::new("Write a greeting", project.path()).with_rounds(1),
        Arc::new(ScriptedPlanner::new().round(1, vec![assignment(1, 1, "greet")])),
        Arc::new(producer),
        Arc::new(reviewer),
        Arc::new(NoopLogger),
    )
    .run()
    .await
    .unwrap();

    let node = &result.tree.root.children[0];
    assert_eq!(node.status, TaskStatus::Failed);
    assert!(node
        .producer_output
        .as_ref()
        .unwrap()
        .message
        .contains("out of disk"));
}

/// Test: Shell planner
/// Given a planner script answering with a wrapped task list
/// Then each listed assignment becomes a node
#[tokio::test]
async fn test_shell_planner_plans_tasks() {
    let project = TempDir::new().unwrap();
    let planner = sh(
        RoleKind::Planner,
        r#"cat > /dev/null; echo '{"tasks":[{"producer_id":1,"reviewer_id":2,"producer_instruction":"one"},{"producer_id":2,"reviewer_id":1,"producer_instruction":"two","file_path":"two.txt"}]}'"#,
        project.path(),
    );
    let producer = sh(
        RoleKind::Producer,
        r#"cat > /dev/null; echo '{"status":"success","message":"ok"}'"#,
        project.path(),
    );
    let reviewer = sh(
        RoleKind::Reviewer,
        r#"cat > /dev/null; echo '{"status":"approved","comments":"ok","approved":true}'"#,
        project.path(),
    );

    let result = Orchestrator::new(
        hive::config::RunConfig::new("Two things", project.path()).with_pairs(2),
        Arc::new(planner),
        Arc::new(producer),
        Arc::new(reviewer),
        Arc::new(NoopLogger),
    )
    .run()
    .await
    .unwrap();

    let descriptions: Vec<&str> = result
        .tree
        .root
        .children
        .iter()
        .map(|child| child.description.as_str())
        .collect();
    assert_eq!(descriptions, vec!["one", "two"]);
    assert_eq!(
        result.tree.root.children[1].file_path.as_deref(),
        Some(std::path::Path::new("two.txt"))
    );
    assert_eq!(result.counts.approved, 2);
}
