//! Test: only events targeting main start a run

use crate::helpers::*;
use matrix_ci::execution::SchedulingStrategy;
use matrix_ci::TriggerEvent;
use std::sync::Arc;

#[tokio::test]
async fn test_push_to_other_branch_creates_no_run() {
    let runner = Arc::new(ScriptedRunner::new());

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("develop"),
        runner.clone(),
        SchedulingStrategy::Parallel,
    )
    .await;

    assert!(result.run.is_none());
    assert!(result.events.is_empty());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_pull_request_to_other_branch_creates_no_run() {
    let runner = Arc::new(ScriptedRunner::new());

    for branch in ["feature/lexer", "release", "Main", "main2"] {
        let result = handle_event(
            &default_workflow(),
            TriggerEvent::pull_request(branch),
            runner.clone(),
            SchedulingStrategy::Parallel,
        )
        .await;
        assert!(result.run.is_none(), "{} should not trigger", branch);
    }

    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_main_creates_exactly_three_cells() {
    for event in [TriggerEvent::push("main"), TriggerEvent::pull_request("main")] {
        let result = handle_event(
            &default_workflow(),
            event.clone(),
            Arc::new(ScriptedRunner::new()),
            SchedulingStrategy::Parallel,
        )
        .await;

        let run = result.run();
        assert_eq!(run.event, event);
        let os: Vec<_> = run.cells.iter().map(|c| c.os.as_str()).collect();
        assert_eq!(os, vec!["ubuntu-latest", "windows-latest", "macos-latest"]);
    }
}

#[tokio::test]
async fn test_branch_globs_and_event_sections() {
    let workflow = workflow_from_yaml(
        r#"
name: "Release"
on:
  push:
    branches: [main, "release/**"]
strategy:
  os: [ubuntu-latest]
steps:
  - name: Build
    run: cargo build --release
"#,
    );

    assert!(workflow.should_trigger(&TriggerEvent::push("release/1.2/rc1")));
    assert!(workflow.should_trigger(&TriggerEvent::push("main")));
    assert!(!workflow.should_trigger(&TriggerEvent::push("hotfix/1.2")));
    // No pull_request section: pull requests never trigger
    assert!(!workflow.should_trigger(&TriggerEvent::pull_request("main")));
}
