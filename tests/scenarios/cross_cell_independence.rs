//! Test: one failing cell fails the run but never the other cells

use crate::helpers::*;
use matrix_ci::execution::SchedulingStrategy;
use matrix_ci::{ExecutionStatus, TriggerEvent};
use std::sync::Arc;

#[tokio::test]
async fn test_windows_test_failure_leaves_other_cells_green() {
    let runner = Arc::new(ScriptedRunner::new().fail("windows-latest", "Test", 1));

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        runner,
        SchedulingStrategy::Parallel,
    )
    .await;

    let run = result.run();
    assert_run_status(run, ExecutionStatus::Failed);
    assert_eq!(run.state.failed_cells, 1);
    assert_eq!(run.state.completed_cells, 2);
    assert_eq!(
        step_outcomes(run, "windows-latest"),
        vec![("Format", "success"), ("Build", "success"), ("Test", "failure")]
    );
    assert_cell_succeeded(run, "ubuntu-latest");
    assert_cell_succeeded(run, "macos-latest");
}

#[tokio::test]
async fn test_early_failure_does_not_cancel_slower_cells() {
    // Ubuntu fails Format while the other two cells are still meeting at Build
    let runner = Arc::new(
        ScriptedRunner::new()
            .fail("ubuntu-latest", "Format", 1)
            .rendezvous("Build", 2),
    );

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        runner.clone(),
        SchedulingStrategy::Parallel,
    )
    .await;

    let run = result.run();
    assert_run_status(run, ExecutionStatus::Failed);
    assert_cell_succeeded(run, "windows-latest");
    assert_cell_succeeded(run, "macos-latest");
    assert_eq!(runner.steps_run_on("ubuntu-latest"), vec!["Format"]);
}

#[tokio::test]
async fn test_every_cell_failing() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .fail("ubuntu-latest", "Format", 1)
            .fail("windows-latest", "Build", 1)
            .fail("macos-latest", "Test", 1),
    );

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        runner,
        SchedulingStrategy::Parallel,
    )
    .await;

    let run = result.run();
    assert_run_status(run, ExecutionStatus::Failed);
    assert_eq!(run.state.failed_cells, 3);
    for cell in &run.cells {
        assert!(cell.steps.iter().all(|s| s.state.is_terminal()));
    }
}

#[tokio::test]
async fn test_sequential_strategy_same_outcome() {
    let runner = Arc::new(ScriptedRunner::new().fail("windows-latest", "Test", 1));

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        runner.clone(),
        SchedulingStrategy::Sequential,
    )
    .await;

    let run = result.run();
    assert_run_status(run, ExecutionStatus::Failed);
    assert_cell_succeeded(run, "ubuntu-latest");
    assert_cell_succeeded(run, "macos-latest");

    // One cell at a time: each cell's calls are contiguous, in matrix order
    let order: Vec<String> = runner.calls().into_iter().map(|c| c.os).collect();
    let mut cells = order.clone();
    cells.dedup();
    assert_eq!(cells, vec!["ubuntu-latest", "windows-latest", "macos-latest"]);
    assert_eq!(order.len(), 9);
}

#[tokio::test]
async fn test_workflow_max_parallel_only_throttles() {
    let workflow = workflow_from_yaml(
        r#"
name: "Throttled"
on:
  push:
    branches: [main]
strategy:
  os: [ubuntu-latest, windows-latest, macos-latest]
  max_parallel: 1
steps:
  - name: Format
    run: cargo fmt --all -- --check
  - name: Build
    run: cargo build --verbose
  - name: Test
    run: cargo test --verbose
"#,
    );
    let runner = Arc::new(ScriptedRunner::new().fail("ubuntu-latest", "Build", 1));

    let result = handle_event(
        &workflow,
        TriggerEvent::push("main"),
        runner,
        SchedulingStrategy::Parallel,
    )
    .await;

    let run = result.run();
    assert_run_status(run, ExecutionStatus::Failed);
    assert_cell_succeeded(run, "windows-latest");
    assert_cell_succeeded(run, "macos-latest");
}
