//! Test: per-cell and per-step detail survives into history

use crate::helpers::*;
use matrix_ci::execution::SchedulingStrategy;
use matrix_ci::persistence::{
    create_summary, InMemoryPersistence, PersistenceBackend, StepOutcome,
};
use matrix_ci::{EventKind, ExecutionStatus, TriggerEvent};
use std::sync::Arc;

#[tokio::test]
async fn test_failed_run_summary_keeps_every_cell() {
    let runner = Arc::new(ScriptedRunner::new().fail("macos-latest", "Format", 1));

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::pull_request("main"),
        runner,
        SchedulingStrategy::Parallel,
    )
    .await;
    let summary = create_summary(result.run());

    assert_eq!(summary.workflow_name, "Rust");
    assert_eq!(summary.event, EventKind::PullRequest);
    assert_eq!(summary.branch, "main");
    assert_eq!(summary.status, ExecutionStatus::Failed);
    assert_eq!(summary.total_cells, 3);
    assert_eq!(summary.failed_cells, 1);
    assert!(summary.completed_at.is_some());

    let macos = summary.cell("macos-latest").unwrap();
    let outcomes: Vec<_> = macos.steps.iter().map(|s| s.outcome).collect();
    assert_eq!(
        outcomes,
        vec![StepOutcome::Failure, StepOutcome::Skipped, StepOutcome::Skipped]
    );
    assert_eq!(macos.steps[0].exit_code, Some(1));
    assert_eq!(macos.steps[1].error.as_deref(), Some("Format failed"));
    assert_eq!(
        macos.steps[0].command.as_deref(),
        Some("cargo fmt --all -- --check")
    );

    let ubuntu = summary.cell("ubuntu-latest").unwrap();
    assert_eq!(ubuntu.status, ExecutionStatus::Completed);
    assert!(ubuntu.steps.iter().all(|s| s.outcome == StepOutcome::Success));
}

#[tokio::test]
async fn test_summary_round_trips_through_store() {
    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        Arc::new(ScriptedRunner::new()),
        SchedulingStrategy::Parallel,
    )
    .await;
    let summary = create_summary(result.run());

    let store = InMemoryPersistence::new();
    store.save_run(&summary).await.unwrap();

    let latest = store.latest_run("Rust").await.unwrap().unwrap();
    assert_eq!(latest, summary);
    assert_eq!(store.list_workflows().await.unwrap(), vec!["Rust"]);
}
