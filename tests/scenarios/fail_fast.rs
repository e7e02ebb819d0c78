//! Test: a failing step stops its own cell and nothing else

use crate::helpers::*;
use matrix_ci::execution::{ExecutionEvent, SchedulingStrategy};
use matrix_ci::{ExecutionStatus, StepState, TriggerEvent};
use std::sync::Arc;

#[tokio::test]
async fn test_format_failure_on_macos_pull_request() {
    let runner = Arc::new(ScriptedRunner::new().fail("macos-latest", "Format", 1));

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::pull_request("main"),
        runner.clone(),
        SchedulingStrategy::Parallel,
    )
    .await;

    let run = result.run();
    assert_run_status(run, ExecutionStatus::Failed);

    assert_eq!(
        step_outcomes(run, "macos-latest"),
        vec![("Format", "failure"), ("Build", "skipped"), ("Test", "skipped")]
    );
    assert_eq!(run.cell("macos-latest").unwrap().status, ExecutionStatus::Failed);
    // Build and Test never reached the runner on macOS
    assert_eq!(runner.steps_run_on("macos-latest"), vec!["Format"]);

    assert_cell_succeeded(run, "ubuntu-latest");
    assert_cell_succeeded(run, "windows-latest");
}

#[tokio::test]
async fn test_skipped_steps_name_the_failed_step() {
    let runner = Arc::new(ScriptedRunner::new().fail("ubuntu-latest", "Build", 101));

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        runner.clone(),
        SchedulingStrategy::Parallel,
    )
    .await;

    let run = result.run();
    let ubuntu = run.cell("ubuntu-latest").unwrap();
    assert_eq!(
        ubuntu.step("Test").unwrap().state,
        StepState::Skipped {
            reason: "Build failed".to_string()
        }
    );
    match &ubuntu.step("Build").unwrap().state {
        StepState::Failed {
            exit_code, error, output, ..
        } => {
            assert_eq!(*exit_code, Some(101));
            assert_eq!(error, "exited with code 101");
            assert!(output.contains("Build failed"));
        }
        other => panic!("expected Build to fail, got {:?}", other),
    }
    assert_eq!(runner.steps_run_on("ubuntu-latest"), vec!["Format", "Build"]);

    let skipped: Vec<_> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StepSkipped { os, step, .. } => Some((os.as_str(), step.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![("ubuntu-latest", "Test")]);
}

#[tokio::test]
async fn test_infrastructure_error_fails_only_that_step() {
    let runner = Arc::new(ScriptedRunner::new().spawn_error("windows-latest", "Format"));

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        runner.clone(),
        SchedulingStrategy::Parallel,
    )
    .await;

    let run = result.run();
    assert_run_status(run, ExecutionStatus::Failed);
    assert_eq!(
        step_outcomes(run, "windows-latest"),
        vec![("Format", "failure"), ("Build", "skipped"), ("Test", "skipped")]
    );
    let format = run.cell("windows-latest").unwrap().step("Format").unwrap();
    assert_eq!(format.state.exit_code(), None);
    assert_cell_succeeded(run, "ubuntu-latest");
    assert_cell_succeeded(run, "macos-latest");
}

#[tokio::test]
async fn test_no_retries_after_failure() {
    let runner = Arc::new(ScriptedRunner::new().fail("ubuntu-latest", "Test", 1));

    handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        runner.clone(),
        SchedulingStrategy::Parallel,
    )
    .await;

    let test_calls = runner
        .calls()
        .into_iter()
        .filter(|c| c.os == "ubuntu-latest" && c.step == "Test")
        .count();
    assert_eq!(test_calls, 1);
}
