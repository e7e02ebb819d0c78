//! Test: push to main, every cell passes Format, Build and Test

use crate::helpers::*;
use matrix_ci::execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy};
use matrix_ci::{ExecutionStatus, TriggerEvent};
use std::sync::Arc;

#[tokio::test]
async fn test_push_to_main_succeeds_on_every_os() {
    let runner = Arc::new(ScriptedRunner::new());

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        runner.clone(),
        SchedulingStrategy::Parallel,
    )
    .await;

    let run = result.run();
    assert_run_status(run, ExecutionStatus::Completed);
    assert_eq!(run.state.completed_cells, 3);
    assert_eq!(run.state.failed_cells, 0);

    for os in ["ubuntu-latest", "windows-latest", "macos-latest"] {
        assert_cell_succeeded(run, os);
        assert_eq!(runner.steps_run_on(os), vec!["Format", "Build", "Test"]);
    }
    assert_eq!(runner.calls().len(), 9);
}

#[tokio::test]
async fn test_cells_run_concurrently() {
    // Format only passes once all three cells are inside it together
    let runner = Arc::new(ScriptedRunner::new().rendezvous("Format", 3));

    let result = handle_event(
        &default_workflow(),
        TriggerEvent::push("main"),
        runner,
        SchedulingStrategy::Parallel,
    )
    .await;

    assert_run_status(result.run(), ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_commands_and_env_are_rendered_per_cell() {
    let workflow = workflow_from_yaml(
        r#"
name: "Rust"
on:
  push:
    branches: [main]
variables:
  toolchain: stable
env:
  CARGO_TARGET_DIR: "{{ cell_dir }}/target"
strategy:
  os: [ubuntu-latest, windows-latest]
steps:
  - name: Format
    run: cargo +{{ toolchain }} fmt --all -- --check
  - name: Build
    run: cargo build --verbose
    env:
      RUSTFLAGS: "--cfg ci_{{ runner.os }}"
  - name: Test
    run: echo {{ matrix.os }}
"#,
    );
    let runner = Arc::new(ScriptedRunner::new());

    let result = handle_event(
        &workflow,
        TriggerEvent::push("main"),
        runner.clone(),
        SchedulingStrategy::Parallel,
    )
    .await;
    let run = result.run();
    assert_run_status(run, ExecutionStatus::Completed);

    let calls = runner.calls();
    let windows: Vec<_> = calls.iter().filter(|c| c.os == "windows-latest").collect();
    assert_eq!(windows[0].command, "cargo +stable fmt --all -- --check");
    assert_eq!(windows[1].env.get("RUSTFLAGS"), Some(&"--cfg ci_Windows".to_string()));
    assert_eq!(windows[2].command, "echo windows-latest");

    let ubuntu_target = calls
        .iter()
        .find(|c| c.os == "ubuntu-latest")
        .and_then(|c| c.env.get("CARGO_TARGET_DIR").cloned())
        .unwrap();
    let windows_target = windows[0].env.get("CARGO_TARGET_DIR").cloned().unwrap();
    assert_ne!(ubuntu_target, windows_target);
    assert!(ubuntu_target.ends_with("target"));

    assert_eq!(
        run.cell("ubuntu-latest").unwrap().step("Test").unwrap().command.as_deref(),
        Some("echo ubuntu-latest")
    );
}

#[tokio::test]
async fn test_event_stream_reports_every_step() {
    let result = handle_event(
        &default_workflow(),
        TriggerEvent::pull_request("main"),
        Arc::new(ScriptedRunner::new()),
        SchedulingStrategy::Parallel,
    )
    .await;

    let completed = result
        .events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::StepCompleted { .. }))
        .count();
    assert_eq!(completed, 9);
    assert!(matches!(
        result.events.last(),
        Some(ExecutionEvent::RunFinished {
            status: ExecutionStatus::Completed,
            ..
        })
    ));

    // Within a cell, each step starts only after the previous one completed
    let ubuntu: Vec<&ExecutionEvent> = result
        .events
        .iter()
        .filter(|e| match e {
            ExecutionEvent::StepStarted { os, .. } | ExecutionEvent::StepCompleted { os, .. } => {
                os == "ubuntu-latest"
            }
            _ => false,
        })
        .collect();
    let sequence: Vec<String> = ubuntu
        .iter()
        .map(|e| match e {
            ExecutionEvent::StepStarted { step, .. } => format!("start {}", step),
            ExecutionEvent::StepCompleted { step, .. } => format!("done {}", step),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(
        sequence,
        vec![
            "start Format",
            "done Format",
            "start Build",
            "done Build",
            "start Test",
            "done Test"
        ]
    );
}

#[tokio::test]
async fn test_variable_overrides_win_over_workflow_variables() {
    let workflow = workflow_from_yaml(
        r#"
name: "Rust"
on:
  push:
    branches: [main]
variables:
  toolchain: stable
  profile: dev
strategy:
  os: [ubuntu-latest]
steps:
  - name: Build
    run: cargo +{{ toolchain }} build --profile {{ profile }}
"#,
    );
    let runner = Arc::new(ScriptedRunner::new());
    let engine = ExecutionEngine::new(runner.clone(), SchedulingStrategy::Parallel);

    let mut run = engine
        .trigger(&workflow, &TriggerEvent::push("main"))
        .unwrap();
    run.override_variables(&[("toolchain".to_string(), "nightly".to_string())]);
    engine.execute(&mut run).await;

    assert_run_status(&run, ExecutionStatus::Completed);
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].command, "cargo +nightly build --profile dev");
}
