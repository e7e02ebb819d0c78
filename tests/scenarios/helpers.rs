//! Test utilities for matrix-ci scenarios

use async_trait::async_trait;
use matrix_ci::core::{config::WorkflowConfig, CellContext, Run, StepCommand, Workflow};
use matrix_ci::execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy};
use matrix_ci::runner::{CommandOutput, RunnerError, StepRunner};
use matrix_ci::{ExecutionStatus, TriggerEvent};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

/// One invocation seen by the scripted runner
#[derive(Debug, Clone)]
pub struct Call {
    pub os: String,
    pub step: String,
    pub command: String,
    pub env: BTreeMap<String, String>,
}

/// Runner whose outcome per (os, step) is scripted up front
///
/// Everything not scripted exits 0.
#[derive(Default)]
pub struct ScriptedRunner {
    exit_codes: HashMap<(String, String), i32>,
    errors: HashSet<(String, String)>,
    rendezvous: Option<(String, Arc<Barrier>)>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `step` exit with `code` on `os`
    pub fn fail(mut self, os: &str, step: &str, code: i32) -> Self {
        self.exit_codes.insert((os.to_string(), step.to_string()), code);
        self
    }

    /// Make `step` hit an infrastructure error on `os`
    pub fn spawn_error(mut self, os: &str, step: &str) -> Self {
        self.errors.insert((os.to_string(), step.to_string()));
        self
    }

    /// `step` only succeeds once `cells` cells are inside it at the same time
    pub fn rendezvous(mut self, step: &str, cells: usize) -> Self {
        self.rendezvous = Some((step.to_string(), Arc::new(Barrier::new(cells))));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Step names run on one OS, in call order
    pub fn steps_run_on(&self, os: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.os == os)
            .map(|c| c.step)
            .collect()
    }
}

#[async_trait]
impl StepRunner for ScriptedRunner {
    async fn run(
        &self,
        context: &CellContext,
        command: &StepCommand,
    ) -> Result<CommandOutput, RunnerError> {
        self.calls.lock().unwrap().push(Call {
            os: context.os.clone(),
            step: command.step_name.clone(),
            command: command.command.clone(),
            env: command.env.clone(),
        });

        if let Some((step, barrier)) = &self.rendezvous {
            if step == &command.step_name
                && tokio::time::timeout(Duration::from_secs(5), barrier.wait())
                    .await
                    .is_err()
            {
                return Err(RunnerError::Timeout(5));
            }
        }

        let key = (context.os.clone(), command.step_name.clone());
        if self.errors.contains(&key) {
            return Err(RunnerError::Spawn {
                command: "sh".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "shell not found"),
            });
        }

        let exit_code = self.exit_codes.get(&key).copied().unwrap_or(0);
        Ok(CommandOutput {
            exit_code: Some(exit_code),
            stdout: format!("{} on {}", command.command, context.os),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                format!("{} failed", command.step_name)
            },
            duration: Duration::from_millis(1),
        })
    }
}

/// The bundled Format/Build/Test workflow
pub fn default_workflow() -> Workflow {
    WorkflowConfig::default_workflow()
        .unwrap()
        .to_workflow()
        .unwrap()
}

pub fn workflow_from_yaml(yaml: &str) -> Workflow {
    WorkflowConfig::from_yaml(yaml).unwrap().to_workflow().unwrap()
}

/// Result of handing one event to the engine
pub struct ScenarioResult {
    pub run: Option<Run>,
    pub events: Vec<ExecutionEvent>,
}

impl ScenarioResult {
    pub fn run(&self) -> &Run {
        self.run.as_ref().expect("event should have triggered a run")
    }
}

/// Hand an event to an engine backed by `runner`
pub async fn handle_event(
    workflow: &Workflow,
    event: TriggerEvent,
    runner: Arc<ScriptedRunner>,
    strategy: SchedulingStrategy,
) -> ScenarioResult {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let engine = ExecutionEngine::new(runner, strategy)
        .with_event_handler(move |event| sink.lock().unwrap().push(event));

    let run = engine.handle_event(workflow, &event).await;
    let events = events.lock().unwrap().clone();

    ScenarioResult { run, events }
}

/// Step outcomes of one cell as (name, label) pairs
pub fn step_outcomes<'a>(run: &'a Run, os: &str) -> Vec<(&'a str, &'static str)> {
    run.cell(os)
        .unwrap_or_else(|| panic!("no cell for {}", os))
        .steps
        .iter()
        .map(|s| {
            let label = if s.state.is_completed() {
                "success"
            } else if s.state.is_failed() {
                "failure"
            } else if s.state.is_skipped() {
                "skipped"
            } else {
                "pending"
            };
            (s.name(), label)
        })
        .collect()
}

pub fn assert_cell_succeeded(run: &Run, os: &str) {
    assert_eq!(
        step_outcomes(run, os),
        vec![("Format", "success"), ("Build", "success"), ("Test", "success")],
        "cell {} should have passed every step",
        os
    );
    assert_eq!(run.cell(os).unwrap().status, ExecutionStatus::Completed);
}

pub fn assert_run_status(run: &Run, expected: ExecutionStatus) {
    assert_eq!(
        run.status(),
        expected,
        "run status mismatch; cells: {:?}",
        run.cells
            .iter()
            .map(|c| (c.os.as_str(), c.status))
            .collect::<Vec<_>>()
    );
}
