//! Cell executor - runs one cell's steps in order with fail-fast

use crate::{
    core::{Cell, CellContext, ExecutionStatus, StepState},
    execution::engine::{EventSink, ExecutionEvent},
    runner::StepRunner,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of executing a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Process exited with status zero
    Success { output: String, exit_code: i32 },
    /// Process exited non-zero, was killed, or never ran
    Failed {
        output: String,
        error: String,
        exit_code: Option<i32>,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }
}

/// Executes the steps of one cell
pub struct CellExecutor<R> {
    runner: Arc<R>,
    events: EventSink,
}

impl<R> Clone for CellExecutor<R> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
            events: self.events.clone(),
        }
    }
}

impl<R: StepRunner> CellExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self::from_parts(Arc::new(runner), EventSink::default())
    }

    pub fn from_parts(runner: Arc<R>, events: EventSink) -> Self {
        Self { runner, events }
    }

    /// Run the cell's steps strictly in order
    ///
    /// The first failing step stops the cell: every later step is marked
    /// skipped and never reaches the runner.
    pub async fn execute(
        &self,
        cell: &mut Cell,
        context: &CellContext,
        env: &BTreeMap<String, String>,
    ) {
        info!("[{}] Starting cell ({} steps)", cell.os, cell.steps.len());
        cell.status = ExecutionStatus::Running;
        cell.started_at = Some(Utc::now());

        let variables = context.get_rendering_variables();
        let mut failed_step: Option<String> = None;

        for step in cell.steps.iter_mut() {
            if let Some(failed) = &failed_step {
                let reason = format!("{} failed", failed);
                debug!("[{}] Skipping {}: {}", cell.os, step.name(), reason);
                self.events.emit(ExecutionEvent::StepSkipped {
                    os: cell.os.clone(),
                    step: step.name().to_string(),
                    reason: reason.clone(),
                });
                step.state = StepState::Skipped { reason };
                continue;
            }

            let command = step.definition.resolve(env, &variables);
            step.command = Some(command.command.clone());

            let started_at = Utc::now();
            step.state = StepState::Running { started_at };
            info!("[{}] Running step: {}", cell.os, step.name());
            self.events.emit(ExecutionEvent::StepStarted {
                os: cell.os.clone(),
                step: step.name().to_string(),
                command: command.command.clone(),
            });

            let result = match self.runner.run(context, &command).await {
                Ok(output) if output.success() => ExecutionResult::Success {
                    output: output.combined(),
                    exit_code: 0,
                },
                Ok(output) => ExecutionResult::Failed {
                    error: match output.exit_code {
                        Some(code) => format!("exited with code {}", code),
                        None => "terminated by signal".to_string(),
                    },
                    exit_code: output.exit_code,
                    output: output.combined(),
                },
                Err(e) => ExecutionResult::Failed {
                    output: String::new(),
                    error: e.to_string(),
                    exit_code: None,
                },
            };

            let finished_at = Utc::now();
            match result {
                ExecutionResult::Success { output, exit_code } => {
                    info!("[{}] Step {} succeeded", cell.os, step.name());
                    self.events.emit(ExecutionEvent::StepCompleted {
                        os: cell.os.clone(),
                        step: step.name().to_string(),
                        output: output.clone(),
                        duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
                    });
                    step.state = StepState::Completed {
                        output,
                        exit_code,
                        started_at,
                        completed_at: finished_at,
                    };
                }
                ExecutionResult::Failed {
                    output,
                    error,
                    exit_code,
                } => {
                    warn!("[{}] Step {} failed: {}", cell.os, step.name(), error);
                    self.events.emit(ExecutionEvent::StepFailed {
                        os: cell.os.clone(),
                        step: step.name().to_string(),
                        error: error.clone(),
                        exit_code,
                        output: output.clone(),
                    });
                    step.state = StepState::Failed {
                        output,
                        error,
                        exit_code,
                        started_at,
                        failed_at: finished_at,
                    };
                    failed_step = Some(step.name().to_string());
                }
            }
        }

        cell.finalize();
        info!("[{}] Cell finished: {}", cell.os, cell.status);
    }
}
