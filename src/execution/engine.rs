//! Main execution engine - fans a run out into its matrix cells and joins them

use crate::{
    core::{Cell, CellContext, ExecutionStatus, Run, RunnerOs, TriggerEvent, Workflow},
    execution::{CellExecutor, CellScheduler, SchedulingStrategy},
    runner::StepRunner,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow_name: String,
        event: TriggerEvent,
        cells: Vec<String>,
        total_steps: usize,
    },
    CellStarted {
        run_id: Uuid,
        os: String,
    },
    StepStarted {
        os: String,
        step: String,
        command: String,
    },
    StepCompleted {
        os: String,
        step: String,
        output: String,
        duration_ms: u64,
    },
    StepFailed {
        os: String,
        step: String,
        error: String,
        exit_code: Option<i32>,
        output: String,
    },
    StepSkipped {
        os: String,
        step: String,
        reason: String,
    },
    CellFinished {
        os: String,
        status: ExecutionStatus,
    },
    RunFinished {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of events to every registered handler
///
/// Cloned into each cell task; handlers are called from whichever task
/// produced the event.
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Arc<Vec<EventHandler>>,
}

impl EventSink {
    pub fn new(handlers: Vec<EventHandler>) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }

    /// Emit an event to all handlers
    pub fn emit(&self, event: ExecutionEvent) {
        for handler in self.handlers.iter() {
            handler(event.clone());
        }
    }

    fn push(&mut self, handler: EventHandler) {
        Arc::make_mut(&mut self.handlers).push(handler);
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Main run execution engine
pub struct ExecutionEngine<R> {
    runner: Arc<R>,
    strategy: SchedulingStrategy,
    events: EventSink,
}

impl<R: StepRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R, strategy: SchedulingStrategy) -> Self {
        Self {
            runner: Arc::new(runner),
            strategy,
            events: EventSink::default(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.push(Arc::new(handler));
    }

    /// Builder form of [`add_event_handler`](Self::add_event_handler)
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.add_event_handler(handler);
        self
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Evaluate an event against a workflow and expand the matrix
    ///
    /// A mismatch is not an error: it simply yields no run.
    pub fn trigger(&self, workflow: &Workflow, event: &TriggerEvent) -> Option<Run> {
        match workflow.create_run(event) {
            Some(run) => {
                info!(
                    "{} on {} triggered {} ({} cells)",
                    event.kind,
                    event.branch,
                    workflow.name,
                    run.cells.len()
                );
                Some(run)
            }
            None => {
                info!(
                    "{} on {} does not match the triggers of {}, nothing to run",
                    event.kind, event.branch, workflow.name
                );
                None
            }
        }
    }

    /// Trigger and, on a match, execute the run to completion
    pub async fn handle_event(&self, workflow: &Workflow, event: &TriggerEvent) -> Option<Run> {
        let mut run = self.trigger(workflow, event)?;
        self.execute(&mut run).await;
        Some(run)
    }

    /// Execute every cell of a run and derive the run outcome
    ///
    /// Cells start in matrix order as the scheduler admits them and are
    /// reported as each one finishes. A failing cell never cancels the
    /// others; the run succeeds only if every cell did.
    pub async fn execute(&self, run: &mut Run) -> ExecutionStatus {
        let run_id = run.id;
        let scheduler = CellScheduler::new(self.strategy.with_max_parallel(run.max_parallel));

        info!(
            "Starting run {} of {} ({} cells, {:?})",
            run_id,
            run.workflow_name,
            run.cells.len(),
            scheduler.strategy()
        );
        run.state.start(run.cells.len());
        self.events.emit(ExecutionEvent::RunStarted {
            run_id,
            workflow_name: run.workflow_name.clone(),
            event: run.event.clone(),
            cells: run.cells.iter().map(|c| c.os.clone()).collect(),
            total_steps: run.total_steps(),
        });

        let executor = CellExecutor::from_parts(self.runner.clone(), self.events.clone());
        let env = Arc::new(run.env.clone());

        let mut fallbacks = HashMap::new();
        let mut cells = Vec::with_capacity(run.cells.len());
        let mut tasks = JoinSet::new();

        for cell in std::mem::take(&mut run.cells) {
            // Permits are taken here, in matrix order, so limited strategies start
            // cells in order. Finished cells are reported while we wait.
            let permit = loop {
                tokio::select! {
                    permit = scheduler.acquire() => break permit,
                    Some(joined) = tasks.join_next() => {
                        self.record_cell(joined, &mut fallbacks, &mut cells);
                    }
                }
            };

            let context = self.cell_context(run, &cell);
            let index = cell.index;
            fallbacks.insert(index, cell.clone());
            let executor = executor.clone();
            let env = env.clone();
            let events = self.events.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let mut cell = cell;
                events.emit(ExecutionEvent::CellStarted {
                    run_id,
                    os: cell.os.clone(),
                });
                executor.execute(&mut cell, &context, &env).await;
                cell
            });
            // The outer task only waits, so a panic inside the cell still maps back to it
            tasks.spawn(async move { (index, handle.await) });
        }

        while let Some(joined) = tasks.join_next().await {
            self.record_cell(joined, &mut fallbacks, &mut cells);
        }
        for (_, mut cell) in fallbacks.drain() {
            error!("[{}] cell task was lost", cell.os);
            cell.abort("cell task was cancelled");
            self.events.emit(ExecutionEvent::CellFinished {
                os: cell.os.clone(),
                status: cell.status,
            });
            cells.push(cell);
        }
        cells.sort_by_key(|c| c.index);

        let completed = cells
            .iter()
            .filter(|c| c.status == ExecutionStatus::Completed)
            .count();
        let failed = cells.len() - completed;
        run.cells = cells;
        run.state.finish(completed, failed);

        let status = run.state.status;
        if status == ExecutionStatus::Completed {
            info!("Run {} of {} succeeded", run_id, run.workflow_name);
        } else {
            warn!(
                "Run {} of {} failed ({} of {} cells failed)",
                run_id,
                run.workflow_name,
                failed,
                run.cells.len()
            );
        }
        self.events.emit(ExecutionEvent::RunFinished { run_id, status });

        status
    }

    /// Report one joined cell as soon as it finishes
    fn record_cell(
        &self,
        joined: Result<(usize, Result<Cell, JoinError>), JoinError>,
        fallbacks: &mut HashMap<usize, Cell>,
        cells: &mut Vec<Cell>,
    ) {
        let (index, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                error!("cell supervisor task did not finish: {}", e);
                return;
            }
        };
        let Some(mut fallback) = fallbacks.remove(&index) else {
            return;
        };

        let cell = match result {
            Ok(cell) => cell,
            Err(e) => {
                error!("[{}] cell task did not finish: {}", fallback.os, e);
                fallback.abort(&format!("cell task did not finish: {}", e));
                fallback
            }
        };
        self.events.emit(ExecutionEvent::CellFinished {
            os: cell.os.clone(),
            status: cell.status,
        });
        cells.push(cell);
    }

    fn cell_context(&self, run: &Run, cell: &Cell) -> CellContext {
        CellContext {
            run_id: run.id,
            workflow_name: run.workflow_name.clone(),
            event: run.event.clone(),
            os: cell.os.clone(),
            runner_os: RunnerOs::from_identifier(&cell.os),
            cell_dir: self.runner.cell_dir(&run.id, &cell.os),
            variables: run.variables.clone(),
        }
    }
}
