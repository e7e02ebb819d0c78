//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

pub use crate::core::ExecutionStatus;
use crate::core::{Cell, CellStep, EventKind, Run, StepState};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lines of step output kept in history
const OUTPUT_TAIL_LINES: usize = 40;

/// Outcome of a step as recorded in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Pending,
    Running,
    Success,
    Failure,
    Skipped,
}

impl From<&StepState> for StepOutcome {
    fn from(state: &StepState) -> Self {
        match state {
            StepState::Pending => StepOutcome::Pending,
            StepState::Running { .. } => StepOutcome::Running,
            StepState::Completed { .. } => StepOutcome::Success,
            StepState::Failed { .. } => StepOutcome::Failure,
            StepState::Skipped { .. } => StepOutcome::Skipped,
        }
    }
}

/// Summary of one step of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub name: String,
    pub command: Option<String>,
    pub outcome: StepOutcome,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<u64>,

    /// Failure message or skip reason
    pub error: Option<String>,

    /// Tail of the captured output
    pub output: Option<String>,
}

/// Summary of one matrix cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    pub os: String,
    pub status: ExecutionStatus,
    pub steps: Vec<StepSummary>,
}

/// Summary of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow_name: String,

    /// Event that triggered the run
    pub event: EventKind,
    pub branch: String,

    /// Run status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When the last cell finished
    pub completed_at: Option<DateTime<Utc>>,

    pub total_cells: usize,
    pub completed_cells: usize,
    pub failed_cells: usize,

    /// Per-cell, per-step detail
    pub cells: Vec<CellSummary>,
}

impl RunSummary {
    pub fn cell(&self, os: &str) -> Option<&CellSummary> {
        self.cells.iter().find(|c| c.os == os)
    }

    /// Progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_cells == 0 {
            return 0.0;
        }
        (self.completed_cells + self.failed_cells) as f64 / self.total_cells as f64
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run, replacing any earlier record with the same ID
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// Most recent runs first, optionally for one workflow only
    async fn list_runs(&self, workflow_name: Option<&str>, limit: usize) -> Result<Vec<RunSummary>>;

    /// Most recent run of a workflow
    async fn latest_run(&self, workflow_name: &str) -> Result<Option<RunSummary>>;

    /// All workflow names with at least one run, sorted
    async fn list_workflows(&self) -> Result<Vec<String>>;

    /// Delete a run; returns whether it existed
    async fn delete_run(&self, run_id: Uuid) -> Result<bool>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow_name: Option<&str>, limit: usize) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|r| workflow_name.map_or(true, |name| r.workflow_name == name))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        result.truncate(limit);
        Ok(result)
    }

    async fn latest_run(&self, workflow_name: &str) -> Result<Option<RunSummary>> {
        Ok(self.list_runs(Some(workflow_name), 1).await?.into_iter().next())
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|r| r.workflow_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn delete_run(&self, run_id: Uuid) -> Result<bool> {
        Ok(self.runs.write().await.remove(&run_id).is_some())
    }
}

/// Create a summary from a finished (or aborted) run
pub fn create_summary(run: &Run) -> RunSummary {
    RunSummary {
        run_id: run.id,
        workflow_name: run.workflow_name.clone(),
        event: run.event.kind,
        branch: run.event.branch.clone(),
        status: run.state.status,
        started_at: run.state.started_at.unwrap_or_else(Utc::now),
        completed_at: run.state.completed_at,
        total_cells: run.state.total_cells,
        completed_cells: run.state.completed_cells,
        failed_cells: run.state.failed_cells,
        cells: run.cells.iter().map(summarize_cell).collect(),
    }
}

fn summarize_cell(cell: &Cell) -> CellSummary {
    CellSummary {
        os: cell.os.clone(),
        status: cell.status,
        steps: cell.steps.iter().map(summarize_step).collect(),
    }
}

fn summarize_step(step: &CellStep) -> StepSummary {
    let error = match &step.state {
        StepState::Failed { error, .. } => Some(error.clone()),
        StepState::Skipped { reason } => Some(reason.clone()),
        _ => None,
    };

    StepSummary {
        name: step.name().to_string(),
        command: step.command.clone(),
        outcome: StepOutcome::from(&step.state),
        exit_code: step.state.exit_code(),
        duration_ms: step.state.duration_ms(),
        error,
        output: step
            .state
            .output()
            .filter(|o| !o.is_empty())
            .map(|o| tail_lines(o, OUTPUT_TAIL_LINES)),
    }
}

/// Last `n` lines of `text`
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
