//! Runs and matrix cells

use crate::core::{
    state::{ExecutionStatus, RunState, StepState},
    step::StepDefinition,
    trigger::TriggerEvent,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A step as tracked inside one cell
#[derive(Debug, Clone)]
pub struct CellStep {
    pub definition: StepDefinition,

    /// Command actually executed, once resolved for this cell
    pub command: Option<String>,

    pub state: StepState,
}

impl CellStep {
    pub fn new(definition: StepDefinition) -> Self {
        Self {
            definition,
            command: None,
            state: StepState::Pending,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// One matrix cell: an OS identifier and its ordered steps
#[derive(Debug, Clone)]
pub struct Cell {
    /// Position in the matrix
    pub index: usize,

    /// Matrix OS identifier
    pub os: String,

    pub steps: Vec<CellStep>,

    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Cell {
    pub fn new(index: usize, os: impl Into<String>, steps: &[StepDefinition]) -> Self {
        Self {
            index,
            os: os.into(),
            steps: steps.iter().cloned().map(CellStep::new).collect(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&CellStep> {
        self.steps.iter().find(|s| s.name() == name)
    }

    /// Get a mutable step by name
    pub fn step_mut(&mut self, name: &str) -> Option<&mut CellStep> {
        self.steps.iter_mut().find(|s| s.name() == name)
    }

    /// The step that failed this cell, if any
    pub fn failed_step(&self) -> Option<&CellStep> {
        self.steps.iter().find(|s| s.state.is_failed())
    }

    /// A cell succeeds only when every step completed
    pub fn all_steps_completed(&self) -> bool {
        self.steps.iter().all(|s| s.state.is_completed())
    }

    /// Derive the final status from the step states
    pub fn finalize(&mut self) {
        self.status = if self.all_steps_completed() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        self.completed_at = Some(Utc::now());
    }

    /// Fail the cell without running anything further
    ///
    /// Running or pending steps become failed or skipped so the cell is left
    /// fully terminal.
    pub fn abort(&mut self, error: &str) {
        let now = Utc::now();
        for step in &mut self.steps {
            step.state = match &step.state {
                StepState::Running { started_at } => StepState::Failed {
                    output: String::new(),
                    error: error.to_string(),
                    exit_code: None,
                    started_at: *started_at,
                    failed_at: now,
                },
                StepState::Pending => StepState::Skipped {
                    reason: error.to_string(),
                },
                other => other.clone(),
            };
        }
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(now);
    }
}

/// One invocation of a workflow for one trigger event
#[derive(Debug, Clone)]
pub struct Run {
    pub id: Uuid,
    pub workflow_name: String,
    pub event: TriggerEvent,

    /// Workflow env, shared read-only by every cell
    pub env: BTreeMap<String, String>,

    /// Workflow variables merged with overrides
    pub variables: HashMap<String, String>,

    /// Cap on concurrently running cells from the workflow
    pub max_parallel: Option<usize>,

    pub cells: Vec<Cell>,
    pub state: RunState,
}

impl Run {
    /// Get a cell by OS identifier
    pub fn cell(&self, os: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.os == os)
    }

    pub fn cell_mut(&mut self, os: &str) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| c.os == os)
    }

    pub fn status(&self) -> ExecutionStatus {
        self.state.status
    }

    pub fn is_success(&self) -> bool {
        self.state.status == ExecutionStatus::Completed
    }

    /// Total number of step slots across all cells
    pub fn total_steps(&self) -> usize {
        self.cells.iter().map(|c| c.steps.len()).sum()
    }

    /// Apply `key=value` overrides on top of the workflow variables
    pub fn override_variables<'a, I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = &'a (String, String)>,
    {
        for (key, value) in overrides {
            self.variables.insert(key.clone(), value.clone());
        }
    }

    /// Keep only the cells whose OS is listed; order follows the matrix
    pub fn retain_os(&mut self, os: &[String]) {
        self.cells.retain(|c| os.iter().any(|o| o == &c.os));
        for (index, cell) in self.cells.iter_mut().enumerate() {
            cell.index = index;
        }
    }
}
