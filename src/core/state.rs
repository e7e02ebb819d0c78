//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a run or of a single matrix cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Not started yet
    Pending,
    /// Currently running
    Running,
    /// Every step succeeded
    Completed,
    /// At least one step failed
    Failed,
}

impl ExecutionStatus {
    /// Stable name used in storage and JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "Pending",
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Completed => "Completed",
            ExecutionStatus::Failed => "Failed",
        }
    }

    /// Whether this status can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ExecutionStatus::Pending),
            "Running" => Ok(ExecutionStatus::Running),
            "Completed" => Ok(ExecutionStatus::Completed),
            "Failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("Unknown execution status: {}", other)),
        }
    }
}

/// State of a single step inside a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not been reached yet
    Pending,
    /// Step is currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Step exited with status zero
    Completed {
        output: String,
        exit_code: i32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step exited non-zero or could not be run at all
    Failed {
        output: String,
        error: String,
        exit_code: Option<i32>,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step never ran because an earlier step in the same cell failed
    Skipped {
        reason: String,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Completed { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepState::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepState::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepState::Skipped { .. })
    }

    /// Captured output, if the step ran
    pub fn output(&self) -> Option<&str> {
        match self {
            StepState::Completed { output, .. } | StepState::Failed { output, .. } => {
                Some(output.as_str())
            }
            _ => None,
        }
    }

    /// Process exit code, if the process ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepState::Completed { exit_code, .. } => Some(*exit_code),
            StepState::Failed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Wall-clock duration in milliseconds for steps that ran
    pub fn duration_ms(&self) -> Option<u64> {
        let (start, end) = match self {
            StepState::Completed { started_at, completed_at, .. } => (started_at, completed_at),
            StepState::Failed { started_at, failed_at, .. } => (started_at, failed_at),
            _ => return None,
        };
        end.signed_duration_since(*start)
            .num_milliseconds()
            .try_into()
            .ok()
    }
}

/// Overall run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Current execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When the last cell finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of matrix cells
    pub total_cells: usize,

    /// Number of cells where every step succeeded
    pub completed_cells: usize,

    /// Number of failed cells
    pub failed_cells: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_cells: 0,
            completed_cells: 0,
            failed_cells: 0,
        }
    }

    /// Mark run as started
    pub fn start(&mut self, total_cells: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_cells = total_cells;
    }

    /// Record the final per-cell tallies and derive the run status from them
    pub fn finish(&mut self, completed_cells: usize, failed_cells: usize) {
        self.completed_cells = completed_cells;
        self.failed_cells = failed_cells;
        self.completed_at = Some(Utc::now());
        self.status = if failed_cells == 0 && completed_cells == self.total_cells {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
    }

    /// Calculate progress percentage (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_cells == 0 {
            return 0.0;
        }
        (self.completed_cells + self.failed_cells) as f64 / self.total_cells as f64
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
