//! Step runners - the process boundary of a matrix cell

pub mod config;
pub mod process;

use crate::core::{CellContext, StepCommand};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub use config::RunnerConfig;
pub use process::LocalProcessRunner;

/// Error types for runner operations
///
/// Any of these fails the step that hit it; none of them reaches other cells.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Working directory unavailable: {path}: {source}")]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let mut out = self.stdout.clone();
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&self.stderr);
                out
            }
        }
    }
}

/// Trait for step execution - allows for different implementations
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Run one resolved step for a cell
    async fn run(
        &self,
        context: &CellContext,
        command: &StepCommand,
    ) -> Result<CommandOutput, RunnerError>;

    /// Scratch directory owned by one cell of one run
    fn cell_dir(&self, run_id: &Uuid, os: &str) -> PathBuf {
        std::env::temp_dir()
            .join("matrix-ci")
            .join(run_id.to_string())
            .join(os)
    }
}

#[async_trait]
impl<R: StepRunner + ?Sized> StepRunner for std::sync::Arc<R> {
    async fn run(
        &self,
        context: &CellContext,
        command: &StepCommand,
    ) -> Result<CommandOutput, RunnerError> {
        (**self).run(context, command).await
    }

    fn cell_dir(&self, run_id: &Uuid, os: &str) -> PathBuf {
        (**self).cell_dir(run_id, os)
    }
}
