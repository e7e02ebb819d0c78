//! Local process runner - runs step commands through the host shell

use crate::core::{CellContext, StepCommand};
use crate::runner::{CommandOutput, RunnerConfig, RunnerError, StepRunner};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// Runs every cell on the current host, each in its own scratch directory
#[derive(Debug, Clone, Default)]
pub struct LocalProcessRunner {
    config: RunnerConfig,
}

impl LocalProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn resolve_workdir(&self, command: &StepCommand) -> PathBuf {
        match &command.working_directory {
            Some(dir) => self.config.workdir.join(dir),
            None => self.config.workdir.clone(),
        }
    }
}

#[async_trait]
impl StepRunner for LocalProcessRunner {
    async fn run(
        &self,
        context: &CellContext,
        command: &StepCommand,
    ) -> Result<CommandOutput, RunnerError> {
        tokio::fs::create_dir_all(&context.cell_dir)
            .await
            .map_err(|source| RunnerError::WorkingDirectory {
                path: context.cell_dir.clone(),
                source,
            })?;

        let workdir = self.resolve_workdir(command);
        let metadata = tokio::fs::metadata(&workdir)
            .await
            .map_err(|source| RunnerError::WorkingDirectory {
                path: workdir.clone(),
                source,
            })?;
        if !metadata.is_dir() {
            return Err(RunnerError::WorkingDirectory {
                path: workdir,
                source: std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
            });
        }

        let (program, args) = self.config.shell_invocation();
        debug!(
            "[{}] {}: {} {} {:?} (in {})",
            context.os,
            command.step_name,
            program,
            args.join(" "),
            command.command,
            workdir.display()
        );

        let mut process = Command::new(&program);
        process
            .args(&args)
            .arg(&command.command)
            .current_dir(&workdir)
            .envs(&self.config.env)
            .env("CI", "true")
            .env("MATRIX_OS", &context.os)
            .env("RUNNER_OS", context.runner_os.to_string())
            .env("MATRIX_CELL_DIR", &context.cell_dir)
            .envs(&command.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let started = Instant::now();
        let output = match command.timeout.or(self.config.default_timeout) {
            Some(limit) => timeout(limit, process.output())
                .await
                .map_err(|_| {
                    warn!(
                        "[{}] {} timed out after {}s",
                        context.os,
                        command.step_name,
                        limit.as_secs()
                    );
                    RunnerError::Timeout(limit.as_secs())
                })?,
            None => process.output().await,
        }
        .map_err(|source| RunnerError::Spawn {
            command: program.clone(),
            source,
        })?;

        let output = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        };

        debug!(
            "[{}] {} exited with {:?} ({} bytes of output)",
            context.os,
            command.step_name,
            output.exit_code,
            output.stdout.len() + output.stderr.len()
        );

        Ok(output)
    }

    fn cell_dir(&self, run_id: &Uuid, os: &str) -> PathBuf {
        self.config
            .scratch_root
            .join(run_id.to_string())
            .join(os)
    }
}
