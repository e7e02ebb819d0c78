use anyhow::{bail, Context, Result};
use matrix_ci::cli::commands::{
    HistoryCommand, ListCommand, MatrixCommand, RunCommand, ValidateCommand,
};
use matrix_ci::cli::output::*;
use matrix_ci::cli::{Cli, Command};
use matrix_ci::core::{config::WorkflowConfig, ExecutionStatus, RunnerOs, TriggerEvent};
use matrix_ci::execution::{ExecutionEngine, ExecutionEvent};
use matrix_ci::persistence::{create_summary, PersistenceBackend, RunSummary};
use matrix_ci::runner::{LocalProcessRunner, RunnerConfig};
use std::path::Path;
use tracing::warn;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Lines of output shown for a failed step
const FAILED_OUTPUT_LINES: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::Matrix(cmd) => show_matrix(cmd)?,
        Command::List(cmd) => list_workflows(cmd).await?,
        Command::History(cmd) => show_history(cmd, cli.verbose).await?,
    }

    Ok(())
}

fn load_config(file: Option<&Path>) -> Result<WorkflowConfig> {
    match file {
        Some(path) => WorkflowConfig::from_file(path).context("Failed to load workflow config"),
        None => WorkflowConfig::default_workflow(),
    }
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Box<dyn PersistenceBackend>> {
    Ok(Box::new(
        matrix_ci::persistence::SqliteRunStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Box<dyn PersistenceBackend>> {
    bail!("Run history needs the `sqlite` feature")
}

async fn run_workflow(cmd: &RunCommand) -> Result<()> {
    let config = load_config(cmd.file.as_deref())?;
    println!("{} Loaded workflow: {}", INFO, style(&config.name).bold());

    let workflow = config.to_workflow()?;
    let event = TriggerEvent::new(cmd.event.into(), &cmd.branch);

    // Set up the runner
    let mut runner_config = RunnerConfig::new().with_workdir(&cmd.workdir);
    if let Some(scratch) = &cmd.scratch_dir {
        runner_config = runner_config.with_scratch_root(scratch);
    }
    if let Some(shell) = &cmd.shell {
        runner_config = runner_config.with_shell(shell);
    }
    let runner = LocalProcessRunner::new(runner_config);

    let mut engine = ExecutionEngine::new(runner, cmd.strategy.to_strategy(cmd.max_parallel));

    let Some(mut run) = engine.trigger(&workflow, &event) else {
        println!(
            "{} {} does not trigger {}, nothing to run",
            INFO,
            style(&event).cyan(),
            style(&workflow.name).bold()
        );
        return Ok(());
    };

    run.override_variables(&cmd.variable);
    for (key, value) in &cmd.variable {
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    if !cmd.os.is_empty() {
        for os in &cmd.os {
            if run.cell(os).is_none() {
                bail!(
                    "Unknown matrix cell '{}' (matrix: {})",
                    os,
                    workflow.os.join(", ")
                );
            }
        }
        run.retain_os(&cmd.os);
    }

    // Console reporting
    let progress = create_progress_bar(run.total_steps());
    let show_output = cmd.show_output;
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        // A hidden bar (stdout is not a terminal) swallows println
        let print = |line: String| {
            if bar.is_hidden() {
                println!("{}", line);
            } else {
                bar.println(line);
            }
        };

        if let Some(line) = format_execution_event(&event) {
            print(line);
        }
        match &event {
            ExecutionEvent::StepStarted { os, step, .. } => {
                bar.set_message(format!("{} {}", os, step));
            }
            ExecutionEvent::StepCompleted { output, .. } => {
                bar.inc(1);
                if show_output && !output.trim().is_empty() {
                    print(format_output(output, usize::MAX));
                }
            }
            ExecutionEvent::StepFailed { output, .. } => {
                bar.inc(1);
                if !output.trim().is_empty() {
                    print(format_output(output, FAILED_OUTPUT_LINES));
                }
            }
            ExecutionEvent::StepSkipped { .. } => bar.inc(1),
            _ => {}
        }
    });

    println!();
    let status = engine.execute(&mut run).await;
    progress.finish_and_clear();

    let summary = create_summary(&run);
    println!();
    print_separator();
    for cell in &summary.cells {
        println!("{}", format_cell_report(cell));
    }
    print_separator();

    // Save to history
    if !cmd.no_history {
        match save_history(&summary).await {
            Ok(()) => println!(
                "{} Run saved to history (ID: {})",
                INFO,
                style(&summary.run_id.to_string()[..8]).dim()
            ),
            Err(e) => warn!("Could not save run to history: {:#}", e),
        }
    }

    // Print final status
    if status == ExecutionStatus::Completed {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&run.workflow_name).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} {} ({} of {} cells failed)",
            CROSS,
            style(&run.workflow_name).bold(),
            style("failed").red(),
            run.state.failed_cells,
            run.state.total_cells
        );
        std::process::exit(1);
    }

    Ok(())
}

async fn save_history(summary: &RunSummary) -> Result<()> {
    let store = open_store().await?;
    store.save_run(summary).await
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    let result = WorkflowConfig::from_file(&cmd.file).and_then(|config| {
        config.to_workflow()?;
        Ok(config)
    });

    match result {
        Ok(config) => {
            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Matrix: {}", style(config.strategy.os.join(", ")).cyan());
            println!(
                "  Steps: {}",
                style(
                    config
                        .steps
                        .iter()
                        .map(|s| s.name.as_str())
                        .collect::<Vec<_>>()
                        .join(" -> ")
                )
                .cyan()
            );
            println!("  Variables: {}", style(config.variables.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn show_matrix(cmd: &MatrixCommand) -> Result<()> {
    let workflow = load_config(cmd.file.as_deref())?.to_workflow()?;
    let cells = workflow.expand_matrix();

    if cmd.json {
        let data = serde_json::json!({
            "workflow": workflow.name,
            "max_parallel": workflow.max_parallel,
            "cells": cells.iter().map(|cell| serde_json::json!({
                "os": cell.os,
                "runner_os": RunnerOs::from_identifier(&cell.os).to_string(),
                "steps": cell.steps.iter().map(|s| serde_json::json!({
                    "name": s.name(),
                    "run": s.definition.command_template,
                })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!(
        "{} {}: {} cells x {} steps",
        INFO,
        style(&workflow.name).bold(),
        cells.len(),
        workflow.steps.len()
    );
    for cell in &cells {
        println!(
            "  {} {}",
            style(&cell.os).bold(),
            style(format!("({})", RunnerOs::from_identifier(&cell.os))).dim()
        );
        for (i, step) in cell.steps.iter().enumerate() {
            println!(
                "    {}. {:<10} {}",
                i + 1,
                step.name(),
                style(&step.definition.command_template).dim()
            );
        }
    }

    Ok(())
}

async fn list_workflows(cmd: &ListCommand) -> Result<()> {
    let store = open_store().await?;
    let workflows = store.list_workflows().await?;

    if cmd.json {
        let mut json_data = Vec::new();
        for workflow in &workflows {
            let runs = store.list_runs(Some(workflow), usize::MAX).await?;
            json_data.push(serde_json::json!({
                "name": workflow,
                "run_count": runs.len(),
                "succeeded": runs.iter().filter(|r| r.status == ExecutionStatus::Completed).count(),
                "failed": runs.iter().filter(|r| r.status == ExecutionStatus::Failed).count(),
            }));
        }
        let data = serde_json::json!({ "workflows": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!("{} No workflows found in history", INFO);
        return Ok(());
    }

    println!("{} Workflows in history:", INFO);

    for workflow in &workflows {
        if cmd.with_counts {
            let runs = store.list_runs(Some(workflow), usize::MAX).await?;
            let succeeded = runs.iter().filter(|r| r.status == ExecutionStatus::Completed).count();
            let failed = runs.iter().filter(|r| r.status == ExecutionStatus::Failed).count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(workflow).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(workflow).bold());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand, verbose: bool) -> Result<()> {
    let store = open_store().await?;

    // If a specific run is requested
    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;

        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Some(summary) => print_run_details(&summary, verbose),
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let runs = store.list_runs(cmd.workflow.as_deref(), cmd.limit).await?;

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, verbose: bool) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow_name).bold());
    println!("  Trigger: {} to {}", summary.event, style(&summary.branch).cyan());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Cells: {} passed, {} failed of {}",
        style(summary.completed_cells).green(),
        style(summary.failed_cells).red(),
        summary.total_cells
    );

    println!();
    for cell in &summary.cells {
        println!("{}", format_cell_report(cell));
        if verbose {
            for step in &cell.steps {
                if let Some(command) = &step.command {
                    println!("      {} $ {}", style(&step.name).dim(), command);
                }
                if let Some(output) = &step.output {
                    for line in output.lines() {
                        println!("        {}", style(line).dim());
                    }
                }
            }
        }
    }
}
