//! CLI output formatting

use crate::{
    core::ExecutionStatus,
    execution::ExecutionEvent,
    persistence::{CellSummary, RunSummary, StepOutcome},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over the cell x step slots of a run
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(bar_style.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Print a horizontal rule spanning the terminal width
pub fn print_separator() {
    println!("{}", separator());
}

fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    style("─".repeat(width)).dim().to_string()
}

/// Format a recorded step outcome for display
pub fn format_outcome(outcome: StepOutcome) -> String {
    match outcome {
        StepOutcome::Pending => style("PENDING").dim().to_string(),
        StepOutcome::Running => style("RUNNING").yellow().to_string(),
        StepOutcome::Success => style("SUCCESS").green().to_string(),
        StepOutcome::Failure => style("FAILURE").red().to_string(),
        StepOutcome::Skipped => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("SUCCESS").green().to_string(),
        ExecutionStatus::Failed => style("FAILURE").red().to_string(),
    }
}

fn status_icon(status: ExecutionStatus) -> Emoji<'static, 'static> {
    match status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Pending => INFO,
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// One-line run summary for history listings
pub fn format_run_summary(summary: &RunSummary) -> String {
    format!(
        "{} {} - {} - {} on {} - {} ({}/{} cells passed) - {}",
        status_icon(summary.status),
        style(short_id(&summary.run_id)).dim(),
        style(&summary.workflow_name).bold(),
        summary.event,
        style(&summary.branch).cyan(),
        format_status(summary.status),
        summary.completed_cells,
        summary.total_cells,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Multi-line report of one cell: status plus one line per step
pub fn format_cell_report(cell: &CellSummary) -> String {
    let mut lines = vec![format!(
        "{} {} {}",
        status_icon(cell.status),
        style(&cell.os).bold(),
        format_status(cell.status)
    )];

    for step in &cell.steps {
        let mut line = format!("    {:<10} {}", step.name, format_outcome(step.outcome));
        if let Some(ms) = step.duration_ms {
            line.push_str(&format!(
                " {}",
                style(format_duration(Duration::from_millis(ms))).dim()
            ));
        }
        if let Some(error) = &step.error {
            line.push_str(&format!(" {}", style(format!("({})", error)).dim()));
        }
        lines.push(line);
    }

    lines.join("\n")
}

/// Format an execution event for display
///
/// Returns `None` for events that have no console line of their own.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            workflow_name,
            event,
            cells,
            ..
        } => Some(format!(
            "{} Starting {} for {} ({}) on {}",
            ROCKET,
            style(workflow_name).bold(),
            event,
            style(short_id(run_id)).dim(),
            cells.join(", ")
        )),
        ExecutionEvent::CellStarted { os, .. } => {
            Some(format!("{} {} started", SPINNER, style(os).cyan()))
        }
        ExecutionEvent::StepStarted { .. } => None,
        ExecutionEvent::StepCompleted {
            os,
            step,
            duration_ms,
            ..
        } => Some(format!(
            "{} [{}] {} {}",
            CHECK,
            style(os).dim(),
            style(step).green(),
            style(format_duration(Duration::from_millis(*duration_ms))).dim()
        )),
        ExecutionEvent::StepFailed {
            os, step, error, ..
        } => Some(format!(
            "{} [{}] {}: {}",
            CROSS,
            style(os).dim(),
            style(step).red(),
            style(error).dim()
        )),
        ExecutionEvent::StepSkipped { os, step, reason } => Some(format!(
            "{} [{}] {} skipped ({})",
            SKIP,
            style(os).dim(),
            style(step).dim(),
            reason
        )),
        ExecutionEvent::CellFinished { os, status } => Some(format!(
            "{} {} {}",
            status_icon(*status),
            style(os).bold(),
            format_status(*status)
        )),
        ExecutionEvent::RunFinished { .. } => None,
    }
}

/// Format step output with truncation, keeping the last lines
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.trim_end().to_string()
    } else {
        let kept = lines[lines.len() - max_lines..].join("\n");
        format!(
            "{}... ({} earlier lines)\n{}",
            style("[truncated]").dim(),
            lines.len() - max_lines,
            kept
        )
    }
}

/// Human-readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
