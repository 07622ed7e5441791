//! Rendering of check results.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use relgate::{CheckResult, Status};
use std::io::Write;
use std::path::Path;

const LINE_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

pub fn render(results: &[CheckResult], format: Format) -> Result<String> {
    match format {
        Format::Text => Ok(render_text(results)),
        Format::Json => {
            let mut json = serde_json::to_string_pretty(results)
                .context("Failed to serialize check results")?;
            json.push('\n');
            Ok(json)
        }
    }
}

fn status_text(status: Status) -> ColoredString {
    match status {
        Status::Ok => status.as_str().green(),
        Status::Warn => status.as_str().yellow(),
        Status::Failed => status.as_str().red(),
    }
}

fn render_text(results: &[CheckResult]) -> String {
    let mut out = String::new();

    for result in results {
        let dots_count = if result.name.len() < LINE_WIDTH {
            LINE_WIDTH - result.name.len()
        } else {
            1
        };
        let dots = ".".repeat(dots_count);

        out.push_str(&format!("{}{}{}", result.name, dots, status_text(result.status)));
        if !result.comment.is_empty() {
            out.push_str(&format!(" {}", format!("({})", result.comment).dimmed()));
        }
        out.push('\n');
        out.push_str(&format!("    {}\n", result.reference.dimmed()));
    }

    let failed = count(results, Status::Failed);
    let warned = count(results, Status::Warn);
    let passed = count(results, Status::Ok);

    out.push('\n');
    if results.is_empty() {
        out.push_str(&format!("{}\n", "No checks to run".dimmed()));
    } else {
        let summary = format!("{} passed, {} warnings, {} failed", passed, warned, failed);
        let summary = if failed > 0 {
            summary.red().bold()
        } else if warned > 0 {
            summary.yellow().bold()
        } else {
            summary.green().bold()
        };
        out.push_str(&format!("{}\n", summary));
    }

    out
}

fn count(results: &[CheckResult], status: Status) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

/// Writes the rendered report to `output`, or to stdout without one.
pub fn emit(results: &[CheckResult], format: Format, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            colored::control::set_override(false);
            let report = render(results, format)?;
            std::fs::write(path, report)
                .with_context(|| format!("Failed to write report to {}", path.display()))
        }
        None => {
            let report = render(results, format)?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(report.as_bytes())
                .context("Failed to write report")
        }
    }
}
