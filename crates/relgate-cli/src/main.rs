//! # relgate-cli
//!
//! Command-line interface for the relgate release gate.
//!
//! Loads the two release descriptors, runs the check tree against them and
//! prints one line per clause. Failed checks are reported, not fatal: the
//! exit code is nonzero only when the run itself could not complete.

mod errors;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use relgate::{
    Config, Credentials, ErrorPolicy, FileSource, Gate, ReleaseDescriptor, StatusRule,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use errors::enhance_error;
use report::Format;

#[derive(Parser)]
#[command(name = "relgate")]
#[command(about = "Release gate: run declarative checks between two releases", long_about = None)]
#[command(version)]
struct Cli {
    /// Release descriptor (path or http(s) URL) of the previous release
    #[arg(value_name = "OLD_RELEASE")]
    old_release: String,

    /// Release descriptor (path or http(s) URL) of the release under test
    #[arg(value_name = "NEW_RELEASE")]
    new_release: String,

    /// Check file; also substituted for every `import: -`
    #[arg(value_name = "CHECKS")]
    checks: PathBuf,

    /// Root check file to evaluate instead of CHECKS
    #[arg(long, value_name = "FILE")]
    root: Option<PathBuf>,

    /// Mount a JSON or YAML file under a namespace
    #[arg(long = "data", value_name = "NAME=PATH")]
    data: Vec<String>,

    /// Skip commit provenance (no `git` namespace)
    #[arg(long)]
    no_git: bool,

    /// Record expression errors as failed results instead of aborting
    #[arg(long)]
    record_errors: bool,

    /// Use truthiness instead of the zero-value rule for non-boolean results
    #[arg(long)]
    truthy_status: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        enhance_error(e).display();
        std::process::exit(1);
    }
}

/// `RELGATE_LOG` wins over `-v`; logs go to stderr so reports stay clean.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("RELGATE_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn load_config() -> Config {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    Config::load(&cwd).unwrap_or_else(|e| {
        eprintln!(
            "{} Failed to load config: {:#}",
            "⚠".yellow().bold(),
            e
        );
        Config::default()
    })
}

fn apply_flags(mut config: Config, cli: &Cli) -> Config {
    if cli.no_git {
        config = config.with_git_enabled(false);
    }
    if cli.record_errors {
        config = config.with_error_policy(ErrorPolicy::Record);
    }
    if cli.truthy_status {
        config = config.with_status_rule(StatusRule::Truthy);
    }
    config
}

fn run(cli: Cli) -> Result<()> {
    let config = apply_flags(load_config(), &cli);
    tracing::debug!(?config, "effective configuration");

    let old = ReleaseDescriptor::load(&cli.old_release)
        .with_context(|| format!("Failed to load release {}", cli.old_release))?;
    let new = ReleaseDescriptor::load(&cli.new_release)
        .with_context(|| format!("Failed to load release {}", cli.new_release))?;

    let mut gate = Gate::new(config);
    if gate.config().git_enabled {
        gate = gate.with_credentials(Credentials::from_env());
    }
    for spec in &cli.data {
        gate = gate.with_data(FileSource::from_spec(spec)?);
    }

    let results = gate.run(old, new, &cli.checks, cli.root.as_deref())?;
    let destination = report_destination(cli.output.as_deref());
    tracing::info!(results = results.len(), %destination, "writing report");
    report::emit(&results, cli.format, cli.output.as_deref())
}

fn report_destination(output: Option<&Path>) -> String {
    output.map_or_else(|| "stdout".to_string(), |p| p.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "relgate",
            "old.yml",
            "new.yml",
            "checks.yml",
            "--no-git",
            "--record-errors",
            "--truthy-status",
        ]);
        let config = apply_flags(Config::default(), &cli);
        assert!(!config.git_enabled);
        assert_eq!(config.error_policy, ErrorPolicy::Record);
        assert_eq!(config.status_rule, StatusRule::Truthy);
    }

    #[test]
    fn absent_flags_keep_config() {
        let cli = Cli::parse_from(["relgate", "old.yml", "new.yml", "checks.yml"]);
        let config = apply_flags(Config::default().with_error_policy(ErrorPolicy::Record), &cli);
        assert!(config.git_enabled);
        assert_eq!(config.error_policy, ErrorPolicy::Record);
        assert_eq!(cli.format, Format::Text);
    }

    #[test]
    fn report_destination_names_stdout_without_output() {
        assert_eq!(report_destination(None), "stdout");
        assert_eq!(report_destination(Some(Path::new("out/report.json"))), "out/report.json");
    }

    #[test]
    fn repeatable_data_and_output_flags() {
        let cli = Cli::parse_from([
            "relgate",
            "old.yml",
            "new.yml",
            "checks.yml",
            "--data",
            "coverage=cov.json",
            "--data",
            "tests=tests.yml",
            "--format",
            "json",
            "-o",
            "report.json",
            "-vv",
        ]);
        assert_eq!(cli.data, vec!["coverage=cov.json", "tests=tests.yml"]);
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.output, Some(PathBuf::from("report.json")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn run_writes_a_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.yml");
        let new = dir.path().join("new.yml");
        let checks = dir.path().join("checks.yml");
        let output = dir.path().join("report.json");
        std::fs::write(&old, "release: ZZZ_1.3\ncomponents: []\n").unwrap();
        std::fs::write(&new, "release: ZZZ_1.4\ncomponents: []\n").unwrap();
        std::fs::write(
            &checks,
            "steps:\n  - name: Bumped\n    condition: releases.old.release != releases.new.release\n",
        )
        .unwrap();

        let path = |p: &PathBuf| p.to_str().unwrap().to_string();
        let cli = Cli::parse_from([
            "relgate".to_string(),
            path(&old),
            path(&new),
            path(&checks),
            "--no-git".to_string(),
            "--format".to_string(),
            "json".to_string(),
            "--output".to_string(),
            path(&output),
        ]);
        run(cli).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written[0]["name"], "Bumped");
        assert_eq!(written[0]["status"], "OK");
    }
}
