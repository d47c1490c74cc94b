// triage-cli/src/main.rs
// ============================================================================
// Module: Triage CLI Entry Point
// Description: Command dispatcher for one-shot triage pipeline runs,
//              effective-configuration inspection, and audit-log tailing.
// Purpose: Wire a validated TriageConfig to a real Pipeline and drive it to
//          completion, translating the result into process output and an
//          exit code.
// Dependencies: clap, serde_json, toml, triage-config, triage-core,
//               triage-pipeline
// ============================================================================

//! ## Overview
//! Three subcommands cover the external surface spec.md leaves to the CLI
//! (§1's "Out of scope" list names CLI argument parsing and profile loading
//! as injectable, not core, concerns): `run` executes one pipeline pass over
//! a single service/environment, `show-config` loads and prints the
//! effective configuration after defaulting and validation, and `audit-tail`
//! prints the most recent records from the append-only audit log. Nothing
//! here re-implements pipeline logic; [`compose::build_pipeline`] is the only
//! bridge between configuration and concrete collaborators.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod compose;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::BufRead;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;
use triage_config::ConfigError;
use triage_config::TriageConfig;
use triage_core::EnvironmentName;
use triage_core::LogQuery;
use triage_core::ServiceName;
use triage_pipeline::PipelineError;

use crate::compose::ComposeError;

/// Default number of trailing audit records `audit-tail` prints.
const DEFAULT_AUDIT_TAIL_LINES: usize = 20;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition for the triage pipeline.
#[derive(Parser, Debug)]
#[command(name = "triage", about = "Autonomous log-to-ticket triage pipeline")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetches one batch of logs and triages every one of them.
    Run(RunArgs),
    /// Loads, defaults, validates, and prints the effective configuration.
    ShowConfig(ShowConfigArgs),
    /// Prints the most recent records from the append-only audit log.
    AuditTail(AuditTailArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the TOML configuration file (defaults to `./triage.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Service to fetch and triage logs for.
    #[arg(long)]
    service: String,
    /// Deployment environment to fetch and triage logs for.
    #[arg(long)]
    environment: String,
    /// Lookback window, in hours, for the log fetch.
    #[arg(long, default_value_t = 24)]
    window_hours: u32,
    /// Maximum number of log records to fetch.
    #[arg(long, default_value_t = 200)]
    limit: u32,
    /// Forces dry-run semantics for this run, regardless of the
    /// configured `ticket.auto_create_ticket` value.
    #[arg(long)]
    dry_run: bool,
    /// Opaque backend-specific filter, `key=value`; may be repeated.
    #[arg(long = "filter", value_parser = parse_key_value)]
    extra_filters: Vec<(String, String)>,
}

/// Arguments for the `show-config` subcommand.
#[derive(Args, Debug)]
struct ShowConfigArgs {
    /// Path to the TOML configuration file (defaults to `./triage.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for the `audit-tail` subcommand.
#[derive(Args, Debug)]
struct AuditTailArgs {
    /// Path to the TOML configuration file, used only to locate the
    /// configured `cache_dir` (defaults to `./triage.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Number of trailing records to print.
    #[arg(long, default_value_t = DEFAULT_AUDIT_TAIL_LINES)]
    lines: usize,
}

/// Parses a `key=value` CLI argument into an owned pair.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors that abort the CLI before or after a run, as opposed to per-log
/// outcomes (which never abort and are recorded in the audit trail instead).
#[derive(Debug, Error)]
enum CliError {
    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A collaborator could not be constructed from the configuration.
    #[error(transparent)]
    Compose(#[from] ComposeError),
    /// The run itself aborted before processing any log.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// Output could not be formatted or written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The effective configuration could not be re-serialized for display.
    #[error("failed to render configuration: {0}")]
    Render(String),
}

/// Result alias for fallible CLI operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "triage: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Parses arguments and dispatches to the selected subcommand.
fn run() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => command_run(&args),
        Commands::ShowConfig(args) => command_show_config(&args),
        Commands::AuditTail(args) => command_audit_tail(&args),
    }
}

/// Executes one end-to-end pipeline run over the given service/environment.
fn command_run(args: &RunArgs) -> CliResult<()> {
    let mut config = TriageConfig::load(args.config.as_deref())?;
    if args.dry_run {
        config.ticket.auto_create_ticket = false;
    }

    let compose::Composed { pipeline, warnings } = compose::build_pipeline(&config)?;
    let mut stderr = std::io::stderr();
    for warning in &warnings {
        writeln!(stderr, "triage: warning: {warning}")?;
    }

    let query = LogQuery {
        service: ServiceName::new(args.service.clone()),
        environment: EnvironmentName::new(args.environment.clone()),
        window_hours: args.window_hours,
        limit: args.limit,
        extra_filters: args.extra_filters.clone(),
    };
    let summary = pipeline.run(&query)?;

    for warning in &summary.warnings {
        writeln!(stderr, "triage: warning: {warning}")?;
    }

    let report =
        serde_json::to_string_pretty(&summary.statistics).map_err(|err| CliError::Render(err.to_string()))?;
    writeln!(std::io::stdout(), "{report}")?;
    Ok(())
}

/// Loads, defaults, and validates the configuration, then prints it as TOML.
fn command_show_config(args: &ShowConfigArgs) -> CliResult<()> {
    let config = TriageConfig::load(args.config.as_deref())?;
    let rendered = toml::to_string_pretty(&config).map_err(|err| CliError::Render(err.to_string()))?;
    writeln!(std::io::stdout(), "{rendered}")?;
    Ok(())
}

/// Prints the last `lines` records from the configured audit log.
fn command_audit_tail(args: &AuditTailArgs) -> CliResult<()> {
    let config = TriageConfig::load(args.config.as_deref())?;
    let path = config.audit_log_path();
    let Ok(file) = std::fs::File::open(&path) else {
        writeln!(std::io::stdout(), "no audit log found at {}", path.display())?;
        return Ok(());
    };
    let all_lines: Vec<String> =
        std::io::BufReader::new(file).lines().collect::<Result<_, _>>()?;
    let start = all_lines.len().saturating_sub(args.lines);
    let mut stdout = std::io::stdout();
    for line in &all_lines[start..] {
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => {
                let pretty =
                    serde_json::to_string_pretty(&value).map_err(|err| CliError::Render(err.to_string()))?;
                writeln!(stdout, "{pretty}")?;
            }
            Err(_) => writeln!(stdout, "{line}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_key_value;

    #[test]
    fn parses_simple_key_value() {
        assert_eq!(parse_key_value("k=v"), Ok(("k".to_string(), "v".to_string())));
    }

    #[test]
    fn preserves_equals_signs_in_value() {
        assert_eq!(parse_key_value("k=a=b"), Ok(("k".to_string(), "a=b".to_string())));
    }

    #[test]
    fn rejects_missing_equals() {
        assert!(parse_key_value("no-equals").is_err());
    }
}
