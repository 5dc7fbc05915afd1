// crates/quota-gate-cli/src/main.rs
// ============================================================================
// Module: Quota Gate CLI Entry Point
// Description: Command dispatcher for governed event searches and usage.
// Purpose: Expose search, usage, session reset, and config validation.
// Dependencies: clap, quota-gate-config, quota-gate-orchestrator, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The `quota-gate` CLI runs governed event searches against the discovery
//! API and inspects the persisted usage ledger. Usage and session reset work
//! offline from the configured store, so they never need an API key.
//!
//! Exit codes: `0` on success, `1` on failure, `2` when a search needs
//! explicit confirmation (rerun with `--confirm`).

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use quota_gate_cli::render::SearchReport;
use quota_gate_cli::render::search_error_message;
use quota_gate_cli::render::write_usage_report;
use quota_gate_cli::session::InteractiveSession;
use quota_gate_cli::session::run_session;
use quota_gate_config::DistanceUnit;
use quota_gate_config::QuotaGateConfig;
use quota_gate_core::EndpointId;
use quota_gate_core::LedgerKeeper;
use quota_gate_core::PersistenceFault;
use quota_gate_core::RateGovernor;
use quota_gate_core::Timestamp;
use quota_gate_orchestrator::Clock;
use quota_gate_orchestrator::DateRange;
use quota_gate_orchestrator::EVENTS_ENDPOINT;
use quota_gate_orchestrator::EventSearch;
use quota_gate_orchestrator::GovernanceAuditSink;
use quota_gate_orchestrator::PersistenceAuditEvent;
use quota_gate_orchestrator::SearchError;
use quota_gate_orchestrator::SearchLocation;
use quota_gate_orchestrator::SearchRequest;
use quota_gate_orchestrator::SystemClock;
use quota_gate_orchestrator::UsageReport;
use quota_gate_orchestrator::build_orchestrator;
use quota_gate_orchestrator::open_audit_sink;
use quota_gate_orchestrator::open_ledger_store;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "quota-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one governed event search.
    Search(SearchCommand),
    /// Show quota usage from the persisted ledger.
    Usage(UsageCommand),
    /// Start a new session: zero the session counter and clear lockouts.
    ResetSession(ConfigArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Run an interactive search session on stdin.
    Interactive(ConfigArgs),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a quota-gate.toml file.
    Validate(ConfigArgs),
}

/// Config file selection shared by every command.
#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// Optional config file path (defaults to quota-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for a one-shot search.
#[derive(Args, Debug)]
struct SearchCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Postal code to search around.
    #[arg(long, value_name = "CODE", required_unless_present = "latitude", conflicts_with = "latitude")]
    zip: Option<String>,
    /// Latitude to search around.
    #[arg(long = "lat", value_name = "DEG", allow_hyphen_values = true, requires = "longitude")]
    latitude: Option<f64>,
    /// Longitude to search around.
    #[arg(long = "long", value_name = "DEG", allow_hyphen_values = true, requires = "latitude")]
    longitude: Option<f64>,
    /// Search radius (defaults to the configured radius).
    #[arg(long, value_name = "N")]
    radius: Option<u32>,
    /// Radius unit (defaults to the configured unit).
    #[arg(long, value_enum)]
    unit: Option<UnitArg>,
    /// Named date range.
    #[arg(long, value_enum, conflicts_with_all = ["start", "end"])]
    range: Option<RangeArg>,
    /// Custom window start (RFC 3339), passed through as given.
    #[arg(long, value_name = "DATETIME")]
    start: Option<String>,
    /// Custom window end (RFC 3339), passed through as given.
    #[arg(long, value_name = "DATETIME")]
    end: Option<String>,
    /// Proceed when the search needs explicit confirmation.
    #[arg(long, action = ArgAction::SetTrue)]
    confirm: bool,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for the usage command.
#[derive(Args, Debug)]
struct UsageCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Output formats.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable text.
    Text,
    /// JSON document.
    Json,
}

/// Radius units accepted on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum UnitArg {
    /// Statute miles.
    Miles,
    /// Kilometers.
    Km,
}

impl From<UnitArg> for DistanceUnit {
    fn from(value: UnitArg) -> Self {
        match value {
            UnitArg::Miles => Self::Miles,
            UnitArg::Km => Self::Km,
        }
    }
}

/// Named date ranges accepted on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum RangeArg {
    /// Today.
    Tonight,
    /// The next seven days.
    Week,
    /// Until the same day next month.
    Month,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Search(command) => command_search(command).await,
        Commands::Usage(command) => command_usage(&command),
        Commands::ResetSession(command) => command_reset_session(&command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
        Commands::Interactive(command) => command_interactive(&command).await,
    }
}

// ============================================================================
// SECTION: Search Command
// ============================================================================

/// Executes the `search` command.
async fn command_search(command: SearchCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let orchestrator = build_orchestrator(&config)
        .map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    let offset = orchestrator.governor().policy().local_offset;

    let mut search = event_search(&command)?;
    if let Some(range) = date_range(&command) {
        let window = range.window(orchestrator.now(), offset).map_err(search_failed)?;
        search = search.with_window(window);
    }
    let params = search.to_params(&config.search).map_err(search_failed)?;
    let request = SearchRequest::user(EndpointId::new(EVENTS_ENDPOINT), params);

    let result = match orchestrator.search(request.clone()).await {
        Err(SearchError::ConfirmationRequired {
            token, ..
        }) if command.confirm => orchestrator.search(request.confirmed(token)).await,
        other => other,
    };
    match result {
        Ok(outcome) => {
            let report = SearchReport::from_outcome(&outcome);
            match command.format {
                OutputFormat::Text => {
                    let mut stdout = std::io::stdout();
                    report.write_text(&mut stdout).map_err(|err| output_error("stdout", &err))?;
                }
                OutputFormat::Json => write_json(&report)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(SearchError::ConfirmationRequired {
            reason, ..
        }) => {
            write_stderr_line(&reason).map_err(|err| output_error("stderr", &err))?;
            write_stderr_line("rerun with --confirm to proceed")
                .map_err(|err| output_error("stderr", &err))?;
            Ok(ExitCode::from(2))
        }
        Err(err) => Err(search_failed(err)),
    }
}

/// Builds the event search described by the command flags.
fn event_search(command: &SearchCommand) -> CliResult<EventSearch> {
    let location = match (&command.zip, command.latitude, command.longitude) {
        (Some(zip), None, None) => SearchLocation::PostalCode(zip.clone()),
        (None, Some(latitude), Some(longitude)) => SearchLocation::Coordinates {
            latitude,
            longitude,
        },
        _ => {
            return Err(CliError::new(
                "search requires either --zip or both --lat and --long".to_string(),
            ));
        }
    };
    let mut search = EventSearch::at(location);
    if let Some(radius) = command.radius {
        search = search.with_radius(radius);
    }
    if let Some(unit) = command.unit {
        search = search.with_unit(unit.into());
    }
    Ok(search)
}

/// Resolves the date range flags.
fn date_range(command: &SearchCommand) -> Option<DateRange> {
    if command.start.is_some() || command.end.is_some() {
        return Some(DateRange::Custom {
            start: command.start.clone(),
            end: command.end.clone(),
        });
    }
    command.range.map(|range| match range {
        RangeArg::Tonight => DateRange::Tonight,
        RangeArg::Week => DateRange::Week,
        RangeArg::Month => DateRange::Month,
    })
}

/// Wraps a search error with its user-facing message.
fn search_failed(err: SearchError) -> CliError {
    CliError::new(format!("search failed: {}", search_error_message(&err)))
}

// ============================================================================
// SECTION: Ledger Commands
// ============================================================================

/// Executes the `usage` command against the persisted ledger.
fn command_usage(command: &UsageCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let policy = config.governance.policy();
    let now = SystemClock.now();
    let (keeper, _audit) = open_keeper(&config, now)?;
    let governor = RateGovernor::new(policy);
    let ledger = keeper.ledger();
    let report = UsageReport {
        usage: governor.snapshot(ledger),
        level: governor.usage_level(ledger),
        blocked_until: ledger.blocked_until(),
        consecutive_failures: 0,
    };
    match command.format {
        OutputFormat::Text => {
            let mut stdout = std::io::stdout();
            write_usage_report(&mut stdout, &report, policy.local_offset)
                .map_err(|err| output_error("stdout", &err))?;
        }
        OutputFormat::Json => write_json(&report)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `reset-session` command against the persisted ledger.
fn command_reset_session(command: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(command)?;
    let now = SystemClock.now();
    let (mut keeper, audit) = open_keeper(&config, now)?;
    if let Some(fault) = keeper.reset_session() {
        record_fault(audit.as_ref(), &fault, now);
        return Err(CliError::new(format!("session reset not saved: {}", fault.error)));
    }
    write_stdout_line(&format!(
        "session reset; {} calls today",
        keeper.ledger().daily_count()
    ))
    .map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Opens the ledger as of `now`, rolling the day over and expiring lockouts.
fn open_keeper(
    config: &QuotaGateConfig,
    now: Timestamp,
) -> CliResult<(LedgerKeeper, Arc<dyn GovernanceAuditSink>)> {
    let policy = config.governance.policy();
    let (store, open_fault) = open_ledger_store(&config.store)
        .map_err(|err| CliError::new(format!("store open failed: {err}")))?;
    let audit = open_audit_sink(&config.audit)
        .map_err(|err| CliError::new(format!("audit open failed: {err}")))?;
    let (mut keeper, load_fault) = LedgerKeeper::open(store, &policy, now);
    let mut faults: Vec<PersistenceFault> = open_fault.into_iter().chain(load_fault).collect();
    faults.extend(keeper.rollover_if_new_day(now, &policy));
    faults.extend(keeper.clear_block_if_expired(now));
    for fault in &faults {
        record_fault(audit.as_ref(), fault, now);
    }
    Ok((keeper, audit))
}

/// Logs one persistence fault.
fn record_fault(audit: &dyn GovernanceAuditSink, fault: &PersistenceFault, now: Timestamp) {
    audit.record_persistence(&PersistenceAuditEvent::new(fault, now));
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes the config validation command.
fn command_config_validate(command: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(command)?;
    write_stdout_line("config ok").map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads and validates configuration.
fn load_config(args: &ConfigArgs) -> CliResult<QuotaGateConfig> {
    QuotaGateConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))
}

// ============================================================================
// SECTION: Interactive Command
// ============================================================================

/// Executes the `interactive` command on stdin and stdout.
async fn command_interactive(command: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(command)?;
    let orchestrator = build_orchestrator(&config)
        .map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    let mut session = InteractiveSession::new(orchestrator, config.search.clone());
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_session(&mut session, input, &mut stdout)
        .await
        .map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a value as pretty JSON to stdout.
fn write_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("json output failed: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| output_error("stdout", &err))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
