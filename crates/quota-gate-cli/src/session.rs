// crates/quota-gate-cli/src/session.rs
// ============================================================================
// Module: Interactive Session
// Description: Line-oriented search loop over one long-lived orchestrator.
// Purpose: Surface quota decisions and the confirm/cancel flow in a terminal.
// Dependencies: quota-gate-config, quota-gate-core, quota-gate-orchestrator, tokio
// ============================================================================

//! ## Overview
//! An interactive session keeps one [`RequestOrchestrator`] alive, so the
//! session counter, response cache, and breaker behave as they would in a
//! long-running client. A search that needs confirmation is parked; the
//! next `confirm` retries it with the issued token and `cancel` drops it.
//!
//! Commands:
//! - `search <postal-code> [tonight|week|month]`
//! - `near <latitude> <longitude> [tonight|week|month]`
//! - `usage`, `reset`, `confirm`, `cancel`, `help`, `quit`

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;

use quota_gate_config::SearchConfig;
use quota_gate_core::EndpointId;
use quota_gate_orchestrator::DateRange;
use quota_gate_orchestrator::EVENTS_ENDPOINT;
use quota_gate_orchestrator::EventSearch;
use quota_gate_orchestrator::RequestOrchestrator;
use quota_gate_orchestrator::SearchError;
use quota_gate_orchestrator::SearchLocation;
use quota_gate_orchestrator::SearchRequest;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;

use crate::render::SearchReport;
use crate::render::search_error_message;
use crate::render::write_usage_report;

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Help text listing session commands.
const HELP: &str = "commands:
  search <postal-code> [tonight|week|month]
  near <latitude> <longitude> [tonight|week|month]
  usage      show quota usage
  reset      start a new session
  confirm    proceed with the pending search
  cancel     drop the pending search
  quit       leave the session";

/// One parsed session command.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Search for events.
    Search {
        /// Where to search.
        location: SearchLocation,
        /// Optional date range.
        range: Option<DateRange>,
    },
    /// Show usage.
    Usage,
    /// Reset the session.
    Reset,
    /// Confirm the pending search.
    Confirm,
    /// Drop the pending search.
    Cancel,
    /// Show help.
    Help,
    /// Leave the session.
    Quit,
}

/// Parses one input line; blank lines yield `None`.
///
/// # Errors
///
/// Returns a usage message when the line is not a valid command.
pub fn parse_command(line: &str) -> Result<Option<SessionCommand>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };
    let command = match (verb.to_ascii_lowercase().as_str(), args) {
        ("search", [postal_code, rest @ ..]) => SessionCommand::Search {
            location: SearchLocation::PostalCode((*postal_code).to_string()),
            range: parse_range(rest)?,
        },
        ("near", [latitude, longitude, rest @ ..]) => SessionCommand::Search {
            location: SearchLocation::Coordinates {
                latitude: parse_degrees(latitude)?,
                longitude: parse_degrees(longitude)?,
            },
            range: parse_range(rest)?,
        },
        ("usage", []) => SessionCommand::Usage,
        ("reset", []) => SessionCommand::Reset,
        ("confirm" | "yes" | "y", []) => SessionCommand::Confirm,
        ("cancel" | "no" | "n", []) => SessionCommand::Cancel,
        ("help" | "?", []) => SessionCommand::Help,
        ("quit" | "exit", []) => SessionCommand::Quit,
        _ => return Err(format!("unrecognized command: {}; type `help`", line.trim())),
    };
    Ok(Some(command))
}

/// Parses an optional trailing range word.
fn parse_range(words: &[&str]) -> Result<Option<DateRange>, String> {
    match words {
        [] => Ok(None),
        ["tonight"] => Ok(Some(DateRange::Tonight)),
        ["week"] => Ok(Some(DateRange::Week)),
        ["month"] => Ok(Some(DateRange::Month)),
        _ => Err(format!("unknown range: {}; use tonight, week, or month", words.join(" "))),
    }
}

/// Parses a coordinate in degrees.
fn parse_degrees(word: &str) -> Result<f64, String> {
    word.parse::<f64>().map_err(|_| format!("invalid coordinate: {word}"))
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Whether the session loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlow {
    /// Read the next line.
    Continue,
    /// Stop reading.
    Quit,
}

/// Interactive session state.
pub struct InteractiveSession {
    /// Long-lived orchestrator.
    orchestrator: RequestOrchestrator,
    /// Parameters injected into every search.
    defaults: SearchConfig,
    /// Search awaiting confirmation, token attached.
    pending: Option<SearchRequest>,
}

impl InteractiveSession {
    /// Creates a session over `orchestrator`.
    #[must_use]
    pub const fn new(orchestrator: RequestOrchestrator, defaults: SearchConfig) -> Self {
        Self {
            orchestrator,
            defaults,
            pending: None,
        }
    }

    /// Returns true when a search awaits confirmation.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the orchestrator driving this session.
    #[must_use]
    pub const fn orchestrator(&self) -> &RequestOrchestrator {
        &self.orchestrator
    }

    /// Executes one command, writing its output to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the writer fails.
    pub async fn execute<W: Write>(
        &mut self,
        command: SessionCommand,
        out: &mut W,
    ) -> io::Result<SessionFlow> {
        match command {
            SessionCommand::Search {
                location,
                range,
            } => {
                self.pending = None;
                match self.build_request(location, range.as_ref()) {
                    Ok(request) => self.submit(request, out).await?,
                    Err(err) => writeln!(out, "{}", search_error_message(&err))?,
                }
            }
            SessionCommand::Usage => {
                let report = self.orchestrator.usage().await;
                let offset = self.orchestrator.governor().policy().local_offset;
                write_usage_report(out, &report, offset)?;
            }
            SessionCommand::Reset => {
                self.pending = None;
                self.orchestrator.reset_session().await;
                let report = self.orchestrator.usage().await;
                writeln!(out, "session reset; {} calls today", report.usage.daily_count)?;
            }
            SessionCommand::Confirm => match self.pending.take() {
                Some(request) => self.submit(request, out).await?,
                None => writeln!(out, "nothing to confirm")?,
            },
            SessionCommand::Cancel => {
                if self.pending.take().is_some() {
                    writeln!(out, "search cancelled")?;
                } else {
                    writeln!(out, "nothing to cancel")?;
                }
            }
            SessionCommand::Help => writeln!(out, "{HELP}")?,
            SessionCommand::Quit => return Ok(SessionFlow::Quit),
        }
        Ok(SessionFlow::Continue)
    }

    /// Builds a user search for `location` and `range`.
    fn build_request(
        &self,
        location: SearchLocation,
        range: Option<&DateRange>,
    ) -> Result<SearchRequest, SearchError> {
        let mut search = EventSearch::at(location);
        if let Some(range) = range {
            let offset = self.orchestrator.governor().policy().local_offset;
            search = search.with_window(range.window(self.orchestrator.now(), offset)?);
        }
        let params = search.to_params(&self.defaults)?;
        Ok(SearchRequest::user(EndpointId::new(EVENTS_ENDPOINT), params))
    }

    /// Runs a search and parks it when confirmation is required.
    async fn submit<W: Write>(&mut self, request: SearchRequest, out: &mut W) -> io::Result<()> {
        match self.orchestrator.search(request.clone()).await {
            Ok(outcome) => SearchReport::from_outcome(&outcome).write_text(out),
            Err(SearchError::ConfirmationRequired {
                reason,
                token,
                ..
            }) => {
                self.pending = Some(request.confirmed(token));
                writeln!(out, "{reason}")?;
                writeln!(out, "type `confirm` to continue or `cancel` to stop")
            }
            Err(err) => writeln!(out, "{}", search_error_message(&err)),
        }
    }
}

/// Reads commands from `input` until `quit` or end of input.
///
/// # Errors
///
/// Returns [`io::Error`] when reading or writing fails.
pub async fn run_session<R, W>(
    session: &mut InteractiveSession,
    input: R,
    out: &mut W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        let prompt = if session.has_pending() { "confirm? " } else { "> " };
        write!(out, "{prompt}")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(command)) => {
                if session.execute(command, out).await? == SessionFlow::Quit {
                    break;
                }
            }
            Err(message) => writeln!(out, "{message}")?,
        }
    }
    Ok(())
}
