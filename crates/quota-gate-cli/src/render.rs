// crates/quota-gate-cli/src/render.rs
// ============================================================================
// Module: CLI Rendering
// Description: User-facing text for search results, usage, and errors.
// Purpose: Keep quota messages distinct from network failure messages.
// Dependencies: quota-gate-core, quota-gate-orchestrator, serde, serde_json
// ============================================================================

//! ## Overview
//! Extracts a compact event listing from the opaque discovery payload and
//! formats usage counters for the terminal. Connectivity and upstream
//! failures are rendered as plain error banners; only quota outcomes carry
//! the governor's reason text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;

use quota_gate_core::LocalOffset;
use quota_gate_core::UsageSnapshot;
use quota_gate_orchestrator::SearchError;
use quota_gate_orchestrator::SearchOutcome;
use quota_gate_orchestrator::UsageReport;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Event Listing
// ============================================================================

/// One event extracted from a discovery payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    /// Event name.
    pub name: String,
    /// Local start date (`YYYY-MM-DD`).
    pub date: Option<String>,
    /// Local start time (`HH:MM:SS`).
    pub time: Option<String>,
    /// Venue name.
    pub venue: Option<String>,
    /// Venue city.
    pub city: Option<String>,
}

impl EventSummary {
    /// Formats the event as one listing line.
    #[must_use]
    pub fn line(&self) -> String {
        let when = match (&self.date, &self.time) {
            (Some(date), Some(time)) => format!("{date} {}", time.get(.. 5).unwrap_or(time.as_str())),
            (Some(date), None) => date.clone(),
            (None, _) => "date tba".to_string(),
        };
        let place = match (&self.venue, &self.city) {
            (Some(venue), Some(city)) => format!(" @ {venue}, {city}"),
            (Some(venue), None) => format!(" @ {venue}"),
            (None, Some(city)) => format!(" @ {city}"),
            (None, None) => String::new(),
        };
        format!("{when}  {}{place}", self.name)
    }
}

/// Extracts events from a discovery payload; unknown shapes yield none.
#[must_use]
pub fn event_summaries(payload: &Value) -> Vec<EventSummary> {
    let Some(events) = payload.pointer("/_embedded/events").and_then(Value::as_array) else {
        return Vec::new();
    };
    events
        .iter()
        .filter_map(|event| {
            let name = event.get("name").and_then(Value::as_str)?;
            let venue = event.pointer("/_embedded/venues/0");
            Some(EventSummary {
                name: name.to_string(),
                date: text_at(event, "/dates/start/localDate"),
                time: text_at(event, "/dates/start/localTime"),
                venue: venue.and_then(|venue| text_at(venue, "/name")),
                city: venue.and_then(|venue| text_at(venue, "/city/name")),
            })
        })
        .collect()
}

/// Returns the string at `pointer`, if any.
fn text_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

// ============================================================================
// SECTION: Search Report
// ============================================================================

/// Serializable summary of one search outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    /// True when served from the response cache.
    pub cached: bool,
    /// Total matches reported upstream.
    pub total: Option<u64>,
    /// Events on the returned page.
    pub events: Vec<EventSummary>,
    /// Usage after the search.
    pub usage: UsageSnapshot,
}

impl SearchReport {
    /// Builds a report from a search outcome.
    #[must_use]
    pub fn from_outcome(outcome: &SearchOutcome) -> Self {
        Self {
            cached: outcome.cached,
            total: outcome.payload.pointer("/page/totalElements").and_then(Value::as_u64),
            events: event_summaries(&outcome.payload),
            usage: outcome.usage,
        }
    }

    /// Writes the report as text.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the writer fails.
    pub fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.events.is_empty() {
            writeln!(out, "No events found.")?;
        }
        for event in &self.events {
            writeln!(out, "  {}", event.line())?;
        }
        if let Some(total) = self.total
            && total > self.events.len() as u64
        {
            writeln!(out, "  ... {total} matches in total")?;
        }
        let source = if self.cached { " (cached)" } else { "" };
        writeln!(out, "{}{source}", usage_line(&self.usage))
    }
}

// ============================================================================
// SECTION: Usage
// ============================================================================

/// Formats usage counters as one line.
#[must_use]
pub fn usage_line(usage: &UsageSnapshot) -> String {
    format!(
        "usage: {} calls this session (confirm at {}), {}/{} today",
        usage.session_count, usage.confirmation_threshold, usage.daily_count, usage.daily_limit
    )
}

/// Writes a usage report, rendering any lockout in local time.
///
/// # Errors
///
/// Returns [`io::Error`] when the writer fails.
pub fn write_usage_report<W: Write>(
    out: &mut W,
    report: &UsageReport,
    offset: LocalOffset,
) -> io::Result<()> {
    writeln!(out, "{} [{}]", usage_line(&report.usage), report.level.as_str())?;
    if let Some(until) = report.blocked_until {
        writeln!(out, "locked out until {}", until.local_time_label(offset))?;
    }
    if report.consecutive_failures > 0 {
        writeln!(out, "{} consecutive failed calls", report.consecutive_failures)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Returns the message shown for a search that produced no payload.
#[must_use]
pub fn search_error_message(error: &SearchError) -> String {
    match error {
        SearchError::Connectivity(_) => {
            "Could not reach the event service. Check your connection and try again.".to_string()
        }
        SearchError::Upstream {
            status,
        } => format!("The event service returned an error (HTTP {status}). Try again later."),
        SearchError::MalformedResponse(_) => {
            "The event service sent a response that could not be read.".to_string()
        }
        SearchError::QuotaBlocked {
            reason, ..
        }
        | SearchError::ConfirmationRequired {
            reason, ..
        } => reason.clone(),
        SearchError::CircuitOpen {
            ..
        }
        | SearchError::Refused(_)
        | SearchError::InvalidRequest(_) => error.to_string(),
    }
}
