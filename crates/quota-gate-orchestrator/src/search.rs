// crates/quota-gate-orchestrator/src/search.rs
// ============================================================================
// Module: Event Search
// Description: Event search builder and date window helpers.
// Purpose: Turn a location and time window into canonical request params.
// Dependencies: quota-gate-config, quota-gate-core, time
// ============================================================================

//! ## Overview
//! An [`EventSearch`] describes one search by postal code or coordinates,
//! with optional radius, unit, and date window. [`EventSearch::to_params`]
//! merges it with the configured search defaults into [`RequestParams`], so
//! the same logical search always yields the same fingerprint.
//!
//! [`DateRange`] computes windows from the local calendar day: `tonight`
//! spans today, `week` spans seven days, `month` spans one calendar month
//! (clamped to the last day of a shorter month), and `custom` passes the
//! caller's bounds through untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use quota_gate_config::DistanceUnit;
use quota_gate_config::SearchConfig;
use quota_gate_core::CalendarDate;
use quota_gate_core::LocalOffset;
use quota_gate_core::RequestParams;
use quota_gate_core::Timestamp;
use time::Date;
use time::Duration;

use crate::error::SearchError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Endpoint for event searches.
pub const EVENTS_ENDPOINT: &str = "events.json";

// ============================================================================
// SECTION: Date Windows
// ============================================================================

/// Resolved start and end bounds for a search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DateWindow {
    /// Inclusive start bound (RFC 3339).
    pub start: Option<String>,
    /// Exclusive end bound (RFC 3339).
    pub end: Option<String>,
}

/// Named date range relative to the local calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateRange {
    /// Today, local midnight to local midnight.
    Tonight,
    /// Today plus the following six days.
    Week,
    /// Today until the same day next month.
    Month,
    /// Caller-supplied bounds.
    Custom {
        /// Start bound, passed through as given.
        start: Option<String>,
        /// End bound, passed through as given.
        end: Option<String>,
    },
}

impl DateRange {
    /// Resolves the range into concrete bounds as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidRequest`] when a bound is unrepresentable.
    pub fn window(&self, now: Timestamp, offset: LocalOffset) -> Result<DateWindow, SearchError> {
        let today = now
            .local_date(offset)
            .ok_or_else(|| SearchError::InvalidRequest("date out of range".to_string()))?;
        let end_date = match self {
            Self::Custom {
                start,
                end,
            } => {
                return Ok(DateWindow {
                    start: start.clone(),
                    end: end.clone(),
                });
            }
            Self::Tonight => today.next_day(),
            Self::Week => today.date().checked_add(Duration::days(7)).map(CalendarDate::new),
            Self::Month => same_day_next_month(today.date()).map(CalendarDate::new),
        }
        .ok_or_else(|| SearchError::InvalidRequest("date out of range".to_string()))?;
        Ok(DateWindow {
            start: Some(render(offset.midnight_of(today))?),
            end: Some(render(offset.midnight_of(end_date))?),
        })
    }
}

// ============================================================================
// SECTION: Event Search
// ============================================================================

/// Where to search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchLocation {
    /// Postal code search.
    PostalCode(String),
    /// Coordinate search.
    Coordinates {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
}

/// One logical event search.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSearch {
    /// Search location.
    location: SearchLocation,
    /// Radius override.
    radius: Option<u32>,
    /// Unit override.
    unit: Option<DistanceUnit>,
    /// Page size override.
    page_size: Option<u32>,
    /// Date window.
    window: DateWindow,
}

impl EventSearch {
    /// Starts a search around a postal code.
    #[must_use]
    pub fn by_postal_code(postal_code: impl Into<String>) -> Self {
        Self::at(SearchLocation::PostalCode(postal_code.into()))
    }

    /// Starts a search around coordinates.
    #[must_use]
    pub fn by_coordinates(latitude: f64, longitude: f64) -> Self {
        Self::at(SearchLocation::Coordinates {
            latitude,
            longitude,
        })
    }

    /// Starts a search at `location`.
    #[must_use]
    pub fn at(location: SearchLocation) -> Self {
        Self {
            location,
            radius: None,
            unit: None,
            page_size: None,
            window: DateWindow::default(),
        }
    }

    /// Overrides the search radius.
    #[must_use]
    pub const fn with_radius(mut self, radius: u32) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Overrides the radius unit.
    #[must_use]
    pub const fn with_unit(mut self, unit: DistanceUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Overrides the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Restricts the search to a date window.
    #[must_use]
    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = window;
        self
    }

    /// Returns the search location.
    #[must_use]
    pub const fn location(&self) -> &SearchLocation {
        &self.location
    }

    /// Builds canonical request parameters with `defaults` applied.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidRequest`] for a blank postal code,
    /// out-of-range coordinates, or a zero radius or page size.
    pub fn to_params(&self, defaults: &SearchConfig) -> Result<RequestParams, SearchError> {
        let mut params = RequestParams::new()
            .with("classificationName", defaults.classification_name.as_str())
            .with("genreId", defaults.genre_id.as_str())
            .with("sort", defaults.sort.as_str());

        let size = self.page_size.unwrap_or(defaults.page_size);
        let radius = self.radius.unwrap_or(defaults.radius);
        if size == 0 || radius == 0 {
            return Err(SearchError::InvalidRequest(
                "radius and page size must be positive".to_string(),
            ));
        }
        params.insert("size", size.to_string());
        params.insert("radius", radius.to_string());
        params.insert("unit", self.unit.unwrap_or(defaults.unit).as_str());

        match &self.location {
            SearchLocation::PostalCode(code) => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(SearchError::InvalidRequest("postal code is empty".to_string()));
                }
                params.insert("postalCode", code);
            }
            SearchLocation::Coordinates {
                latitude,
                longitude,
            } => {
                if !(-90.0..=90.0).contains(latitude) || !(-180.0..=180.0).contains(longitude) {
                    return Err(SearchError::InvalidRequest(
                        "coordinates out of range".to_string(),
                    ));
                }
                params.insert("latlong", format!("{latitude},{longitude}"));
            }
        }

        params.insert_opt("startDateTime", self.window.start.clone());
        params.insert_opt("endDateTime", self.window.end.clone());
        Ok(params)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the same day next month, clamped to that month's last day.
fn same_day_next_month(date: Date) -> Option<Date> {
    let month = date.month().next();
    let year = if month == time::Month::January { date.year().checked_add(1)? } else { date.year() };
    (1..=date.day()).rev().find_map(|day| Date::from_calendar_date(year, month, day).ok())
}

/// Formats a timestamp as RFC 3339.
fn render(timestamp: Timestamp) -> Result<String, SearchError> {
    timestamp
        .to_rfc3339()
        .ok_or_else(|| SearchError::InvalidRequest("date out of range".to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
