// crates/quota-gate-core/src/core/time.rs
// ============================================================================
// Module: Quota Gate Time Model
// Description: Canonical timestamps and local calendar dates for the ledger.
// Purpose: Keep governance deterministic by passing time in explicitly.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The governance core never reads wall-clock time. Hosts supply `now` as a
//! [`Timestamp`] and a [`LocalOffset`] that defines where the local calendar
//! day starts, which drives day rollover.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use time::Date;
use time::OffsetDateTime;
use time::format_description::well_known::Iso8601;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Nanoseconds per millisecond.
const NANOS_PER_MILLI: i128 = 1_000_000;
/// Milliseconds per second.
const MILLIS_PER_SECOND: i64 = 1_000;
/// Maximum supported offset magnitude in minutes (18 hours).
pub const MAX_OFFSET_MINUTES: i16 = 18 * 60;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix epoch timestamp in milliseconds.
///
/// # Invariants
/// - Values are supplied by callers; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns a timestamp shifted forward by `millis`, saturating at the bounds.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: u64) -> Self {
        let delta = if millis > i64::MAX as u64 { i64::MAX } else { millis as i64 };
        Self(self.0.saturating_add(delta))
    }

    /// Returns the milliseconds elapsed from `earlier` to `self`.
    ///
    /// Negative when `earlier` is actually later (clock skew).
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns the calendar date of this instant in the provided offset.
    ///
    /// Returns `None` when the instant is outside the representable range.
    #[must_use]
    pub fn local_date(self, offset: LocalOffset) -> Option<CalendarDate> {
        self.shifted(offset).map(|value| CalendarDate(value.date()))
    }

    /// Returns the local wall-clock time (`HH:MM:SS`) in the provided offset.
    #[must_use]
    pub fn local_time_label(self, offset: LocalOffset) -> String {
        self.shifted(offset).map_or_else(
            || format!("{}s", self.0 / MILLIS_PER_SECOND),
            |value| format!("{:02}:{:02}:{:02}", value.hour(), value.minute(), value.second()),
        )
    }

    /// Returns the instant formatted as RFC 3339 in UTC.
    #[must_use]
    pub fn to_rfc3339(self) -> Option<String> {
        let value = OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * NANOS_PER_MILLI)
            .ok()?;
        value.format(&Rfc3339).ok()
    }

    /// Returns the instant shifted by the local offset, expressed in UTC.
    fn shifted(self, offset: LocalOffset) -> Option<OffsetDateTime> {
        let offset_nanos = i128::from(offset.minutes) * 60 * 1_000 * NANOS_PER_MILLI;
        OffsetDateTime::from_unix_timestamp_nanos(
            i128::from(self.0) * NANOS_PER_MILLI + offset_nanos,
        )
        .ok()
    }
}

// ============================================================================
// SECTION: Local Offset
// ============================================================================

/// Fixed offset from UTC that defines the local calendar day.
///
/// The offset never follows daylight saving time. In zones that observe it,
/// the day rolls over one hour off the wall clock for part of the year;
/// configure the offset that should hold while quota resets matter most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalOffset {
    /// Offset from UTC in minutes.
    minutes: i16,
}

impl LocalOffset {
    /// UTC (zero offset).
    pub const UTC: Self = Self {
        minutes: 0,
    };

    /// Creates an offset clamped to +/- [`MAX_OFFSET_MINUTES`].
    #[must_use]
    pub const fn from_minutes(minutes: i16) -> Self {
        let clamped = if minutes > MAX_OFFSET_MINUTES {
            MAX_OFFSET_MINUTES
        } else if minutes < -MAX_OFFSET_MINUTES {
            -MAX_OFFSET_MINUTES
        } else {
            minutes
        };
        Self {
            minutes: clamped,
        }
    }

    /// Returns the offset in minutes.
    #[must_use]
    pub const fn minutes(self) -> i16 {
        self.minutes
    }

    /// Returns the unix timestamp of local midnight starting `date`.
    #[must_use]
    pub fn midnight_of(self, date: CalendarDate) -> Timestamp {
        let utc_midnight = date.0.midnight().assume_utc().unix_timestamp();
        let local = utc_midnight.saturating_sub(i64::from(self.minutes) * 60);
        Timestamp(local.saturating_mul(MILLIS_PER_SECOND))
    }
}

// ============================================================================
// SECTION: Calendar Date
// ============================================================================

/// Local calendar date, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(Date);

impl CalendarDate {
    /// Wraps a `time` date.
    #[must_use]
    pub const fn new(date: Date) -> Self {
        Self(date)
    }

    /// Returns the underlying `time` date.
    #[must_use]
    pub const fn date(self) -> Date {
        self.0
    }

    /// Returns the following day, if representable.
    #[must_use]
    pub fn next_day(self) -> Option<Self> {
        self.0.next_day().map(Self)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.0.year(), u8::from(self.0.month()), self.0.day())
    }
}

impl FromStr for CalendarDate {
    type Err = time::error::Parse;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Date::parse(value, &Iso8601::DATE).map(Self)
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
