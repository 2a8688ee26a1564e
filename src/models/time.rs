//! Clock and interval models.
//!
//! # Time Model
//! Wire values are `HH:MM` strings. Internally every instant is an
//! integer number of minutes since midnight, and intervals are half-open
//! `[start, end)`. All engine placements are aligned to [`GRID_MINUTES`].

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Placement grid step (minutes).
pub const GRID_MINUTES: i64 = 5;

/// Parses `HH:MM` into minutes since midnight.
///
/// Returns `None` for anything that is not two numeric fields.
pub fn parse_hhmm(value: &str) -> Option<i64> {
    let (h, m) = value.trim().split_once(':')?;
    let h: i64 = h.trim().parse().ok()?;
    let m: i64 = m.trim().parse().ok()?;
    if h < 0 || !(0..60).contains(&m) {
        return None;
    }
    Some(h * 60 + m)
}

/// Formats minutes since midnight as zero-padded `HH:MM`.
pub fn format_hhmm(minutes: i64) -> String {
    let minutes = minutes.max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Rounds up to the next grid boundary.
#[inline]
pub fn snap_up(minutes: i64) -> i64 {
    (minutes + GRID_MINUTES - 1).div_euclid(GRID_MINUTES) * GRID_MINUTES
}

/// A half-open interval `[start, end)` in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    /// Inclusive start (minutes).
    pub start: i64,
    /// Exclusive end (minutes).
    pub end: i64,
}

impl Interval {
    /// Creates a new interval.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Length in minutes.
    #[inline]
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Whether the interval has positive length.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    /// Whether two intervals share at least one minute.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside this interval.
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Parses a pair of `HH:MM` strings.
    pub fn from_hhmm(start: &str, end: &str) -> Option<Self> {
        Some(Self::new(parse_hhmm(start)?, parse_hhmm(end)?))
    }
}

/// A wall-clock window on the wire (`{"start": "09:00", "end": "13:00"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start (`HH:MM`).
    pub start: String,
    /// Window end (`HH:MM`).
    pub end: String,
}

impl TimeWindow {
    /// Creates a window from two `HH:MM` strings.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Builds a window from minutes since midnight.
    pub fn from_minutes(start: i64, end: i64) -> Self {
        Self::new(format_hhmm(start), format_hhmm(end))
    }

    /// Parses both bounds, naming `field` in the error.
    pub fn interval(&self, field: &'static str) -> EngineResult<Interval> {
        let start = parse_hhmm(&self.start).ok_or_else(|| EngineError::InvalidTime {
            field,
            value: self.start.clone(),
        })?;
        let end = parse_hhmm(&self.end).ok_or_else(|| EngineError::InvalidTime {
            field,
            value: self.end.clone(),
        })?;
        Ok(Interval::new(start, end))
    }

    /// Parses both bounds, returning `None` on malformed values.
    pub fn try_interval(&self) -> Option<Interval> {
        Interval::from_hhmm(&self.start, &self.end)
    }
}
