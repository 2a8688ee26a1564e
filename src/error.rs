//! Engine error types.
//!
//! Only faults in the *shape* of the input surface here. Placement
//! failures, global infeasibility, optimizer failures, and rejected
//! candidates are all reported inside [`EngineOutput`](crate::models::EngineOutput).

use thiserror::Error;

/// Result alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Input-shape contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A clock value could not be parsed as `HH:MM`.
    #[error("invalid time `{value}` in {field}: expected HH:MM")]
    InvalidTime {
        /// Input field that carried the value.
        field: &'static str,
        /// Raw value.
        value: String,
    },

    /// The work-day window has no positive length.
    #[error("work day window {start}..{end} is empty")]
    EmptyWorkDay { start: String, end: String },

    /// The meal window ends before it starts.
    #[error("meal window {start}..{end} is inverted")]
    InvalidMealWindow { start: String, end: String },

    /// A soft level outside `0..=9` was requested.
    #[error("soft level {0} is outside 0..=9")]
    InvalidSoftLevel(u8),
}
