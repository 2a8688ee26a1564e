//! Feasibility search and schedule quality.
//!
//! The orchestration layers depend only on the [`FeasibilitySolver`]
//! contract; [`GreedySolver`] is the default strategy behind it.
//!
//! # Contract
//!
//! - A task reported as planned never violates a hard constraint.
//! - A task that cannot be placed is reported unplanned with a reason.
//! - Dangling dependency references are ignored.
//! - `complete` iff every task that needs placement was placed.
//! - The result is a pure function of `(input, level)`.
//!
//! # Soft levels
//!
//! Level 9 applies the configured soft weights in full, level 0 ignores
//! them. In between, weights are scaled by `level / 9`.

mod greedy;
mod occupancy;
mod quality;
mod wrap;

pub use greedy::GreedySolver;
pub use occupancy::{Occupancy, Slot};
pub use quality::{ScheduleQuality, GAP_WEIGHT, SWITCH_WEIGHT};
pub use wrap::{buffered, wrap_pairs, TRAVEL_BUFFER_MINUTES};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    top_codes, AttemptSummary, Diagnostic, EngineInput, PlannedTask, UnplannedTask,
};

/// Soft-preference intensity in `0..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SoftLevel(u8);

impl SoftLevel {
    /// Full soft weights.
    pub const MAX: SoftLevel = SoftLevel(9);
    /// Hard constraints only.
    pub const HARD_ONLY: SoftLevel = SoftLevel(0);

    /// Creates a level, rejecting values above 9.
    pub fn new(level: u8) -> EngineResult<Self> {
        if level > Self::MAX.0 {
            return Err(EngineError::InvalidSoftLevel(level));
        }
        Ok(Self(level))
    }

    /// Raw level.
    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Weight multiplier (`level / 9`).
    #[inline]
    pub fn scale(self) -> f64 {
        f64::from(self.0) / f64::from(Self::MAX.0)
    }

    /// `9, 8, ..., 0`.
    pub fn ladder() -> impl DoubleEndedIterator<Item = SoftLevel> + ExactSizeIterator {
        (0..=Self::MAX.0).rev().map(SoftLevel)
    }
}

/// Result of one feasibility attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// Level the attempt ran at.
    pub level: SoftLevel,
    /// Every task that needs placement was placed.
    pub complete: bool,
    /// Placements, fixed occupancy included.
    pub planned_tasks: Vec<PlannedTask>,
    /// Tasks that could not be placed.
    pub unplanned: Vec<UnplannedTask>,
    /// Non-blocking findings.
    pub warnings: Vec<Diagnostic>,
}

impl Attempt {
    /// Number of placements.
    pub fn planned_count(&self) -> usize {
        self.planned_tasks.len()
    }

    /// Unplanned and warning codes, in report order.
    pub fn reason_codes(&self) -> impl Iterator<Item = &str> {
        self.unplanned
            .iter()
            .map(|u| u.reason.code.as_str())
            .chain(self.warnings.iter().map(|w| w.code.as_str()))
    }

    /// Report entry for this attempt.
    pub fn summary(&self, elapsed_ms: u64) -> AttemptSummary {
        AttemptSummary {
            level: self.level.value(),
            ok: self.complete,
            elapsed_ms,
            planned_count: self.planned_count(),
            top_reasons: top_codes(self.reason_codes(), 5),
        }
    }
}

/// A feasibility search strategy.
///
/// Implementations must be deterministic for a fixed `(input, level)`.
/// Errors are reserved for input-shape faults; placement failures belong
/// in [`Attempt::unplanned`].
pub trait FeasibilitySolver: Send + Sync {
    /// Tries to place every task that needs placement.
    fn attempt(&self, input: &EngineInput, level: SoftLevel) -> EngineResult<Attempt>;
}

impl<S: FeasibilitySolver + ?Sized> FeasibilitySolver for &S {
    fn attempt(&self, input: &EngineInput, level: SoftLevel) -> EngineResult<Attempt> {
        (**self).attempt(input, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::codes;

    #[test]
    fn test_soft_level() {
        assert_eq!(SoftLevel::new(9).unwrap(), SoftLevel::MAX);
        assert_eq!(SoftLevel::new(10), Err(EngineError::InvalidSoftLevel(10)));
        assert_eq!(SoftLevel::HARD_ONLY.scale(), 0.0);
        assert_eq!(SoftLevel::MAX.scale(), 1.0);
        let ladder: Vec<u8> = SoftLevel::ladder().map(SoftLevel::value).collect();
        assert_eq!(ladder, vec![9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_attempt_summary() {
        let unplanned = |id, code: &str| UnplannedTask {
            task_id: id,
            reason: Diagnostic::new(code, "blocked").for_task(id),
        };
        let attempt = Attempt {
            level: SoftLevel::new(4).unwrap(),
            complete: false,
            planned_tasks: vec![],
            unplanned: vec![
                unplanned(1, codes::SPACE_BUSY),
                unplanned(2, codes::MEAL_WINDOW),
                unplanned(3, codes::SPACE_BUSY),
            ],
            warnings: vec![Diagnostic::new(codes::LOCK_CONFLICT, "pins overlap")],
        };
        let summary = attempt.summary(12);
        assert_eq!(summary.level, 4);
        assert!(!summary.ok);
        assert_eq!(summary.elapsed_ms, 12);
        assert_eq!(
            summary.top_reasons,
            vec![codes::SPACE_BUSY, codes::LOCK_CONFLICT, codes::MEAL_WINDOW]
        );
    }
}
