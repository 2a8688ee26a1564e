//! Soft-level ladder.
//!
//! Runs the feasibility solver at levels 9, 8, …, 0 and stops at the
//! first complete attempt. The most-planned incomplete attempt is kept as
//! the fallback for rescue.
//!
//! # Selection
//!
//! | Situation | Returned attempt |
//! |-----------|------------------|
//! | Some level completes | the highest complete level |
//! | None completes | greatest planned count; ties per [`TieBreak`] |
//!
//! The accumulator is threaded through a fold, so the parallel mode
//! (every level evaluated on the rayon pool) selects exactly what the
//! sequential ladder would.

use std::ops::ControlFlow;
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use crate::error::EngineResult;
use crate::models::{Degradation, EngineInput, EngineReport, TieBreak};
use crate::scheduler::{Attempt, FeasibilitySolver, SoftLevel};

/// Result of walking the ladder.
#[derive(Debug, Clone, PartialEq)]
pub struct LadderOutcome {
    /// First complete attempt, if any.
    pub selected: Option<Attempt>,
    /// Best incomplete attempt seen.
    pub best: Option<Attempt>,
    /// Attempt summaries, degradations, and the level returned.
    pub report: EngineReport,
}

impl LadderOutcome {
    /// The attempt whose schedule is returned: the complete one, else the best.
    pub fn chosen(&self) -> Option<&Attempt> {
        self.selected.as_ref().or(self.best.as_ref())
    }
}

#[derive(Debug)]
struct LadderState {
    tie_break: TieBreak,
    report: EngineReport,
    best: Option<Attempt>,
    selected: Option<Attempt>,
}

impl LadderState {
    fn new(tie_break: TieBreak) -> Self {
        Self {
            tie_break,
            report: EngineReport {
                tie_break,
                ..EngineReport::default()
            },
            best: None,
            selected: None,
        }
    }

    fn record(mut self, attempt: Attempt, elapsed_ms: u64) -> ControlFlow<Self, Self> {
        let summary = attempt.summary(elapsed_ms);
        info!(
            level = summary.level,
            complete = summary.ok,
            planned = summary.planned_count,
            elapsed_ms,
            "soft level attempt finished"
        );
        self.report.attempts_summary.push(summary);

        if attempt.complete {
            self.selected = Some(attempt);
            return ControlFlow::Break(self);
        }

        self.report.degradations.push(Degradation {
            level: attempt.level.value(),
            unplanned_count: attempt.unplanned.len(),
            top_reasons: top_reasons(&attempt),
        });
        let replace = match &self.best {
            None => true,
            Some(best) => match self.tie_break {
                TieBreak::PreferHigherLevel => attempt.planned_count() > best.planned_count(),
                TieBreak::PreferLowerLevel => attempt.planned_count() >= best.planned_count(),
            },
        };
        if replace {
            self.best = Some(attempt);
        }
        ControlFlow::Continue(self)
    }

    fn finish(mut self) -> LadderOutcome {
        self.report.selected_level = self
            .selected
            .as_ref()
            .or(self.best.as_ref())
            .map(|a| a.level.value());
        LadderOutcome {
            selected: self.selected,
            best: self.best,
            report: self.report,
        }
    }
}

fn top_reasons(attempt: &Attempt) -> Vec<String> {
    crate::models::top_codes(attempt.reason_codes(), 5)
}

/// Drives a [`FeasibilitySolver`] down the soft-level ladder.
#[derive(Debug, Clone)]
pub struct SoftLevelOrchestrator<S> {
    solver: S,
    tie_break: TieBreak,
    parallel: bool,
}

impl<S: FeasibilitySolver> SoftLevelOrchestrator<S> {
    /// Sequential ladder preferring the higher level on ties.
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            tie_break: TieBreak::default(),
            parallel: false,
        }
    }

    /// Sets the tie-break among equally good incomplete attempts.
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Evaluates all levels concurrently before selecting.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Underlying solver.
    pub fn solver(&self) -> &S {
        &self.solver
    }

    fn timed(&self, input: &EngineInput, level: SoftLevel) -> EngineResult<(Attempt, u64)> {
        let started = Instant::now();
        let attempt = self.solver.attempt(input, level)?;
        Ok((attempt, started.elapsed().as_millis() as u64))
    }

    /// Walks the ladder.
    pub fn run(&self, input: &EngineInput) -> EngineResult<LadderOutcome> {
        let state = LadderState::new(self.tie_break);

        let flow = if self.parallel {
            let levels: Vec<SoftLevel> = SoftLevel::ladder().collect();
            let results: Vec<EngineResult<(Attempt, u64)>> = levels
                .par_iter()
                .map(|&level| self.timed(input, level))
                .collect();
            results
                .into_iter()
                .try_fold(state, |state, result| fold_step(state, result))
        } else {
            SoftLevel::ladder()
                .try_fold(state, |state, level| fold_step(state, self.timed(input, level)))
        };

        match flow {
            ControlFlow::Continue(state) => Ok(state.finish()),
            ControlFlow::Break(Ok(state)) => Ok(state.finish()),
            ControlFlow::Break(Err(e)) => Err(e),
        }
    }
}

fn fold_step(
    state: LadderState,
    result: EngineResult<(Attempt, u64)>,
) -> ControlFlow<EngineResult<LadderState>, LadderState> {
    match result {
        Err(e) => ControlFlow::Break(Err(e)),
        Ok((attempt, elapsed_ms)) => match state.record(attempt, elapsed_ms) {
            ControlFlow::Break(state) => ControlFlow::Break(Ok(state)),
            ControlFlow::Continue(state) => ControlFlow::Continue(state),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{codes, Diagnostic, Interval, PlannedTask, TimeWindow, UnplannedTask};
    use crate::scheduler::GreedySolver;

    /// Completes at levels `<= complete_at`; planned count per level otherwise.
    struct Scripted {
        complete_at: Option<u8>,
        planned: fn(u8) -> usize,
    }

    impl FeasibilitySolver for Scripted {
        fn attempt(&self, _input: &EngineInput, level: SoftLevel) -> EngineResult<Attempt> {
            let complete = self.complete_at.is_some_and(|c| level.value() <= c);
            let planned = (0..(self.planned)(level.value()) as u64)
                .map(|id| PlannedTask::new(id, Interval::new(540, 570)))
                .collect();
            let unplanned = if complete {
                vec![]
            } else {
                vec![UnplannedTask {
                    task_id: 99,
                    reason: Diagnostic::new(codes::SPACE_BUSY, "busy").for_task(99),
                }]
            };
            Ok(Attempt {
                level,
                complete,
                planned_tasks: planned,
                unplanned,
                warnings: vec![],
            })
        }
    }

    fn input() -> EngineInput {
        EngineInput::new(TimeWindow::new("09:00", "12:00"))
    }

    #[test]
    fn test_stops_at_first_complete() {
        let solver = Scripted {
            complete_at: Some(6),
            planned: |_| 3,
        };
        let outcome = SoftLevelOrchestrator::new(solver).run(&input()).unwrap();
        assert_eq!(outcome.selected.as_ref().map(|a| a.level.value()), Some(6));
        assert_eq!(outcome.report.attempts_summary.len(), 4);
        let degraded: Vec<u8> = outcome.report.degradations.iter().map(|d| d.level).collect();
        assert_eq!(degraded, vec![9, 8, 7]);
        assert_eq!(outcome.report.selected_level, Some(6));
    }

    #[test]
    fn test_best_partial_and_tie_break() {
        // Levels 7 and 2 both plan 5 tasks.
        let planned = |level: u8| if level == 7 || level == 2 { 5 } else { 1 };
        let higher = SoftLevelOrchestrator::new(Scripted {
            complete_at: None,
            planned,
        })
        .run(&input())
        .unwrap();
        assert!(higher.selected.is_none());
        assert_eq!(higher.report.attempts_summary.len(), 10);
        assert_eq!(higher.report.degradations.len(), 10);
        assert_eq!(higher.report.selected_level, Some(7));
        assert_eq!(higher.chosen().map(Attempt::planned_count), Some(5));

        let lower = SoftLevelOrchestrator::new(Scripted {
            complete_at: None,
            planned,
        })
        .with_tie_break(TieBreak::PreferLowerLevel)
        .run(&input())
        .unwrap();
        assert_eq!(lower.report.selected_level, Some(2));
        assert_eq!(lower.report.tie_break, TieBreak::PreferLowerLevel);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        use crate::models::Task;

        let input = input()
            .with_task(Task::new(1).with_space(1).with_duration(90))
            .with_task(Task::new(2).with_space(1).with_duration(90))
            .with_task(Task::new(3).with_space(1).with_duration(90));
        let sequential = SoftLevelOrchestrator::new(GreedySolver::new()).run(&input).unwrap();
        let parallel = SoftLevelOrchestrator::new(GreedySolver::new())
            .with_parallel(true)
            .run(&input)
            .unwrap();

        assert_eq!(sequential.selected, parallel.selected);
        assert_eq!(sequential.best, parallel.best);
        assert_eq!(sequential.report.selected_level, parallel.report.selected_level);
        assert_eq!(sequential.report.degradations, parallel.report.degradations);
    }

    #[test]
    fn test_solver_error_propagates() {
        let bad = EngineInput::new(TimeWindow::new("12:00", "09:00"));
        assert!(SoftLevelOrchestrator::new(GreedySolver::new()).run(&bad).is_err());
    }
}
