//! Diagnostics for a solve that no soft level could complete.
//!
//! Two checks, both always run:
//!
//! 1. **Overtime**: re-run the solver at level 0 with the work day
//!    extended by one step at a time, up to a ceiling. At level 0 the
//!    solver is a pure earliest fit, so a later day end never changes a
//!    complete schedule and the first complete extension is the minimum.
//! 2. **Manual-block hints**: manual blocks sitting in a space named by an
//!    unplanned reason are suggested for moving or shortening.
//!
//! Exactly one reason is produced: `NEEDS_USER_APPROVAL` when overtime
//! helps, `INCOMPLETE_PLAN` otherwise.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::EngineResult;
use crate::models::{codes, Diagnostic, EngineInput, UnplannedTask};
use crate::scheduler::{FeasibilitySolver, SoftLevel};

/// Action attached to every manual-block hint.
pub const MOVE_OR_SHORTEN: &str = "move_or_shorten";

/// A manual block worth relocating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedMove {
    pub task_id: u64,
    pub space_id: u64,
    pub start: String,
    pub end: String,
    pub suggested_action: String,
}

/// Rescue findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rescue {
    /// Smallest extension (minutes) that completes the plan.
    pub overtime_minutes: Option<i64>,
    pub suggested_moves: Vec<SuggestedMove>,
}

impl Rescue {
    /// The single blocking reason describing this rescue.
    pub fn reason(&self, unplanned: &[UnplannedTask]) -> Diagnostic {
        match self.overtime_minutes {
            Some(minutes) => Diagnostic::new(
                codes::NEEDS_USER_APPROVAL,
                format!("The plan fits with {minutes} minutes of overtime"),
            )
            .with_details(json!({
                "overtime_min_required": minutes,
                "suggested_moves": self.suggested_moves,
            })),
            None => Diagnostic::new(
                codes::INCOMPLETE_PLAN,
                format!("{} tasks could not be placed", unplanned.len()),
            )
            .with_details(json!({
                "unplanned": unplanned,
                "suggested_moves": self.suggested_moves,
            })),
        }
    }
}

/// Computes rescue findings with a feasibility solver.
#[derive(Debug, Clone)]
pub struct RescueAdvisor<'s, S> {
    solver: &'s S,
    step_minutes: i64,
    ceiling_minutes: i64,
    max_moves: usize,
}

impl<'s, S: FeasibilitySolver> RescueAdvisor<'s, S> {
    /// 5-minute steps up to 4 hours, at most 3 hints.
    pub fn new(solver: &'s S) -> Self {
        Self {
            solver,
            step_minutes: 5,
            ceiling_minutes: 240,
            max_moves: 3,
        }
    }

    /// Sets the overtime search step and ceiling.
    pub fn with_overtime(mut self, step_minutes: i64, ceiling_minutes: i64) -> Self {
        self.step_minutes = step_minutes;
        self.ceiling_minutes = ceiling_minutes;
        self
    }

    /// Sets the maximum number of hints.
    pub fn with_max_moves(mut self, max_moves: usize) -> Self {
        self.max_moves = max_moves;
        self
    }

    /// Runs both checks.
    pub fn advise(&self, input: &EngineInput, unplanned: &[UnplannedTask]) -> EngineResult<Rescue> {
        let rescue = Rescue {
            overtime_minutes: self.overtime(input)?,
            suggested_moves: self.suggested_moves(input, unplanned),
        };
        info!(
            overtime = ?rescue.overtime_minutes,
            hints = rescue.suggested_moves.len(),
            "rescue computed"
        );
        Ok(rescue)
    }

    /// Smallest grid extension of the work day that completes the plan.
    pub fn overtime(&self, input: &EngineInput) -> EngineResult<Option<i64>> {
        if self.step_minutes <= 0 {
            return Ok(None);
        }
        let mut minutes = self.step_minutes;
        while minutes <= self.ceiling_minutes {
            let extended = input.with_extended_work_day(minutes)?;
            if self.solver.attempt(&extended, SoftLevel::HARD_ONLY)?.complete {
                return Ok(Some(minutes));
            }
            minutes += self.step_minutes;
        }
        Ok(None)
    }

    /// Manual blocks in spaces named by unplanned reasons, in input order.
    pub fn suggested_moves(
        &self,
        input: &EngineInput,
        unplanned: &[UnplannedTask],
    ) -> Vec<SuggestedMove> {
        let blocked: Vec<u64> = unplanned.iter().filter_map(|u| u.reason.space_id).collect();
        input
            .tasks
            .iter()
            .filter(|t| t.is_manual_block)
            .filter_map(|t| {
                let space_id = t.space_id.filter(|s| blocked.contains(s))?;
                t.planned_interval()?;
                Some(SuggestedMove {
                    task_id: t.id,
                    space_id,
                    start: t.start_planned.clone()?,
                    end: t.end_planned.clone()?,
                    suggested_action: MOVE_OR_SHORTEN.to_string(),
                })
            })
            .take(self.max_moves)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Task, TimeWindow};
    use crate::scheduler::GreedySolver;

    fn three_long_tasks() -> EngineInput {
        EngineInput::new(TimeWindow::new("09:00", "13:00"))
            .with_task(Task::new(1).with_space(1).with_duration(120))
            .with_task(Task::new(2).with_space(1).with_duration(120))
            .with_task(Task::new(3).with_space(1).with_duration(120))
    }

    #[test]
    fn test_minimum_overtime() {
        let solver = GreedySolver::new();
        let advisor = RescueAdvisor::new(&solver);
        assert_eq!(advisor.overtime(&three_long_tasks()).unwrap(), Some(120));
        assert_eq!(
            advisor.with_overtime(5, 60).overtime(&three_long_tasks()).unwrap(),
            None
        );
    }

    #[test]
    fn test_overtime_monotonic_in_extension() {
        let solver = GreedySolver::new();
        let input = three_long_tasks().with_task(Task::new(4).with_space(2).with_duration(200));
        let complete_at = |m: i64| {
            solver
                .attempt(&input.with_extended_work_day(m).unwrap(), SoftLevel::HARD_ONLY)
                .unwrap()
                .complete
        };
        let first = RescueAdvisor::new(&solver).overtime(&input).unwrap().unwrap();
        assert!(!complete_at(first - 5));
        for m in (first..=240).step_by(5) {
            assert!(complete_at(m), "extension {m}");
        }
    }

    #[test]
    fn test_suggested_moves() {
        let solver = GreedySolver::new();
        let mut input = EngineInput::new(TimeWindow::new("09:00", "10:00"));
        for id in 10..15 {
            input = input.with_task(Task::new(id).with_space(1).manual_block().with_planned("09:00", "09:10"));
        }
        input = input
            .with_task(Task::new(20).with_space(2).manual_block().with_planned("09:00", "10:00"))
            .with_task(Task::new(21).with_space(1).manual_block());
        let unplanned = vec![UnplannedTask {
            task_id: 1,
            reason: Diagnostic::new(codes::SPACE_BUSY, "busy").for_task(1).in_space(Some(1)),
        }];
        let moves = RescueAdvisor::new(&solver).suggested_moves(&input, &unplanned);
        let ids: Vec<u64> = moves.iter().map(|m| m.task_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert!(moves.iter().all(|m| m.suggested_action == MOVE_OR_SHORTEN));
    }

    #[test]
    fn test_reason_exclusive() {
        let approval = Rescue {
            overtime_minutes: Some(30),
            suggested_moves: vec![],
        };
        let reason = approval.reason(&[]);
        assert_eq!(reason.code, codes::NEEDS_USER_APPROVAL);
        assert_eq!(reason.details.unwrap()["overtime_min_required"], 30);

        let incomplete = Rescue {
            overtime_minutes: None,
            suggested_moves: vec![],
        };
        assert_eq!(incomplete.reason(&[]).code, codes::INCOMPLETE_PLAN);
    }
}
