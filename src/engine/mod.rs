//! Solve pipeline.
//!
//! ```text
//! prevalidate ──reasons──▶ rejected output
//!      │
//!      ▼
//! soft-level ladder ──no complete level──▶ rescue (overtime / hints)
//!      │
//!      ▼ warm start
//! optimizer (optional) ──▶ candidate validation ──▶ accept or keep warm start
//! ```
//!
//! # Progress
//!
//! | Phase | % |
//! |-------|---|
//! | `prevalidation` | 5 |
//! | `solving_feasible` | 35 |
//! | `optimizing` | 70 |
//! | `persisting` | 95 |

mod orchestrator;
mod rescue;

pub use orchestrator::{LadderOutcome, SoftLevelOrchestrator};
pub use rescue::{Rescue, RescueAdvisor, SuggestedMove, MOVE_OR_SHORTEN};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cp::{CandidateResponse, Optimizer, OptimizerError};
use crate::error::EngineResult;
use crate::models::{
    codes, Diagnostic, EngineInput, EngineOutput, EngineReport, Insight, QualityRecord, TieBreak,
};
use crate::scheduler::{Attempt, FeasibilitySolver, GreedySolver, ScheduleQuality};
use crate::validation::{prevalidate, validate_candidate};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Optimizer budget in seconds; 0 disables the optimizer.
    pub time_limit_seconds: u64,
    /// Overtime search increment.
    pub overtime_step_minutes: i64,
    /// Overtime search ceiling.
    pub overtime_ceiling_minutes: i64,
    /// Maximum manual-block hints.
    pub max_suggested_moves: usize,
    /// Tie-break among equally good incomplete attempts.
    pub tie_break: TieBreak,
    /// Evaluate all soft levels concurrently.
    pub parallel_attempts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_limit_seconds: 0,
            overtime_step_minutes: 5,
            overtime_ceiling_minutes: 240,
            max_suggested_moves: 3,
            tie_break: TieBreak::PreferHigherLevel,
            parallel_attempts: false,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON configuration document; missing keys take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sets the optimizer budget.
    pub fn with_time_limit(mut self, seconds: u64) -> Self {
        self.time_limit_seconds = seconds;
        self
    }

    /// Sets the overtime search step and ceiling.
    pub fn with_overtime(mut self, step_minutes: i64, ceiling_minutes: i64) -> Self {
        self.overtime_step_minutes = step_minutes;
        self.overtime_ceiling_minutes = ceiling_minutes;
        self
    }

    /// Sets the maximum manual-block hints.
    pub fn with_max_suggested_moves(mut self, max: usize) -> Self {
        self.max_suggested_moves = max;
        self
    }

    /// Sets the tie-break policy.
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Enables concurrent soft-level evaluation.
    pub fn with_parallel_attempts(mut self, parallel: bool) -> Self {
        self.parallel_attempts = parallel;
        self
    }
}

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Prevalidation,
    SolvingFeasible,
    Optimizing,
    Persisting,
}

impl ProgressPhase {
    /// Progress percentage reported when the phase starts.
    pub fn percent(self) -> u8 {
        match self {
            Self::Prevalidation => 5,
            Self::SolvingFeasible => 35,
            Self::Optimizing => 70,
            Self::Persisting => 95,
        }
    }
}

/// Advisory progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub phase: ProgressPhase,
    pub progress_pct: u8,
    pub message: String,
}

type ProgressFn = Box<dyn Fn(&Progress) + Send + Sync>;

/// Scheduling engine.
///
/// # Example
///
/// ```
/// use showday_engine::engine::{Engine, EngineConfig};
/// use showday_engine::models::{EngineInput, Task, TimeWindow};
///
/// let input = EngineInput::new(TimeWindow::new("09:00", "12:00"))
///     .with_task(Task::new(1).with_space(1).with_duration(60));
///
/// let output = Engine::new(EngineConfig::default()).solve(&input).unwrap();
/// assert!(output.feasible);
/// assert_eq!(output.planned_tasks[0].start_planned, "09:00");
/// ```
pub struct Engine<S = GreedySolver> {
    orchestrator: SoftLevelOrchestrator<S>,
    optimizer: Option<Box<dyn Optimizer>>,
    config: EngineConfig,
    progress: Option<ProgressFn>,
}

impl Default for Engine<GreedySolver> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine<GreedySolver> {
    /// Engine backed by the greedy solver.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_solver(GreedySolver::new(), config)
    }
}

impl<S: FeasibilitySolver> Engine<S> {
    /// Engine backed by a custom feasibility solver.
    pub fn with_solver(solver: S, config: EngineConfig) -> Self {
        let orchestrator = SoftLevelOrchestrator::new(solver)
            .with_tie_break(config.tie_break)
            .with_parallel(config.parallel_attempts);
        Self {
            orchestrator,
            optimizer: None,
            config,
            progress: None,
        }
    }

    /// Attaches an optimizer.
    pub fn with_optimizer(mut self, optimizer: impl Optimizer + 'static) -> Self {
        self.optimizer = Some(Box::new(optimizer));
        self
    }

    /// Registers a progress callback.
    pub fn on_progress(mut self, f: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn report(&self, phase: ProgressPhase, message: &str) {
        if let Some(f) = &self.progress {
            f(&Progress {
                phase,
                progress_pct: phase.percent(),
                message: message.to_string(),
            });
        }
    }

    /// Solves one plan.
    ///
    /// # Errors
    /// Only malformed clock values in the input (work day, meal, contestant
    /// windows). Every other failure is reported inside the output.
    #[tracing::instrument(skip_all, fields(plan_id = input.plan_id))]
    pub fn solve(&self, input: &EngineInput) -> EngineResult<EngineOutput> {
        self.report(ProgressPhase::Prevalidation, "checking tasks");
        input.validate_shape()?;
        let reasons = prevalidate(input);
        if !reasons.is_empty() {
            warn!(count = reasons.len(), "prevalidation rejected the plan");
            return Ok(EngineOutput::rejected(reasons));
        }

        self.report(ProgressPhase::SolvingFeasible, "searching soft levels");
        let outcome = self.orchestrator.run(input)?;

        let output = match outcome.selected {
            Some(attempt) => {
                let warm = warm_start(attempt, outcome.report);
                self.report(ProgressPhase::Optimizing, "improving the schedule");
                self.optimize(input, warm)
            }
            None => self.rescue(input, outcome.best, outcome.report)?,
        };

        self.report(ProgressPhase::Persisting, "schedule ready");
        info!(
            feasible = output.feasible,
            planned = output.planned_tasks.len(),
            unplanned = output.unplanned.len(),
            "solve finished"
        );
        Ok(output)
    }

    fn optimize(&self, input: &EngineInput, mut warm: EngineOutput) -> EngineOutput {
        let limit = self.config.time_limit_seconds;
        let Some(optimizer) = self.optimizer.as_deref().filter(|_| limit > 0) else {
            return warm;
        };

        let baseline = ScheduleQuality::calculate(input, &warm.planned_tasks).score;
        let unchanged = QualityRecord {
            baseline_score: baseline,
            optimized_score: baseline,
            ..QualityRecord::default()
        };

        let response = match optimizer.optimize(input, &warm, limit) {
            Ok(response) if !response.no_optimized => response,
            Ok(response) => {
                info!(message = %response.message, "optimizer kept the warm start");
                let mut technical = response.technical_details;
                technical.push(response.message);
                warm.insights.push(
                    Insight::new(codes::OPTIMIZER_UNAVAILABLE, "Optimizer produced no candidate")
                        .with_quality(QualityRecord {
                            degradations: response.degradations,
                            technical,
                            ..unchanged
                        }),
                );
                return warm;
            }
            Err(e) => {
                warn!(error = %e, "optimizer failed; keeping the warm start");
                warm.insights.push(unavailable(&e, unchanged));
                return warm;
            }
        };

        let errors = validate_candidate(input, &warm, &response.output);
        if errors.is_empty() {
            accept(input, warm, response, baseline)
        } else {
            warn!(errors = errors.len(), "optimizer candidate rejected");
            warm.insights.push(
                Insight::new(
                    codes::CANDIDATE_REJECTED,
                    "Optimized candidate violates hard constraints; warm start kept",
                )
                .with_quality(QualityRecord {
                    candidate_errors: errors,
                    degradations: response.degradations,
                    technical: response.technical_details,
                    ..unchanged
                }),
            );
            warm
        }
    }

    fn rescue(
        &self,
        input: &EngineInput,
        best: Option<Attempt>,
        report: EngineReport,
    ) -> EngineResult<EngineOutput> {
        let (planned_tasks, unplanned, warnings) = match best {
            Some(a) => (a.planned_tasks, a.unplanned, a.warnings),
            None => Default::default(),
        };
        let rescue = RescueAdvisor::new(self.orchestrator.solver())
            .with_overtime(
                self.config.overtime_step_minutes,
                self.config.overtime_ceiling_minutes,
            )
            .with_max_moves(self.config.max_suggested_moves)
            .advise(input, &unplanned)?;

        Ok(EngineOutput {
            feasible: false,
            complete: false,
            hard_feasible: !has_lock_conflict(&warnings),
            planned_tasks,
            reasons: vec![rescue.reason(&unplanned)],
            unplanned,
            warnings,
            insights: Vec::new(),
            report,
        })
    }
}

fn has_lock_conflict(warnings: &[Diagnostic]) -> bool {
    warnings.iter().any(|w| w.code == codes::LOCK_CONFLICT)
}

fn warm_start(attempt: Attempt, report: EngineReport) -> EngineOutput {
    EngineOutput {
        feasible: true,
        complete: true,
        hard_feasible: !has_lock_conflict(&attempt.warnings),
        planned_tasks: attempt.planned_tasks,
        unplanned: attempt.unplanned,
        reasons: Vec::new(),
        warnings: attempt.warnings,
        insights: Vec::new(),
        report,
    }
}

fn unavailable(e: &OptimizerError, unchanged: QualityRecord) -> Insight {
    Insight::new(
        codes::OPTIMIZER_UNAVAILABLE,
        format!("Optimizer unavailable ({}); warm start kept", e.kind()),
    )
    .with_quality(QualityRecord {
        technical: vec![e.to_string()],
        ..unchanged
    })
}

fn accept(
    input: &EngineInput,
    mut warm: EngineOutput,
    response: CandidateResponse,
    baseline: i64,
) -> EngineOutput {
    let optimized = ScheduleQuality::calculate(input, &response.output.planned_tasks).score;
    info!(baseline, optimized, "optimizer candidate accepted");
    let mut technical = response.technical_details;
    if !response.message.is_empty() {
        technical.push(response.message);
    }
    warm.planned_tasks = response.output.planned_tasks;
    warm.insights.push(
        Insight::new(codes::CANDIDATE_ACCEPTED, "Optimized candidate accepted").with_quality(
            QualityRecord {
                improved: optimized < baseline,
                baseline_score: baseline,
                optimized_score: optimized,
                objective_delta: baseline - optimized,
                accepted: true,
                candidate_errors: Vec::new(),
                degradations: response.degradations,
                technical,
            },
        ),
    );
    warm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lock, Task, TaskStatus, TimeWindow};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    enum Mock {
        Fail,
        Echo,
        GiveUp,
        /// Moves task 2 onto task 1.
        Collide,
        /// Returns only the tasks it was asked to place.
        DropFixed,
    }

    struct MockOptimizer {
        mode: Mock,
        calls: Arc<AtomicUsize>,
    }

    impl MockOptimizer {
        fn new(mode: Mock) -> Self {
            Self {
                mode,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Optimizer for MockOptimizer {
        fn optimize(
            &self,
            input: &EngineInput,
            warm: &EngineOutput,
            _limit: u64,
        ) -> Result<CandidateResponse, OptimizerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut output = warm.clone();
            let mut no_optimized = false;
            match self.mode {
                Mock::Fail => {
                    return Err(OptimizerError::TimedOut {
                        after: Duration::from_secs(3),
                    })
                }
                Mock::Echo => {}
                Mock::GiveUp => no_optimized = true,
                Mock::Collide => {
                    let first = output.planned_tasks[0].clone();
                    output.planned_tasks[1].start_planned = first.start_planned;
                    output.planned_tasks[1].end_planned = first.end_planned;
                }
                Mock::DropFixed => output
                    .planned_tasks
                    .retain(|p| input.task(p.task_id).is_some_and(Task::needs_placement)),
            }
            Ok(CandidateResponse {
                output,
                no_optimized,
                quality: None,
                degradations: vec![],
                message: "done".to_string(),
                technical_details: vec![],
            })
        }
    }

    fn two_tasks() -> EngineInput {
        EngineInput::new(TimeWindow::new("09:00", "12:00"))
            .with_plan_id(42)
            .with_task(Task::new(1).with_space(1).with_duration(30))
            .with_task(Task::new(2).with_space(1).with_duration(30))
    }

    fn phase_b(mode: Mock) -> EngineOutput {
        Engine::new(EngineConfig::new().with_time_limit(5))
            .with_optimizer(MockOptimizer::new(mode))
            .solve(&two_tasks())
            .unwrap()
    }

    #[test]
    fn test_feasible_without_optimizer() {
        let output = Engine::default().solve(&two_tasks()).unwrap();
        assert!(output.feasible && output.complete && output.hard_feasible);
        assert!(output.reasons.is_empty());
        assert!(output.insights.is_empty());
        assert_eq!(output.report.selected_level, Some(9));
        assert_eq!(output.report.attempts_summary.len(), 1);
        assert_eq!(output.planned(2).map(|p| p.start_planned.as_str()), Some("09:30"));
    }

    #[test]
    fn test_zero_time_limit_skips_optimizer() {
        let optimizer = MockOptimizer::new(Mock::Fail);
        let calls = Arc::clone(&optimizer.calls);
        let output = Engine::new(EngineConfig::default())
            .with_optimizer(optimizer)
            .solve(&two_tasks())
            .unwrap();
        assert!(output.feasible);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(output.insights.is_empty());
    }

    #[test]
    fn test_optimizer_failure_keeps_warm_start() {
        let baseline = Engine::default().solve(&two_tasks()).unwrap();
        let output = phase_b(Mock::Fail);
        assert!(output.feasible);
        assert_eq!(output.planned_tasks, baseline.planned_tasks);
        assert_eq!(output.insights[0].code, codes::OPTIMIZER_UNAVAILABLE);
        let quality = output.insights[0].quality.as_ref().unwrap();
        assert!(!quality.accepted);
        assert_eq!(quality.baseline_score, quality.optimized_score);

        let gave_up = phase_b(Mock::GiveUp);
        assert_eq!(gave_up.insights[0].code, codes::OPTIMIZER_UNAVAILABLE);
    }

    #[test]
    fn test_valid_candidate_accepted() {
        let output = phase_b(Mock::Echo);
        assert!(output.feasible);
        let insight = &output.insights[0];
        assert_eq!(insight.code, codes::CANDIDATE_ACCEPTED);
        let quality = insight.quality.as_ref().unwrap();
        assert!(quality.accepted);
        assert!(!quality.improved);
        assert_eq!(quality.objective_delta, 0);
        assert_eq!(quality.technical, vec!["done".to_string()]);
    }

    #[test]
    fn test_invalid_candidate_rejected() {
        let output = phase_b(Mock::Collide);
        assert!(output.feasible);
        assert_eq!(output.planned(2).map(|p| p.start_planned.as_str()), Some("09:30"));
        let insight = &output.insights[0];
        assert_eq!(insight.code, codes::CANDIDATE_REJECTED);
        let quality = insight.quality.as_ref().unwrap();
        assert!(!quality.accepted);
        assert!(quality
            .candidate_errors
            .contains(&"SPACE_OVERLAP_1_2".to_string()));
    }

    #[test]
    fn test_candidate_dropping_fixed_occupancy_rejected() {
        let input = two_tasks().with_task(
            Task::new(3)
                .with_space(2)
                .with_status(TaskStatus::Done)
                .with_planned("11:00", "11:30"),
        );
        let output = Engine::new(EngineConfig::new().with_time_limit(5))
            .with_optimizer(MockOptimizer::new(Mock::DropFixed))
            .solve(&input)
            .unwrap();
        assert_eq!(output.insights[0].code, codes::CANDIDATE_REJECTED);
        let quality = output.insights[0].quality.as_ref().unwrap();
        assert_eq!(quality.candidate_errors, vec!["MISSING_TASK_3".to_string()]);
        assert!(output.planned(3).is_some());
    }

    #[test]
    fn test_pinned_violations_clear_hard_feasible() {
        let input = EngineInput::new(TimeWindow::new("09:00", "14:00"))
            .with_meal(TimeWindow::new("12:00", "12:30"))
            .with_task(Task::new(1).with_space(1).with_duration(30))
            .with_task(Task::new(2).with_space(2).with_duration(30))
            .with_task(Task::new(3).with_space(3).with_duration(45))
            .with_lock(Lock::time(1, 2, "12:00", "12:30"))
            .with_lock(Lock::time(2, 3, "13:45", "14:30"));
        let output = Engine::default().solve(&input).unwrap();
        assert!(output.complete);
        assert!(!output.hard_feasible);
        let conflicts = output
            .warnings
            .iter()
            .filter(|w| w.code == codes::LOCK_CONFLICT)
            .count();
        assert_eq!(conflicts, 2);
    }

    #[test]
    fn test_warm_start_honours_locked_dependent() {
        let input = EngineInput::new(TimeWindow::new("09:00", "12:00"))
            .with_task(Task::new(1).with_space(1).with_duration(60))
            .with_task(Task::new(2).with_space(2).with_duration(30).with_dependency(1))
            .with_lock(Lock::time(1, 2, "09:00", "09:30"));
        let output = Engine::default().solve(&input).unwrap();
        assert!(!output.complete);
        assert_eq!(output.unplanned[0].task_id, 1);
        assert_eq!(output.unplanned[0].reason.code, codes::DEPENDENCY_NOT_SCHEDULED);
        assert!(validate_candidate(&input, &output, &output).is_empty());
    }

    #[test]
    fn test_prevalidation_short_circuits() {
        let input = EngineInput::new(TimeWindow::new("09:00", "12:00"))
            .with_task(Task::new(1).with_space(1))
            .with_task(Task::new(2).with_duration(30));
        let output = Engine::default().solve(&input).unwrap();
        assert!(!output.feasible && !output.complete);
        let reasons: Vec<&str> = output.reasons.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(reasons, vec![codes::MISSING_DURATION, codes::MISSING_SPACE_OR_ZONE]);
        assert!(output.report.attempts_summary.is_empty());
        assert!(output.planned_tasks.is_empty());
    }

    #[test]
    fn test_three_long_tasks_need_overtime() {
        let input = EngineInput::new(TimeWindow::new("09:00", "13:00"))
            .with_task(Task::new(1).with_space(1).with_duration(120))
            .with_task(Task::new(2).with_space(1).with_duration(120))
            .with_task(Task::new(3).with_space(1).with_duration(120));
        let output = Engine::default().solve(&input).unwrap();

        assert!(!output.feasible && !output.complete && output.hard_feasible);
        assert_eq!(output.reasons.len(), 1);
        assert_eq!(output.reasons[0].code, codes::NEEDS_USER_APPROVAL);
        let details = output.reasons[0].details.as_ref().unwrap();
        assert_eq!(details["overtime_min_required"], 120);
        assert_eq!(output.planned_tasks.len(), 2);
        assert_eq!(output.unplanned[0].reason.code, codes::SPACE_BUSY);
        assert_eq!(output.report.attempts_summary.len(), 10);
        assert_eq!(output.report.degradations.len(), 10);
    }

    #[test]
    fn test_oversized_task_is_incomplete() {
        let input = EngineInput::new(TimeWindow::new("09:00", "13:00"))
            .with_task(Task::new(1).with_space(1).with_duration(500));
        let output = Engine::default().solve(&input).unwrap();
        let codes_seen: Vec<&str> = output.reasons.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes_seen, vec![codes::INCOMPLETE_PLAN]);
        let details = output.reasons[0].details.as_ref().unwrap();
        assert_eq!(details["unplanned"][0]["taskId"], 1);
    }

    #[test]
    fn test_progress_is_ordered() {
        let seen: Arc<Mutex<Vec<Progress>>> = Arc::default();
        let sink = Arc::clone(&seen);
        Engine::new(EngineConfig::new().with_time_limit(5))
            .with_optimizer(MockOptimizer::new(Mock::Echo))
            .on_progress(move |p| {
                if let Ok(mut events) = sink.lock() {
                    events.push(p.clone());
                }
            })
            .solve(&two_tasks())
            .unwrap();

        let events = seen.lock().unwrap();
        let phases: Vec<ProgressPhase> = events.iter().map(|p| p.phase).collect();
        assert_eq!(
            phases,
            vec![
                ProgressPhase::Prevalidation,
                ProgressPhase::SolvingFeasible,
                ProgressPhase::Optimizing,
                ProgressPhase::Persisting,
            ]
        );
        assert!(events.windows(2).all(|w| w[0].progress_pct <= w[1].progress_pct));
    }

    #[test]
    fn test_malformed_work_day_is_an_error() {
        let input = EngineInput::new(TimeWindow::new("9am", "12:00"));
        assert!(Engine::default().solve(&input).is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config =
            EngineConfig::from_json_str(r#"{"timeLimitSeconds": 10, "tieBreak": "prefer_lower_level"}"#)
                .unwrap();
        assert_eq!(config.time_limit_seconds, 10);
        assert_eq!(config.tie_break, TieBreak::PreferLowerLevel);
        assert_eq!(config.overtime_ceiling_minutes, 240);
        assert!(EngineConfig::from_json_str("[]").is_err());
    }

    #[test]
    fn test_planned_task_wire_shape() {
        let output = Engine::default().solve(&two_tasks()).unwrap();
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["plannedTasks"][0]["startPlanned"], "09:00");
        assert_eq!(value["report"]["attemptsSummary"][0]["level"], 9);
        let back: EngineOutput = serde_json::from_value(value).unwrap();
        assert_eq!(back.planned_tasks, output.planned_tasks);
    }
}
