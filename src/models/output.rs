//! Engine output (solution and diagnostics).
//!
//! An [`EngineOutput`] is either a schedule (`complete = true`) or a
//! partial schedule with a machine-readable account of what could not be
//! placed and why. Diagnostics carry stable string codes (see [`codes`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::resource::PlanItemId;
use super::task::TaskId;
use super::time::Interval;

/// Stable diagnostic codes.
pub mod codes {
    pub const MISSING_DURATION: &str = "MISSING_DURATION";
    pub const MISSING_SPACE_OR_ZONE: &str = "MISSING_SPACE_OR_ZONE";

    pub const SPACE_BUSY: &str = "SPACE_BUSY";
    pub const CONTESTANT_BUSY: &str = "CONTESTANT_BUSY";
    pub const RESOURCE_BUSY: &str = "RESOURCE_BUSY";
    pub const CAMERAS_EXHAUSTED: &str = "CAMERAS_EXHAUSTED";
    pub const ITINERANT_TEAM_BUSY: &str = "ITINERANT_TEAM_BUSY";
    pub const NO_ITINERANT_TEAM: &str = "NO_ITINERANT_TEAM";
    pub const ITINERANT_WRAP_NOT_FEASIBLE: &str = "ITINERANT_WRAP_NOT_FEASIBLE";
    pub const MEAL_WINDOW: &str = "MEAL_WINDOW";
    pub const MEAL_ZONE_NO_FIT: &str = "MEAL_ZONE_NO_FIT";
    pub const MEAL_CONTESTANT_NO_FIT: &str = "MEAL_CONTESTANT_NO_FIT";
    pub const CONTESTANT_NOT_AVAILABLE: &str = "CONTESTANT_NOT_AVAILABLE";
    pub const NO_TIME: &str = "NO_TIME";
    pub const DEPENDENCY_CYCLE: &str = "DEPENDENCY_CYCLE";
    pub const DEPENDENCY_NOT_SCHEDULED: &str = "DEPENDENCY_NOT_SCHEDULED";

    pub const FIXED_TASK_WITHOUT_TIMES: &str = "FIXED_TASK_WITHOUT_TIMES";
    pub const LOCK_CONFLICT: &str = "LOCK_CONFLICT";

    pub const NEEDS_USER_APPROVAL: &str = "NEEDS_USER_APPROVAL";
    pub const INCOMPLETE_PLAN: &str = "INCOMPLETE_PLAN";

    pub const OPTIMIZER_UNAVAILABLE: &str = "OPTIMIZER_UNAVAILABLE";
    pub const CANDIDATE_ACCEPTED: &str = "CANDIDATE_ACCEPTED";
    pub const CANDIDATE_REJECTED: &str = "CANDIDATE_REJECTED";
}

/// One placed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTask {
    /// Task id.
    pub task_id: TaskId,
    /// Start (`HH:MM`).
    pub start_planned: String,
    /// End (`HH:MM`).
    pub end_planned: String,
    /// Assigned plan items.
    #[serde(default)]
    pub assigned_resources: Vec<PlanItemId>,
    /// Space the task runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_space: Option<u64>,
    /// Itinerant crew, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itinerant_team_id: Option<u64>,
}

impl PlannedTask {
    /// Creates a placement from minutes.
    pub fn new(task_id: TaskId, interval: Interval) -> Self {
        Self {
            task_id,
            start_planned: super::time::format_hhmm(interval.start),
            end_planned: super::time::format_hhmm(interval.end),
            assigned_resources: Vec::new(),
            assigned_space: None,
            itinerant_team_id: None,
        }
    }

    /// Sets the assigned resources.
    pub fn with_resources(mut self, resources: Vec<PlanItemId>) -> Self {
        self.assigned_resources = resources;
        self
    }

    /// Sets the space.
    pub fn with_space(mut self, space_id: Option<u64>) -> Self {
        self.assigned_space = space_id;
        self
    }

    /// Sets the itinerant crew.
    pub fn with_team(mut self, team_id: Option<u64>) -> Self {
        self.itinerant_team_id = team_id;
        self
    }

    /// Parsed interval; `None` when either bound is malformed.
    pub fn interval(&self) -> Option<Interval> {
        Interval::from_hhmm(&self.start_planned, &self.end_planned)
    }
}

/// A structured diagnostic (reason or warning).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Stable code.
    pub code: String,
    /// Operator-facing message.
    pub message: String,
    /// Related task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Related space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<u64>,
    /// Code-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Diagnostic {
    /// Creates a diagnostic.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            task_id: None,
            space_id: None,
            details: None,
        }
    }

    /// Sets the related task.
    pub fn for_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Sets the related space.
    pub fn in_space(mut self, space_id: Option<u64>) -> Self {
        self.space_id = space_id;
        self
    }

    /// Attaches a payload.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// A task the solver could not place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnplannedTask {
    /// Task id.
    pub task_id: TaskId,
    /// Dominant blocker.
    pub reason: Diagnostic,
}

/// Secondary tie-break among equally good partial attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the higher soft level (first seen while descending).
    #[default]
    PreferHigherLevel,
    /// Keep the lower soft level.
    PreferLowerLevel,
}

/// Summary of one feasibility attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    /// Soft level tried.
    pub level: u8,
    /// Whether the attempt was complete.
    pub ok: bool,
    /// Wall-clock time of the attempt.
    pub elapsed_ms: u64,
    /// Tasks placed (fixed occupancy included).
    pub planned_count: usize,
    /// Up to five most frequent reason codes.
    pub top_reasons: Vec<String>,
}

/// A soft level that failed before the selected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Degradation {
    /// Level that failed.
    pub level: u8,
    /// Eligible tasks left unplanned at that level.
    pub unplanned_count: usize,
    /// Its most frequent reason codes.
    pub top_reasons: Vec<String>,
}

/// Attempt report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineReport {
    /// One entry per attempt, in evaluation order.
    pub attempts_summary: Vec<AttemptSummary>,
    /// Levels abandoned before the selected one.
    pub degradations: Vec<Degradation>,
    /// Level whose schedule was returned.
    pub selected_level: Option<u8>,
    /// Tie-break policy in effect.
    pub tie_break: TieBreak,
}

/// Phase B quality record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityRecord {
    /// Whether the accepted candidate scores lower than the warm start.
    pub improved: bool,
    /// Warm-start score.
    pub baseline_score: i64,
    /// Candidate score (equals the baseline when no candidate was used).
    pub optimized_score: i64,
    /// `baseline_score - optimized_score`.
    pub objective_delta: i64,
    /// Whether the candidate replaced the warm start.
    pub accepted: bool,
    /// Validator findings against the candidate.
    pub candidate_errors: Vec<String>,
    /// Degradations reported by the optimizer.
    pub degradations: Vec<Value>,
    /// Technical details (failure causes, optimizer message).
    pub technical: Vec<String>,
}

/// Observability record attached to the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    /// Stable code.
    pub code: String,
    /// Operator-facing message.
    pub message: String,
    /// Code-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Phase B quality record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityRecord>,
}

impl Insight {
    /// Creates an insight.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            quality: None,
        }
    }

    /// Attaches a quality record.
    pub fn with_quality(mut self, quality: QualityRecord) -> Self {
        self.quality = Some(quality);
        self
    }
}

/// The engine's answer for one solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOutput {
    /// A complete schedule is being returned.
    pub feasible: bool,
    /// Every eligible task is placed.
    pub complete: bool,
    /// No returned placement violates a hard constraint.
    pub hard_feasible: bool,
    /// Placements (fixed occupancy included).
    pub planned_tasks: Vec<PlannedTask>,
    /// Tasks that could not be placed.
    pub unplanned: Vec<UnplannedTask>,
    /// Blocking reasons.
    pub reasons: Vec<Diagnostic>,
    /// Non-blocking findings.
    pub warnings: Vec<Diagnostic>,
    /// Phase B records.
    pub insights: Vec<Insight>,
    /// Attempt report.
    pub report: EngineReport,
}

impl EngineOutput {
    /// A rejected solve carrying only `reasons`.
    pub fn rejected(reasons: Vec<Diagnostic>) -> Self {
        Self {
            reasons,
            ..Self::default()
        }
    }

    /// Placement of a task.
    pub fn planned(&self, task_id: TaskId) -> Option<&PlannedTask> {
        self.planned_tasks.iter().find(|p| p.task_id == task_id)
    }

    /// Placements keyed by task id (first wins on duplicates).
    pub fn planned_by_id(&self) -> HashMap<TaskId, &PlannedTask> {
        let mut map = HashMap::with_capacity(self.planned_tasks.len());
        for p in &self.planned_tasks {
            map.entry(p.task_id).or_insert(p);
        }
        map
    }

    /// Whether a reason with this code is present.
    pub fn has_reason(&self, code: &str) -> bool {
        self.reasons.iter().any(|r| r.code == code)
    }
}

/// Up to `limit` codes, most frequent first, ties by code.
pub fn top_codes<'a>(codes: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<String> {
    let mut freq: BTreeMap<&str, usize> = BTreeMap::new();
    for c in codes {
        *freq.entry(c).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.into_iter().take(limit).map(|(c, _)| c.to_string()).collect()
}
