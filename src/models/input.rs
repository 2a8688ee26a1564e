//! Engine input: the normalized description of one shooting day.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::lock::Lock;
use super::resource::{PlanItemId, ResourceItem};
use super::task::{Task, TaskId};
use super::time::{format_hhmm, snap_up, Interval, TimeWindow};
use crate::error::{EngineError, EngineResult};

/// Upper bound for any soft weight.
pub const MAX_SOFT_WEIGHT: f64 = 10.0;
/// Meal length when neither the task nor the input gives one.
pub const DEFAULT_MEAL_MINUTES: i64 = 75;
/// Contestant meals allowed at once when the input does not say.
pub const DEFAULT_MEAL_MAX_SIMULTANEOUS: u32 = 10;

/// Named soft-preference weights, each in `0..=10`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoftWeights {
    /// Penalize idle gaps in the main zone.
    pub main_zone_keep_busy: f64,
    /// Pull main-zone work toward the start of the day.
    pub main_zone_finish_early: f64,
    /// Keep same-template work adjacent within a space.
    pub group_by_space_template_match: f64,
    /// Keep a contestant's tasks close together.
    pub contestant_compact: f64,
    /// Keep a contestant in one zone between consecutive tasks.
    pub contestant_stay_in_zone: f64,
}

impl SoftWeights {
    /// Copy with every weight clamped into `0..=10`.
    pub fn clamped(self) -> Self {
        let c = |w: f64| if w.is_finite() { w.clamp(0.0, MAX_SOFT_WEIGHT) } else { 0.0 };
        Self {
            main_zone_keep_busy: c(self.main_zone_keep_busy),
            main_zone_finish_early: c(self.main_zone_finish_early),
            group_by_space_template_match: c(self.group_by_space_template_match),
            contestant_compact: c(self.contestant_compact),
            contestant_stay_in_zone: c(self.contestant_stay_in_zone),
        }
    }

    /// Whether every weight is zero.
    pub fn is_zero(&self) -> bool {
        let w = self.clamped();
        w.main_zone_keep_busy == 0.0
            && w.main_zone_finish_early == 0.0
            && w.group_by_space_template_match == 0.0
            && w.contestant_compact == 0.0
            && w.contestant_stay_in_zone == 0.0
    }
}

/// Normalized engine input.
///
/// Produced by the caller's normalization layer; read-only for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInput {
    /// Plan identifier (logging only).
    #[serde(default)]
    pub plan_id: u64,
    /// Work-day window.
    pub work_day: TimeWindow,
    /// Meal window; `None` means no meal constraint.
    #[serde(default)]
    pub meal: Option<TimeWindow>,
    /// Template name identifying meal tasks.
    #[serde(default)]
    pub meal_task_template_name: Option<String>,
    /// Length of a meal task that has no duration of its own.
    #[serde(default)]
    pub contestant_meal_duration_minutes: Option<i64>,
    /// Contestant meals that may run at the same instant.
    #[serde(default)]
    pub contestant_meal_max_simultaneous: Option<u32>,
    /// Cameras that can run simultaneously.
    #[serde(default)]
    pub cameras_available: u32,
    /// Every task of the plan.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// User pins.
    #[serde(default)]
    pub locks: Vec<Lock>,
    /// Resource inventory.
    #[serde(default)]
    pub plan_resource_items: Vec<ResourceItem>,
    /// Units anchored to a space, tried first for tasks in that space.
    #[serde(default)]
    pub space_resource_assignments: BTreeMap<u64, Vec<PlanItemId>>,
    /// Units anchored to a zone, tried after the space pool.
    #[serde(default)]
    pub zone_resource_assignments: BTreeMap<u64, Vec<PlanItemId>>,
    /// Itinerant crew roster.
    #[serde(default)]
    pub itinerant_team_ids: Vec<u64>,
    /// Per-contestant availability windows.
    #[serde(default)]
    pub contestant_availability_by_id: BTreeMap<u64, TimeWindow>,
    /// Main zone ("main set").
    #[serde(default, rename = "optimizerMainZoneId")]
    pub main_zone_id: Option<u64>,
    /// Zones where same-template grouping applies; empty means all.
    #[serde(default)]
    pub grouping_zone_ids: Vec<u64>,
    /// Soft-preference weights.
    #[serde(default)]
    pub optimizer_weights: SoftWeights,
}

impl EngineInput {
    /// Creates an empty day with the given work window.
    pub fn new(work_day: TimeWindow) -> Self {
        Self {
            plan_id: 0,
            work_day,
            meal: None,
            meal_task_template_name: None,
            contestant_meal_duration_minutes: None,
            contestant_meal_max_simultaneous: None,
            cameras_available: 0,
            tasks: Vec::new(),
            locks: Vec::new(),
            plan_resource_items: Vec::new(),
            space_resource_assignments: BTreeMap::new(),
            zone_resource_assignments: BTreeMap::new(),
            itinerant_team_ids: Vec::new(),
            contestant_availability_by_id: BTreeMap::new(),
            main_zone_id: None,
            grouping_zone_ids: Vec::new(),
            optimizer_weights: SoftWeights::default(),
        }
    }

    /// Sets the plan id.
    pub fn with_plan_id(mut self, plan_id: u64) -> Self {
        self.plan_id = plan_id;
        self
    }

    /// Sets the meal window.
    pub fn with_meal(mut self, meal: TimeWindow) -> Self {
        self.meal = Some(meal);
        self
    }

    /// Sets the meal template name.
    pub fn with_meal_template_name(mut self, name: impl Into<String>) -> Self {
        self.meal_task_template_name = Some(name.into());
        self
    }

    /// Sets the default meal length and how many contestants may eat at once.
    pub fn with_contestant_meals(mut self, duration_minutes: i64, max_simultaneous: u32) -> Self {
        self.contestant_meal_duration_minutes = Some(duration_minutes);
        self.contestant_meal_max_simultaneous = Some(max_simultaneous);
        self
    }

    /// Anchors resource units to a space.
    pub fn with_space_resources(mut self, space_id: u64, item_ids: Vec<PlanItemId>) -> Self {
        self.space_resource_assignments.insert(space_id, item_ids);
        self
    }

    /// Anchors resource units to a zone.
    pub fn with_zone_resources(mut self, zone_id: u64, item_ids: Vec<PlanItemId>) -> Self {
        self.zone_resource_assignments.insert(zone_id, item_ids);
        self
    }

    /// Sets the camera count.
    pub fn with_cameras(mut self, cameras: u32) -> Self {
        self.cameras_available = cameras;
        self
    }

    /// Adds a task.
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Adds a lock.
    pub fn with_lock(mut self, lock: Lock) -> Self {
        self.locks.push(lock);
        self
    }

    /// Adds a resource unit.
    pub fn with_resource(mut self, item: ResourceItem) -> Self {
        self.plan_resource_items.push(item);
        self
    }

    /// Sets the itinerant crew roster.
    pub fn with_itinerant_teams(mut self, team_ids: Vec<u64>) -> Self {
        self.itinerant_team_ids = team_ids;
        self
    }

    /// Sets a contestant availability window.
    pub fn with_contestant_availability(mut self, contestant_id: u64, window: TimeWindow) -> Self {
        self.contestant_availability_by_id.insert(contestant_id, window);
        self
    }

    /// Sets the main zone.
    pub fn with_main_zone(mut self, zone_id: u64) -> Self {
        self.main_zone_id = Some(zone_id);
        self
    }

    /// Sets the zones where grouping applies.
    pub fn with_grouping_zones(mut self, zone_ids: Vec<u64>) -> Self {
        self.grouping_zone_ids = zone_ids;
        self
    }

    /// Sets the soft weights.
    pub fn with_weights(mut self, weights: SoftWeights) -> Self {
        self.optimizer_weights = weights;
        self
    }

    /// Parsed, non-empty work-day interval.
    pub fn work_day_interval(&self) -> EngineResult<Interval> {
        let iv = self.work_day.interval("workDay")?;
        if !iv.is_valid() {
            return Err(EngineError::EmptyWorkDay {
                start: self.work_day.start.clone(),
                end: self.work_day.end.clone(),
            });
        }
        Ok(iv)
    }

    /// Parsed meal interval. A zero-length window counts as no meal.
    pub fn meal_interval(&self) -> EngineResult<Option<Interval>> {
        let Some(meal) = &self.meal else {
            return Ok(None);
        };
        let iv = meal.interval("meal")?;
        if iv.end < iv.start {
            return Err(EngineError::InvalidMealWindow {
                start: meal.start.clone(),
                end: meal.end.clone(),
            });
        }
        Ok(iv.is_valid().then_some(iv))
    }

    /// Checks every clock value the engine relies on.
    pub fn validate_shape(&self) -> EngineResult<()> {
        self.work_day_interval()?;
        self.meal_interval()?;
        for window in self.contestant_availability_by_id.values() {
            window.interval("contestantAvailabilityById")?;
        }
        Ok(())
    }

    /// Copy of this input with the work day pushed `minutes` later.
    pub fn with_extended_work_day(&self, minutes: i64) -> EngineResult<Self> {
        let day = self.work_day_interval()?;
        let mut extended = self.clone();
        extended.work_day = TimeWindow::new(self.work_day.start.clone(), format_hhmm(day.end + minutes));
        Ok(extended)
    }

    /// Looks up a task by id.
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// First time-pinning lock on a task.
    pub fn time_lock(&self, task_id: TaskId) -> Option<&Lock> {
        self.locks
            .iter()
            .find(|l| l.task_id == task_id && l.pins_time() && l.interval().is_some())
    }

    /// Whether a task is a meal/break entity.
    pub fn is_meal_task(&self, task: &Task) -> bool {
        if task.is_break {
            return true;
        }
        match (&self.meal_task_template_name, &task.template_name) {
            (Some(meal), Some(name)) => {
                !meal.trim().is_empty() && meal.trim().eq_ignore_ascii_case(name.trim())
            }
            _ => false,
        }
    }

    /// Whether a task is a meal eaten by one contestant.
    pub fn is_contestant_meal(&self, task: &Task) -> bool {
        task.contestant_id.is_some() && self.is_meal_task(task)
    }

    /// Default meal length, at least 5 minutes and grid-aligned.
    pub fn meal_duration(&self) -> i64 {
        snap_up(
            self.contestant_meal_duration_minutes
                .unwrap_or(DEFAULT_MEAL_MINUTES)
                .max(5),
        )
    }

    /// Contestant meals allowed at once, at least 1.
    pub fn meal_capacity(&self) -> u32 {
        self.contestant_meal_max_simultaneous
            .unwrap_or(DEFAULT_MEAL_MAX_SIMULTANEOUS)
            .max(1)
    }

    /// Grid-aligned duration of a task.
    ///
    /// An explicit positive duration wins; otherwise the span of a time
    /// lock; otherwise the recorded interval of a fixed task; otherwise
    /// the default meal length for meal tasks.
    pub fn resolved_duration(&self, task: &Task) -> Option<i64> {
        if let Some(d) = task.duration_minutes.filter(|&d| d > 0) {
            return Some(snap_up(d));
        }
        if let Some(iv) = self.time_lock(task.id).and_then(Lock::interval) {
            return Some(iv.duration());
        }
        if task.status.is_fixed() || task.is_manual_block {
            return task.planned_interval().map(|iv| iv.duration());
        }
        self.is_meal_task(task).then(|| self.meal_duration())
    }

    /// Allocation preference of a unit for a task: 0 when anchored to the
    /// task's space, 1 when anchored to its zone, 2 otherwise.
    pub fn resource_rank(&self, task: &Task, item: PlanItemId) -> u8 {
        let anchored = |pools: &BTreeMap<u64, Vec<PlanItemId>>, key: Option<u64>| {
            key.and_then(|k| pools.get(&k))
                .is_some_and(|ids| ids.contains(&item))
        };
        if anchored(&self.space_resource_assignments, task.space_id) {
            0
        } else if anchored(&self.zone_resource_assignments, task.zone_id) {
            1
        } else {
            2
        }
    }

    /// Availability window of a contestant, if configured and parseable.
    pub fn contestant_window(&self, contestant_id: u64) -> Option<Interval> {
        self.contestant_availability_by_id
            .get(&contestant_id)
            .and_then(TimeWindow::try_interval)
    }

    /// Whether same-template grouping applies to a zone.
    pub fn groups_zone(&self, zone_id: Option<u64>) -> bool {
        if self.grouping_zone_ids.is_empty() {
            return true;
        }
        zone_id.is_some_and(|z| self.grouping_zone_ids.contains(&z))
    }
}
