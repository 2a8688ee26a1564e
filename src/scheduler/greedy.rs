//! Greedy grid-search feasibility solver.
//!
//! # Algorithm
//!
//! 1. Pin fixed occupancy: done/in-progress tasks, manual blocks, and
//!    time-locked tasks keep their intervals. Pins that overlap, leave the
//!    work day, cross the meal window or break a dependency are reported,
//!    never moved.
//! 2. Order the remaining tasks prerequisite-first; a wrap comes after
//!    its inner task. Tasks on a dependency cycle are reported unplanned.
//! 3. For each task, scan 5-minute-grid starts between the earliest and
//!    latest allowed start (after its prerequisites, before any pinned
//!    dependent, inside the meal window for meals) and keep the cheapest
//!    start that satisfies
//!    every hard constraint. Cost is the displacement from the earliest
//!    start plus the soft-preference penalty scaled by the soft level; at
//!    level 0 the first feasible start wins (earliest fit).
//! 4. An inner task and its wraps are placed together when possible, so
//!    the travel buffers are reserved in the same step.
//!
//! # Complexity
//! O(n · g · n) where n = tasks and g = grid starts in the work day.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::json;
use tracing::debug;

use super::occupancy::{Occupancy, Slot};
use super::wrap::{buffered, wrap_pairs};
use super::{Attempt, FeasibilitySolver, SoftLevel};
use crate::error::EngineResult;
use crate::models::{
    codes, snap_up, Diagnostic, EngineInput, Interval, ItinerantRequirement, LockType,
    PlanItemId, PlannedTask, ResourceItem, SoftWeights, Task, TaskId, TaskStatus, UnplannedTask,
    GRID_MINUTES,
};
use crate::validation::dependency_order;

/// Soft penalty (minutes) for a template or zone change next to a placement.
const SWITCH_PENALTY: f64 = 30.0;

/// Why a candidate start was rejected. Declaration order breaks ties when
/// picking the dominant blocker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Blocker {
    Space,
    Contestant,
    Resource,
    Team,
    Cameras,
    Meal,
    MealCapacity,
    Wrap,
}

impl Blocker {
    fn code(self) -> &'static str {
        match self {
            Self::Space => codes::SPACE_BUSY,
            Self::Contestant => codes::CONTESTANT_BUSY,
            Self::Resource => codes::RESOURCE_BUSY,
            Self::Team => codes::ITINERANT_TEAM_BUSY,
            Self::Cameras => codes::CAMERAS_EXHAUSTED,
            Self::Meal => codes::MEAL_WINDOW,
            Self::MealCapacity => codes::MEAL_CONTESTANT_NO_FIT,
            Self::Wrap => codes::ITINERANT_WRAP_NOT_FEASIBLE,
        }
    }
}

type Tally = BTreeMap<Blocker, usize>;

/// A feasible placement of one task.
#[derive(Debug, Clone)]
struct Placement {
    interval: Interval,
    resources: Vec<PlanItemId>,
    team: Option<u64>,
}

/// Greedy grid-search solver.
///
/// Deterministic: tasks are visited in dependency order with ties broken
/// by id, starts are scanned in ascending order, and resources are taken
/// lowest id first.
///
/// # Example
///
/// ```
/// use showday_engine::models::{EngineInput, Task, TimeWindow};
/// use showday_engine::scheduler::{FeasibilitySolver, GreedySolver, SoftLevel};
///
/// let input = EngineInput::new(TimeWindow::new("09:00", "12:00"))
///     .with_task(Task::new(1).with_space(1).with_duration(60))
///     .with_task(Task::new(2).with_space(1).with_duration(60));
///
/// let attempt = GreedySolver::new().attempt(&input, SoftLevel::MAX).unwrap();
/// assert!(attempt.complete);
/// assert_eq!(attempt.planned_count(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySolver;

impl GreedySolver {
    /// Creates a new solver.
    pub fn new() -> Self {
        Self
    }
}

impl FeasibilitySolver for GreedySolver {
    fn attempt(&self, input: &EngineInput, level: SoftLevel) -> EngineResult<Attempt> {
        let day = Day::new(input, level)?;
        let mut run = Run::new(day);
        run.pin_fixed();
        run.place_remaining();
        Ok(run.finish(level))
    }
}

/// Read-only context of one attempt.
struct Day<'a> {
    input: &'a EngineInput,
    window: Interval,
    meal: Option<Interval>,
    weights: SoftWeights,
    scale: f64,
    tasks: HashMap<TaskId, &'a Task>,
    /// wrap → inner
    wraps: BTreeMap<TaskId, TaskId>,
    /// inner → wraps
    wrapped: BTreeMap<TaskId, Vec<TaskId>>,
    /// prerequisite → tasks depending on it
    dependents: BTreeMap<TaskId, Vec<TaskId>>,
    roster: Vec<u64>,
}

impl<'a> Day<'a> {
    fn new(input: &'a EngineInput, level: SoftLevel) -> EngineResult<Self> {
        let window = input.work_day_interval()?;
        let meal = input.meal_interval()?;
        let wraps = wrap_pairs(input);
        let mut wrapped: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        for (&wrap, &inner) in &wraps {
            wrapped.entry(inner).or_default().push(wrap);
        }
        let mut dependents: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        for task in &input.tasks {
            for &dep in &task.depends_on_task_ids {
                dependents.entry(dep).or_default().push(task.id);
            }
        }
        let mut roster = input.itinerant_team_ids.clone();
        roster.sort_unstable();
        roster.dedup();

        Ok(Self {
            input,
            window,
            meal,
            weights: input.optimizer_weights.clamped(),
            scale: level.scale(),
            tasks: input.tasks.iter().map(|t| (t.id, t)).collect(),
            wraps,
            wrapped,
            dependents,
            roster,
        })
    }

    fn is_wrap(&self, task_id: TaskId) -> bool {
        self.wraps.contains_key(&task_id)
    }

    /// Tasks whose overlap with `task_id` is allowed (its wrap/inner partners).
    fn partners(&self, task_id: TaskId) -> Vec<TaskId> {
        let mut out: Vec<TaskId> = self.wraps.get(&task_id).copied().into_iter().collect();
        if let Some(ws) = self.wrapped.get(&task_id) {
            out.extend(ws.iter().copied());
        }
        out
    }

    /// Interval the crew is held for when the task runs over `core`.
    fn team_hold(&self, task: &Task, core: Interval) -> Interval {
        if self.is_wrap(task.id) {
            core
        } else {
            buffered(core)
        }
    }

    /// Whether a crew exists that could ever serve this task.
    fn has_usable_team(&self, task: &Task) -> bool {
        match task.itinerant_team_requirement {
            ItinerantRequirement::None => true,
            ItinerantRequirement::Any => !self.roster.is_empty(),
            ItinerantRequirement::Specific => task
                .itinerant_team_id
                .is_some_and(|t| self.roster.contains(&t)),
        }
    }

    fn pick_team(&self, occ: &Occupancy, task: &Task, hold: Interval) -> Result<Option<u64>, Blocker> {
        match task.itinerant_team_requirement {
            ItinerantRequirement::None => Ok(None),
            ItinerantRequirement::Any => self
                .roster
                .iter()
                .copied()
                .find(|&t| !occ.team_busy(t, hold))
                .map(Some)
                .ok_or(Blocker::Team),
            ItinerantRequirement::Specific => match task.itinerant_team_id {
                Some(t) if self.roster.contains(&t) && !occ.team_busy(t, hold) => Ok(Some(t)),
                _ => Err(Blocker::Team),
            },
        }
    }

    /// Units pinned by resource/full locks.
    fn forced_resources(&self, task_id: TaskId) -> Vec<PlanItemId> {
        let mut ids: Vec<PlanItemId> = self
            .input
            .locks
            .iter()
            .filter(|l| {
                l.task_id == task_id && matches!(l.lock_type, LockType::Resource | LockType::Full)
            })
            .filter_map(|l| l.locked_resource_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn allocate(&self, occ: &Occupancy, task: &Task, iv: Interval) -> Option<Vec<PlanItemId>> {
        let free = occ.free_resources(&self.input.plan_resource_items, iv);
        let forced = self.forced_resources(task.id);
        if forced.iter().any(|f| !free.iter().any(|r| r.id == *f)) {
            return None;
        }
        let pool: Vec<&ResourceItem> = free.into_iter().filter(|r| !forced.contains(&r.id)).collect();
        let mut ids = task
            .resource_requirements
            .allocate_ranked(&pool, |r| self.input.resource_rank(task, r.id))?;
        ids.extend(forced);
        ids.sort_unstable();
        ids.dedup();
        Some(ids)
    }

    /// Checks every per-start hard constraint of `task` at `iv`.
    fn check(&self, occ: &Occupancy, task: &Task, iv: Interval) -> Result<Placement, Blocker> {
        if let Some(meal) = self.meal {
            let misplaced = if self.input.is_meal_task(task) {
                !meal.contains(&iv)
            } else {
                iv.overlaps(&meal)
            };
            if misplaced {
                return Err(Blocker::Meal);
            }
        }
        if self.input.is_contestant_meal(task)
            && occ.meals_in_use(iv) >= self.input.meal_capacity()
        {
            return Err(Blocker::MealCapacity);
        }
        let partners = self.partners(task.id);
        if occ.space_blocker(task.space_id, iv, &partners).is_some() {
            return Err(Blocker::Space);
        }
        if occ.contestant_blocker(task.contestant_id, iv, &partners).is_some() {
            return Err(Blocker::Contestant);
        }
        if task.cameras_required > 0
            && occ.cameras_in_use(iv) + task.cameras_required > self.input.cameras_available
        {
            return Err(Blocker::Cameras);
        }
        let team = self.pick_team(occ, task, self.team_hold(task, iv))?;
        let resources = self.allocate(occ, task, iv).ok_or(Blocker::Resource)?;
        Ok(Placement {
            interval: iv,
            resources,
            team,
        })
    }

    /// Latest prerequisite end, or the prerequisite that is not placed.
    ///
    /// Dangling references, cancelled prerequisites, and fixed tasks
    /// without times are ignored. A wrap does not wait for its inner.
    fn dependency_end(&self, occ: &Occupancy, task: &Task) -> Result<Option<i64>, TaskId> {
        let inner = self.wraps.get(&task.id).copied();
        let mut end: Option<i64> = None;
        for &dep in &task.depends_on_task_ids {
            if Some(dep) == inner {
                continue;
            }
            let Some(dep_task) = self.tasks.get(&dep) else {
                continue;
            };
            if let Some(slot) = occ.slot(dep) {
                end = Some(end.map_or(slot.interval.end, |e| e.max(slot.interval.end)));
            } else if dep_task.needs_placement() {
                return Err(dep);
            }
        }
        Ok(end)
    }

    /// Earliest start among already placed tasks that depend on `task`,
    /// with the dependent's id. Wrap partners do not count.
    fn dependent_start(&self, occ: &Occupancy, task: &Task) -> Option<(i64, TaskId)> {
        let partners = self.partners(task.id);
        self.dependents
            .get(&task.id)?
            .iter()
            .filter(|&&d| !partners.contains(&d))
            .filter_map(|&d| occ.slot(d).map(|s| (s.interval.start, d)))
            .min()
    }

    /// Start range `(earliest, latest)` for a task of `duration` that must
    /// start at or after `after` and end by `before`.
    fn start_range(
        &self,
        task: &Task,
        duration: i64,
        after: Option<i64>,
        before: Option<i64>,
    ) -> Result<(i64, i64), &'static str> {
        let mut lo = self.window.start;
        let mut hi = self.window.end;
        if let Some(cw) = task.contestant_id.and_then(|c| self.input.contestant_window(c)) {
            lo = lo.max(cw.start);
            hi = hi.min(cw.end);
            if snap_up(lo) + duration > hi {
                return Err(codes::CONTESTANT_NOT_AVAILABLE);
            }
        }
        if let Some(meal) = self.meal.filter(|_| self.input.is_meal_task(task)) {
            lo = lo.max(meal.start);
            hi = hi.min(meal.end);
            if snap_up(lo) + duration > hi {
                return Err(if self.input.is_contestant_meal(task) {
                    codes::MEAL_CONTESTANT_NO_FIT
                } else {
                    codes::MEAL_ZONE_NO_FIT
                });
            }
        }
        if let Some(after) = after {
            lo = lo.max(after);
        }
        let lo = snap_up(lo);
        if lo + duration > hi {
            return Err(codes::NO_TIME);
        }
        if let Some(before) = before {
            hi = hi.min(before);
            if lo + duration > hi {
                return Err(codes::DEPENDENCY_NOT_SCHEDULED);
            }
        }
        Ok((lo, hi - duration))
    }

    /// Soft-preference penalty of placing `task` at `iv`.
    fn soft_cost(&self, occ: &Occupancy, task: &Task, iv: Interval) -> f64 {
        let w = self.weights;
        let main_zone = self.input.main_zone_id;
        let mut cost = 0.0;

        if main_zone.is_some() && task.zone_id == main_zone {
            let in_main = |s: &Slot| s.zone_id == main_zone;
            if w.main_zone_keep_busy > 0.0 {
                let prev_end = occ
                    .previous(iv.start, in_main)
                    .map_or(self.window.start, |s| s.interval.end);
                let mut idle = iv.start - prev_end;
                if let Some(next) = occ.next(iv.end, in_main) {
                    idle += next.interval.start - iv.end;
                }
                cost += w.main_zone_keep_busy / 10.0 * idle as f64;
            }
            if w.main_zone_finish_early > 0.0 {
                cost += w.main_zone_finish_early / 10.0 * (iv.end - self.window.start) as f64;
            }
        }

        if w.group_by_space_template_match > 0.0
            && task.space_id.is_some()
            && self.input.groups_zone(task.zone_id)
        {
            let same_space = |s: &Slot| s.space_id == task.space_id;
            let switches = occ
                .previous(iv.start, same_space)
                .into_iter()
                .chain(occ.next(iv.end, same_space))
                .filter(|s| s.template_id != task.template_id)
                .count();
            cost += w.group_by_space_template_match / 10.0 * SWITCH_PENALTY * switches as f64;
        }

        if let Some(contestant) = task.contestant_id {
            let mine = |s: &Slot| s.contestant_id == Some(contestant);
            let prev = occ.previous(iv.start, mine);
            let next = occ.next(iv.end, mine);
            if w.contestant_compact > 0.0 {
                let gap = prev.map_or(0, |p| iv.start - p.interval.end)
                    + next.map_or(0, |n| n.interval.start - iv.end);
                cost += w.contestant_compact / 10.0 * gap as f64;
            }
            if w.contestant_stay_in_zone > 0.0 {
                let changes = prev
                    .into_iter()
                    .chain(next)
                    .filter(|s| s.zone_id != task.zone_id)
                    .count();
                cost += w.contestant_stay_in_zone / 10.0 * SWITCH_PENALTY * changes as f64;
            }
        }

        cost
    }

    /// Scans grid starts in `[lo, hi]` and returns the cheapest feasible one.
    fn search<P>(
        &self,
        occ: &Occupancy,
        task: &Task,
        duration: i64,
        (lo, hi): (i64, i64),
        probe: impl Fn(Interval) -> Result<P, Blocker>,
    ) -> Result<P, Tally> {
        let soft = self.scale > 0.0 && !self.weights.is_zero();
        let mut tally = Tally::new();
        let mut best: Option<(f64, P)> = None;

        let mut start = lo;
        while start <= hi {
            let iv = Interval::new(start, start + duration);
            match probe(iv) {
                Ok(found) if !soft => return Ok(found),
                Ok(found) => {
                    let cost = (start - lo) as f64 + self.scale * self.soft_cost(occ, task, iv);
                    if best.as_ref().map_or(true, |(c, _)| cost < *c) {
                        best = Some((cost, found));
                    }
                }
                Err(blocker) => *tally.entry(blocker).or_insert(0) += 1,
            }
            start += GRID_MINUTES;
        }

        best.map(|(_, found)| found).ok_or(tally)
    }
}

fn slot_of(task: &Task, interval: Interval) -> Slot {
    Slot {
        task_id: task.id,
        interval,
        space_id: task.space_id,
        zone_id: task.zone_id,
        contestant_id: task.contestant_id,
        template_id: task.template_id,
    }
}

fn dominant(tally: &Tally) -> &'static str {
    tally
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map_or(codes::NO_TIME, |(b, _)| b.code())
}

/// Mutable state of one attempt.
struct Run<'a> {
    day: Day<'a>,
    occupancy: Occupancy,
    planned: BTreeMap<TaskId, PlannedTask>,
    unplanned: BTreeMap<TaskId, Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl<'a> Run<'a> {
    fn new(day: Day<'a>) -> Self {
        Self {
            day,
            occupancy: Occupancy::new(),
            planned: BTreeMap::new(),
            unplanned: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    fn is_resolved(&self, task_id: TaskId) -> bool {
        self.planned.contains_key(&task_id) || self.unplanned.contains_key(&task_id)
    }

    fn commit(&mut self, task: &Task, placement: Placement) {
        let hold = placement
            .team
            .map(|t| (t, self.day.team_hold(task, placement.interval)));
        self.occupancy.book(
            slot_of(task, placement.interval),
            &placement.resources,
            hold,
            task.cameras_required,
        );
        if self.day.input.is_contestant_meal(task) {
            self.occupancy.book_meal(placement.interval);
        }
        self.planned.insert(
            task.id,
            PlannedTask::new(task.id, placement.interval)
                .with_resources(placement.resources)
                .with_space(task.space_id)
                .with_team(placement.team),
        );
    }

    fn unplan(&mut self, task: &Task, code: &str, details: Option<serde_json::Value>) {
        debug!(task_id = task.id, code, "task not placed");
        let mut reason = Diagnostic::new(code, format!("Task {} could not be placed: {code}", task.id))
            .for_task(task.id)
            .in_space(task.space_id);
        if let Some(details) = details {
            reason = reason.with_details(details);
        }
        self.unplanned.insert(task.id, reason);
    }

    fn warn_conflict(&mut self, task: &Task, kind: &str, other: Option<TaskId>) {
        self.warnings.push(
            Diagnostic::new(
                codes::LOCK_CONFLICT,
                format!("Pinned task {} conflicts on {kind}", task.id),
            )
            .for_task(task.id)
            .in_space(task.space_id)
            .with_details(json!({ "kind": kind, "otherTaskId": other })),
        );
    }

    /// Step 1: fixed occupancy.
    fn pin_fixed(&mut self) {
        let input = self.day.input;
        for task in &input.tasks {
            if task.status == TaskStatus::Cancelled {
                continue;
            }
            let locked = input.time_lock(task.id).and_then(|l| l.interval());

            if task.needs_placement() {
                if let Some(iv) = locked {
                    let resources = self.day.allocate(&self.occupancy, task, iv);
                    if resources.is_none() {
                        self.warn_conflict(task, "resources", None);
                    }
                    let resources = resources.unwrap_or_else(|| self.day.forced_resources(task.id));
                    self.pin(task, iv, resources);
                }
                continue;
            }

            match locked.or_else(|| task.planned_interval()) {
                Some(iv) => self.pin(task, iv, task.assigned_resource_ids.clone()),
                None => self.warnings.push(
                    Diagnostic::new(
                        codes::FIXED_TASK_WITHOUT_TIMES,
                        format!("Fixed task {} has no usable start/end", task.id),
                    )
                    .for_task(task.id)
                    .in_space(task.space_id),
                ),
            }
        }
        self.check_pinned_dependencies();
    }

    /// Warns about pinned tasks that start before a pinned prerequisite ends.
    fn check_pinned_dependencies(&mut self) {
        let input = self.day.input;
        let mut broken: Vec<(&'a Task, TaskId)> = Vec::new();
        for task in &input.tasks {
            let Some(slot) = self.occupancy.slot(task.id) else {
                continue;
            };
            let partners = self.day.partners(task.id);
            for &dep in &task.depends_on_task_ids {
                if partners.contains(&dep) {
                    continue;
                }
                if self
                    .occupancy
                    .slot(dep)
                    .is_some_and(|d| d.interval.end > slot.interval.start)
                {
                    broken.push((task, dep));
                }
            }
        }
        for (task, dep) in broken {
            self.warn_conflict(task, "dependency", Some(dep));
        }
    }

    fn pin(&mut self, task: &Task, iv: Interval, resources: Vec<PlanItemId>) {
        if !self.day.window.contains(&iv) {
            self.warn_conflict(task, "work day", None);
        }
        if let Some(meal) = self.day.meal {
            let misplaced = if self.day.input.is_meal_task(task) {
                !meal.contains(&iv)
            } else {
                iv.overlaps(&meal)
            };
            if misplaced {
                self.warn_conflict(task, "meal", None);
            }
        }
        if self.day.input.is_contestant_meal(task)
            && self.occupancy.meals_in_use(iv) >= self.day.input.meal_capacity()
        {
            self.warn_conflict(task, "meal capacity", None);
        }
        let partners = self.day.partners(task.id);
        if let Some(other) = self.occupancy.space_blocker(task.space_id, iv, &partners) {
            self.warn_conflict(task, "space", Some(other));
        }
        if let Some(other) = self.occupancy.contestant_blocker(task.contestant_id, iv, &partners) {
            self.warn_conflict(task, "contestant", Some(other));
        }
        if let Some(other) = resources
            .iter()
            .find_map(|&r| self.occupancy.resource_blocker(r, iv))
        {
            self.warn_conflict(task, "resources", Some(other));
        }
        if task.cameras_required > 0
            && self.occupancy.cameras_in_use(iv) + task.cameras_required
                > self.day.input.cameras_available
        {
            self.warn_conflict(task, "cameras", None);
        }
        let team = match self
            .day
            .pick_team(&self.occupancy, task, self.day.team_hold(task, iv))
        {
            Ok(team) => team,
            Err(_) => {
                self.warn_conflict(task, "itinerant team", None);
                None
            }
        };
        self.commit(
            task,
            Placement {
                interval: iv,
                resources,
                team,
            },
        );
    }

    /// Steps 2-4: everything that still needs a slot.
    fn place_remaining(&mut self) {
        let input = self.day.input;
        let mut graph: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        for task in input.tasks.iter().filter(|t| t.needs_placement()) {
            if self.is_resolved(task.id) {
                continue;
            }
            let mut deps = task.depends_on_task_ids.clone();
            if let Some(&inner) = self.day.wraps.get(&task.id) {
                deps.push(inner);
            }
            graph.insert(task.id, deps);
        }

        let order = dependency_order(&graph);
        for &id in &order.cyclic {
            if let Some(task) = self.day.tasks.get(&id).copied() {
                self.unplan(task, codes::DEPENDENCY_CYCLE, None);
            }
        }
        for id in order.order {
            if self.is_resolved(id) {
                continue;
            }
            if let Some(task) = self.day.tasks.get(&id).copied() {
                self.place(task);
            }
        }
    }

    fn place(&mut self, task: &'a Task) {
        if !self.day.has_usable_team(task) {
            self.unplan(task, codes::NO_ITINERANT_TEAM, None);
            return;
        }
        let after = match self.day.dependency_end(&self.occupancy, task) {
            Ok(after) => after,
            Err(dep) => {
                self.unplan(
                    task,
                    codes::DEPENDENCY_NOT_SCHEDULED,
                    Some(json!({ "dependsOnTaskId": dep })),
                );
                return;
            }
        };

        let before = self.day.dependent_start(&self.occupancy, task);

        if let Some(&inner) = self.day.wraps.get(&task.id) {
            self.place_wrap(task, inner, after, before.map(|(start, _)| start));
            return;
        }

        let Some(duration) = self.day.input.resolved_duration(task) else {
            self.unplan(task, codes::MISSING_DURATION, None);
            return;
        };
        let range = match self
            .day
            .start_range(task, duration, after, before.map(|(start, _)| start))
        {
            Ok(range) => range,
            Err(code) => {
                let details = before
                    .filter(|_| code == codes::DEPENDENCY_NOT_SCHEDULED)
                    .map(|(_, d)| json!({ "lockedDependentTaskId": d }));
                self.unplan(task, code, details);
                return;
            }
        };

        if self.place_with_wraps(task, duration, range) {
            return;
        }

        let day = &self.day;
        let occ = &self.occupancy;
        match day.search(occ, task, duration, range, |iv| day.check(occ, task, iv)) {
            Ok(placement) => self.commit(task, placement),
            Err(tally) => {
                let details = blockers_json(&tally);
                self.unplan(task, dominant(&tally), Some(details));
            }
        }
    }

    /// Places a wrap around its already placed inner task.
    fn place_wrap(
        &mut self,
        task: &Task,
        inner: TaskId,
        after: Option<i64>,
        before: Option<i64>,
    ) {
        let Some(inner_slot) = self.occupancy.slot(inner).copied() else {
            self.unplan(
                task,
                codes::ITINERANT_WRAP_NOT_FEASIBLE,
                Some(json!({ "innerTaskId": inner, "cause": "inner not placed" })),
            );
            return;
        };
        let iv = buffered(inner_slot.interval);
        match self.wrap_fits(&self.occupancy, task, iv, after, before) {
            Ok(placement) => self.commit(task, placement),
            Err(blocker) => self.unplan(
                task,
                codes::ITINERANT_WRAP_NOT_FEASIBLE,
                Some(json!({ "innerTaskId": inner, "cause": blocker.code() })),
            ),
        }
    }

    fn wrap_fits(
        &self,
        occ: &Occupancy,
        wrap: &Task,
        iv: Interval,
        after: Option<i64>,
        before: Option<i64>,
    ) -> Result<Placement, Blocker> {
        let day = &self.day;
        if !day.window.contains(&iv)
            || after.is_some_and(|a| a > iv.start)
            || before.is_some_and(|b| b < iv.end)
        {
            return Err(Blocker::Wrap);
        }
        if let Some(cw) = wrap.contestant_id.and_then(|c| day.input.contestant_window(c)) {
            if !cw.contains(&iv) {
                return Err(Blocker::Wrap);
            }
        }
        day.check(occ, wrap, iv)
    }

    /// Places an inner task together with its pending wraps.
    ///
    /// Returns `false` when no start fits all of them; the caller then
    /// places the inner task alone.
    fn place_with_wraps(&mut self, task: &'a Task, duration: i64, range: (i64, i64)) -> bool {
        let mut companions: Vec<(&'a Task, Option<i64>, Option<i64>)> = Vec::new();
        for &w in self.day.wrapped.get(&task.id).into_iter().flatten() {
            let Some(wrap) = self.day.tasks.get(&w).copied() else {
                continue;
            };
            if !wrap.needs_placement() || self.is_resolved(w) || !self.day.has_usable_team(wrap) {
                continue;
            }
            if let Ok(after) = self.day.dependency_end(&self.occupancy, wrap) {
                let before = self
                    .day
                    .dependent_start(&self.occupancy, wrap)
                    .map(|(start, _)| start);
                companions.push((wrap, after, before));
            }
        }
        if companions.is_empty() {
            return false;
        }

        let day = &self.day;
        let occ = &self.occupancy;
        let found = day.search(occ, task, duration, range, |iv| {
            let inner = day.check(occ, task, iv)?;
            let mut scratch = occ.clone();
            scratch.book(
                slot_of(task, iv),
                &inner.resources,
                inner.team.map(|t| (t, day.team_hold(task, iv))),
                task.cameras_required,
            );
            let mut wraps = Vec::with_capacity(companions.len());
            for &(wrap, after, before) in &companions {
                let placement = self
                    .wrap_fits(&scratch, wrap, buffered(iv), after, before)
                    .map_err(|_| Blocker::Wrap)?;
                scratch.book(
                    slot_of(wrap, placement.interval),
                    &placement.resources,
                    placement.team.map(|t| (t, placement.interval)),
                    wrap.cameras_required,
                );
                wraps.push((wrap, placement));
            }
            Ok((inner, wraps))
        });

        match found {
            Ok((inner, wraps)) => {
                self.commit(task, inner);
                for (wrap, placement) in wraps {
                    self.commit(wrap, placement);
                }
                true
            }
            Err(_) => false,
        }
    }

    fn finish(self, level: SoftLevel) -> Attempt {
        let Run {
            day,
            occupancy,
            mut planned,
            unplanned,
            warnings,
        } = self;

        let mut planned_tasks: Vec<(Interval, PlannedTask)> = occupancy
            .slots()
            .iter()
            .filter_map(|s| planned.remove(&s.task_id).map(|p| (s.interval, p)))
            .collect();
        planned_tasks.sort_by_key(|(iv, p)| (iv.start, p.task_id));
        let placed: BTreeSet<TaskId> = planned_tasks.iter().map(|(_, p)| p.task_id).collect();

        let complete = day
            .input
            .tasks
            .iter()
            .filter(|t| t.needs_placement())
            .all(|t| placed.contains(&t.id));

        Attempt {
            level,
            complete,
            planned_tasks: planned_tasks.into_iter().map(|(_, p)| p).collect(),
            unplanned: unplanned
                .into_iter()
                .map(|(task_id, reason)| UnplannedTask { task_id, reason })
                .collect(),
            warnings,
        }
    }
}

fn blockers_json(tally: &Tally) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = tally
        .iter()
        .map(|(b, n)| (b.code().to_string(), json!(n)))
        .collect();
    json!({ "blockers": map })
}
