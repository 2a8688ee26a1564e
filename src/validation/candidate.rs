//! Candidate schedule validation.
//!
//! Pure function of `(input, warm start, candidate)`: nothing outside the
//! three arguments is consulted. Every finding is a code with the task ids
//! embedded (`SPACE_OVERLAP_3_7`), so the list can be compared and logged
//! as plain strings.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{EngineInput, EngineOutput, Interval, Lock, TaskId, TaskStatus};
use crate::scheduler::wrap_pairs;

struct Placed {
    task_id: TaskId,
    interval: Interval,
    space_id: Option<u64>,
    contestant_id: Option<u64>,
    resources: Vec<u64>,
}

/// Re-derives every hard-constraint violation in `candidate`.
///
/// Checks, per candidate placement:
/// 1. The task exists in the input (`UNKNOWN_TASK_<id>`)
/// 2. The interval parses and is positive (`INVALID_INTERVAL_<id>`)
/// 3. It lies within the work day (`OUTSIDE_WORKDAY_<id>`)
/// 4. Its length matches the warm start (`DURATION_CHANGED_<id>`)
/// 5. Done/in-progress/cancelled tasks did not move (`MOVED_FIXED_STATUS_<id>`)
/// 6. Time/full locks are honored (`MOVED_LOCKED_TIME_<id>`)
///
/// Then across placements: shared space, contestant, or resource overlap
/// (`SPACE_OVERLAP_`, `CONTESTANT_OVERLAP_`, `RESOURCE_OVERLAP_<a>_<b>`
/// with `a < b`), prerequisites ending after their dependent starts
/// (`DEPENDENCY_BROKEN_<id>_<dep>`), and warm-start entries missing from
/// the candidate (`MISSING_TASK_<id>`), fixed occupancy included, since an
/// accepted candidate replaces the whole schedule. An itinerant wrap and
/// its inner task are exempt from overlap and dependency checks.
///
/// # Returns
/// Distinct codes in first-seen order; empty means the candidate is safe.
pub fn validate_candidate(
    input: &EngineInput,
    warm: &EngineOutput,
    candidate: &EngineOutput,
) -> Vec<String> {
    let mut errors: Vec<String> = Vec::new();
    let Ok(day) = input.work_day_interval() else {
        return vec!["INVALID_WORKDAY".to_string()];
    };

    let tasks: HashMap<TaskId, &crate::models::Task> =
        input.tasks.iter().map(|t| (t.id, t)).collect();
    let warm_by_id = warm.planned_by_id();
    let mut locks: HashMap<TaskId, &Lock> = HashMap::new();
    for lock in input.locks.iter().filter(|l| l.pins_time()) {
        locks.entry(lock.task_id).or_insert(lock);
    }
    let wraps = wrap_pairs(input);
    let exempt = |a: TaskId, b: TaskId| {
        wraps.get(&a) == Some(&b) || wraps.get(&b) == Some(&a)
    };

    let mut placed: Vec<Placed> = Vec::new();
    for p in &candidate.planned_tasks {
        let id = p.task_id;
        let Some(task) = tasks.get(&id) else {
            errors.push(format!("UNKNOWN_TASK_{id}"));
            continue;
        };
        let Some(iv) = p.interval().filter(Interval::is_valid) else {
            errors.push(format!("INVALID_INTERVAL_{id}"));
            continue;
        };
        if !day.contains(&iv) {
            errors.push(format!("OUTSIDE_WORKDAY_{id}"));
        }

        let warm_iv = warm_by_id
            .get(&id)
            .and_then(|w| w.interval())
            .filter(Interval::is_valid);
        if let Some(w) = warm_iv {
            if w.duration() != iv.duration() {
                errors.push(format!("DURATION_CHANGED_{id}"));
            }
            if task.status.is_final() && w != iv {
                errors.push(format!("MOVED_FIXED_STATUS_{id}"));
            }
        }

        if let Some(lock) = locks.get(&id) {
            let start_moved = lock
                .locked_start
                .as_deref()
                .and_then(crate::models::parse_hhmm)
                .is_some_and(|s| s != iv.start);
            let end_moved = lock
                .locked_end
                .as_deref()
                .and_then(crate::models::parse_hhmm)
                .is_some_and(|e| e != iv.end);
            if start_moved || end_moved {
                errors.push(format!("MOVED_LOCKED_TIME_{id}"));
            }
        }

        placed.push(Placed {
            task_id: id,
            interval: iv,
            space_id: task.space_id,
            contestant_id: task.contestant_id,
            resources: p.assigned_resources.clone(),
        });
    }

    for (i, a) in placed.iter().enumerate() {
        for b in &placed[i + 1..] {
            if !a.interval.overlaps(&b.interval) || exempt(a.task_id, b.task_id) {
                continue;
            }
            let (lo, hi) = if a.task_id <= b.task_id {
                (a.task_id, b.task_id)
            } else {
                (b.task_id, a.task_id)
            };
            if a.space_id.is_some() && a.space_id == b.space_id {
                errors.push(format!("SPACE_OVERLAP_{lo}_{hi}"));
            }
            if a.contestant_id.is_some() && a.contestant_id == b.contestant_id {
                errors.push(format!("CONTESTANT_OVERLAP_{lo}_{hi}"));
            }
            if a.resources.iter().any(|r| b.resources.contains(r)) {
                errors.push(format!("RESOURCE_OVERLAP_{lo}_{hi}"));
            }
        }
    }

    let slots: BTreeMap<TaskId, Interval> =
        placed.iter().map(|p| (p.task_id, p.interval)).collect();
    for task in &input.tasks {
        let Some(slot) = slots.get(&task.id) else {
            continue;
        };
        for &dep in &task.depends_on_task_ids {
            let Some(dep_slot) = slots.get(&dep) else {
                continue;
            };
            if slot.start < dep_slot.end && !exempt(task.id, dep) {
                errors.push(format!("DEPENDENCY_BROKEN_{}_{dep}", task.id));
            }
        }
    }

    for w in &warm.planned_tasks {
        let kept = tasks
            .get(&w.task_id)
            .is_some_and(|t| t.status != TaskStatus::Cancelled);
        if kept && !slots.contains_key(&w.task_id) {
            errors.push(format!("MISSING_TASK_{}", w.task_id));
        }
    }

    let mut seen = HashSet::new();
    errors.retain(|e| seen.insert(e.clone()));
    errors
}
