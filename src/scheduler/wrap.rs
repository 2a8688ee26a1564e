//! Itinerant crew wraps.
//!
//! A roaming crew needs travel time on both sides of the work it covers.
//! When an itinerant task shares contestant and space with a regular task
//! (its *inner*), it becomes a wrap: it starts [`TRAVEL_BUFFER_MINUTES`]
//! before the inner task and ends the same amount after it. Otherwise the
//! crew is simply held for the buffers around the task itself.

use std::collections::BTreeMap;

use crate::models::{EngineInput, Interval, Task, TaskId, TaskStatus};

/// Travel buffer on each side of an itinerant interval.
pub const TRAVEL_BUFFER_MINUTES: i64 = 15;

/// `[start − 15, end + 15]`: the wrap interval around an inner task, and
/// the crew hold around a task without an inner.
#[inline]
pub fn buffered(core: Interval) -> Interval {
    Interval::new(core.start - TRAVEL_BUFFER_MINUTES, core.end + TRAVEL_BUFFER_MINUTES)
}

fn can_wrap(input: &EngineInput, task: &Task) -> bool {
    task.is_itinerant()
        && !task.is_manual_block
        && task.status != TaskStatus::Cancelled
        && !input.is_meal_task(task)
        && task.contestant_id.is_some()
        && task.space_id.is_some()
}

fn can_be_inner(input: &EngineInput, task: &Task) -> bool {
    !task.is_itinerant()
        && !task.is_manual_block
        && task.status != TaskStatus::Cancelled
        && !input.is_meal_task(task)
}

/// Maps every wrap task to its inner task.
///
/// The inner is a regular task with the same contestant and space. A
/// candidate listed among the wrap's prerequisites is preferred;
/// otherwise the lowest id wins.
pub fn wrap_pairs(input: &EngineInput) -> BTreeMap<TaskId, TaskId> {
    let mut pairs = BTreeMap::new();

    for wrap in input.tasks.iter().filter(|t| can_wrap(input, t)) {
        let mut candidates: Vec<&Task> = input
            .tasks
            .iter()
            .filter(|t| {
                t.id != wrap.id
                    && t.contestant_id == wrap.contestant_id
                    && t.space_id == wrap.space_id
                    && can_be_inner(input, t)
            })
            .collect();
        candidates.sort_by_key(|t| (!wrap.depends_on_task_ids.contains(&t.id), t.id));
        if let Some(inner) = candidates.first() {
            pairs.insert(wrap.id, inner.id);
        }
    }

    pairs
}
