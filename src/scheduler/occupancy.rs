//! Occupancy ledger for one feasibility attempt.
//!
//! Records every booked interval per space, contestant, resource unit,
//! itinerant crew, camera usage and contestant meal, and answers "is this
//! free" queries against it.

use std::collections::HashMap;

use crate::models::{Interval, PlanItemId, ResourceItem, TaskId};

/// A placed task as seen by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Task id.
    pub task_id: TaskId,
    /// Placed interval.
    pub interval: Interval,
    /// Space, if any.
    pub space_id: Option<u64>,
    /// Zone, if any.
    pub zone_id: Option<u64>,
    /// Contestant, if any.
    pub contestant_id: Option<u64>,
    /// Template.
    pub template_id: u64,
}

/// Booked intervals of one attempt.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    slots: Vec<Slot>,
    resources: HashMap<PlanItemId, Vec<(Interval, TaskId)>>,
    teams: HashMap<u64, Vec<(Interval, TaskId)>>,
    cameras: Vec<(Interval, u32)>,
    meals: Vec<(Interval, u32)>,
}

impl Occupancy {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Booked slots in booking order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Booked slot of a task.
    pub fn slot(&self, task_id: TaskId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.task_id == task_id)
    }

    /// First task holding `space_id` during `interval`, skipping `ignore`.
    pub fn space_blocker(
        &self,
        space_id: Option<u64>,
        interval: Interval,
        ignore: &[TaskId],
    ) -> Option<TaskId> {
        let space = space_id?;
        self.slots
            .iter()
            .find(|s| {
                s.space_id == Some(space)
                    && !ignore.contains(&s.task_id)
                    && s.interval.overlaps(&interval)
            })
            .map(|s| s.task_id)
    }

    /// First task holding `contestant_id` during `interval`, skipping `ignore`.
    pub fn contestant_blocker(
        &self,
        contestant_id: Option<u64>,
        interval: Interval,
        ignore: &[TaskId],
    ) -> Option<TaskId> {
        let contestant = contestant_id?;
        self.slots
            .iter()
            .find(|s| {
                s.contestant_id == Some(contestant)
                    && !ignore.contains(&s.task_id)
                    && s.interval.overlaps(&interval)
            })
            .map(|s| s.task_id)
    }

    /// Task holding resource unit `id` during `interval`.
    pub fn resource_blocker(&self, id: PlanItemId, interval: Interval) -> Option<TaskId> {
        self.resources
            .get(&id)?
            .iter()
            .find(|(iv, _)| iv.overlaps(&interval))
            .map(|&(_, task)| task)
    }

    /// Whether crew `team` is booked during `interval`.
    pub fn team_busy(&self, team: u64, interval: Interval) -> bool {
        self.teams
            .get(&team)
            .is_some_and(|b| b.iter().any(|(iv, _)| iv.overlaps(&interval)))
    }

    /// Available units not booked during `interval`.
    pub fn free_resources<'a>(
        &self,
        items: &'a [ResourceItem],
        interval: Interval,
    ) -> Vec<&'a ResourceItem> {
        items
            .iter()
            .filter(|r| r.is_available && self.resource_blocker(r.id, interval).is_none())
            .collect()
    }

    /// Peak number of cameras in use at any instant of `interval`.
    pub fn cameras_in_use(&self, interval: Interval) -> u32 {
        peak_load(&self.cameras, interval)
    }

    /// Peak number of contestant meals running at any instant of `interval`.
    pub fn meals_in_use(&self, interval: Interval) -> u32 {
        peak_load(&self.meals, interval)
    }

    /// Books a contestant meal on top of its slot.
    pub fn book_meal(&mut self, interval: Interval) {
        self.meals.push((interval, 1));
    }

    /// Books a placement.
    ///
    /// `team` is the crew and the (buffered) interval it is held for.
    pub fn book(
        &mut self,
        slot: Slot,
        resources: &[PlanItemId],
        team: Option<(u64, Interval)>,
        cameras: u32,
    ) {
        for &r in resources {
            self.resources
                .entry(r)
                .or_default()
                .push((slot.interval, slot.task_id));
        }
        if let Some((team, iv)) = team {
            self.teams.entry(team).or_default().push((iv, slot.task_id));
        }
        if cameras > 0 {
            self.cameras.push((slot.interval, cameras));
        }
        self.slots.push(slot);
    }

    /// Latest-ending slot matching `filter` that ends at or before `at`.
    pub fn previous(&self, at: i64, filter: impl Fn(&Slot) -> bool) -> Option<&Slot> {
        self.slots
            .iter()
            .filter(|s| s.interval.end <= at && filter(s))
            .max_by_key(|s| (s.interval.end, s.task_id))
    }

    /// Earliest-starting slot matching `filter` that starts at or after `at`.
    pub fn next(&self, at: i64, filter: impl Fn(&Slot) -> bool) -> Option<&Slot> {
        self.slots
            .iter()
            .filter(|s| s.interval.start >= at && filter(s))
            .min_by_key(|s| (s.interval.start, s.task_id))
    }
}

/// Peak summed load of `bookings` inside `interval`.
///
/// The peak is reached at `interval.start` or at the start of some
/// booking inside the interval, so only those instants are sampled.
fn peak_load(bookings: &[(Interval, u32)], interval: Interval) -> u32 {
    let load_at = |t: i64| -> u32 {
        bookings
            .iter()
            .filter(|(iv, _)| iv.start <= t && t < iv.end)
            .map(|&(_, n)| n)
            .sum()
    };
    std::iter::once(interval.start)
        .chain(
            bookings
                .iter()
                .map(|(iv, _)| iv.start)
                .filter(|&t| t > interval.start && t < interval.end),
        )
        .map(load_at)
        .max()
        .unwrap_or(0)
}
