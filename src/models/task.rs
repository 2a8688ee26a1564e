//! Task model.
//!
//! A task is one block of shooting-day work: a template (what is being
//! done) performed for a contestant in a space, optionally with
//! resources, prerequisites, and an itinerant crew.
//!
//! Manual blocks are tasks too (`isManualBlock`): user-placed intervals
//! that occupy space and contestant time but are never moved.

use serde::{Deserialize, Serialize};

use super::resource::{PlanItemId, ResourceRequirements};
use super::time::Interval;

/// Task identifier.
pub type TaskId = u64;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet.
    #[default]
    Pending,
    /// Currently being shot; its interval is frozen.
    InProgress,
    /// Finished; its interval is frozen.
    Done,
    /// Started and stopped; needs a new slot.
    Interrupted,
    /// Dropped from the day.
    Cancelled,
}

impl TaskStatus {
    /// Whether the recorded interval is immutable (done or in progress).
    pub fn is_fixed(self) -> bool {
        matches!(self, Self::Done | Self::InProgress)
    }

    /// Whether the task is outside the set the engine must place.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Done | Self::InProgress | Self::Cancelled)
    }
}

/// Itinerant crew requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItinerantRequirement {
    /// No crew.
    #[default]
    None,
    /// Any crew from the roster.
    Any,
    /// The crew named by `itinerantTeamId`.
    Specific,
}

/// A task to be placed on the shooting day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Template identifier.
    #[serde(default)]
    pub template_id: u64,
    /// Template display name.
    #[serde(default)]
    pub template_name: Option<String>,
    /// Zone (set, studio floor) the task belongs to.
    #[serde(default)]
    pub zone_id: Option<u64>,
    /// Space (room, corner) the task is shot in.
    #[serde(default)]
    pub space_id: Option<u64>,
    /// Contestant being filmed.
    #[serde(default)]
    pub contestant_id: Option<u64>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Duration in minutes.
    #[serde(default, alias = "durationOverrideMin")]
    pub duration_minutes: Option<i64>,
    /// Planned start (`HH:MM`).
    #[serde(default)]
    pub start_planned: Option<String>,
    /// Planned end (`HH:MM`).
    #[serde(default)]
    pub end_planned: Option<String>,
    /// Normalized resource requirements.
    #[serde(default)]
    pub resource_requirements: ResourceRequirements,
    /// Resolved prerequisite task ids.
    #[serde(default)]
    pub depends_on_task_ids: Vec<TaskId>,
    /// Itinerant crew requirement.
    #[serde(default)]
    pub itinerant_team_requirement: ItinerantRequirement,
    /// Crew for [`ItinerantRequirement::Specific`].
    #[serde(default)]
    pub itinerant_team_id: Option<u64>,
    /// User-placed immutable interval.
    #[serde(default)]
    pub is_manual_block: bool,
    /// Meal or break entity.
    #[serde(default)]
    pub is_break: bool,
    /// Cameras consumed while running.
    #[serde(default, alias = "camerasOverride")]
    pub cameras_required: u32,
    /// Resources already bound (fixed tasks, full locks).
    #[serde(default)]
    pub assigned_resource_ids: Vec<PlanItemId>,
}

impl Task {
    /// Creates a pending task with the given ID.
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Sets the template.
    pub fn with_template(mut self, template_id: u64, name: impl Into<String>) -> Self {
        self.template_id = template_id;
        self.template_name = Some(name.into());
        self
    }

    /// Sets the zone.
    pub fn with_zone(mut self, zone_id: u64) -> Self {
        self.zone_id = Some(zone_id);
        self
    }

    /// Sets the space.
    pub fn with_space(mut self, space_id: u64) -> Self {
        self.space_id = Some(space_id);
        self
    }

    /// Sets the contestant.
    pub fn with_contestant(mut self, contestant_id: u64) -> Self {
        self.contestant_id = Some(contestant_id);
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the duration in minutes.
    pub fn with_duration(mut self, minutes: i64) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    /// Sets the planned interval.
    pub fn with_planned(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_planned = Some(start.into());
        self.end_planned = Some(end.into());
        self
    }

    /// Sets the resource requirements.
    pub fn with_requirements(mut self, requirements: ResourceRequirements) -> Self {
        self.resource_requirements = requirements;
        self
    }

    /// Adds a prerequisite.
    pub fn with_dependency(mut self, task_id: TaskId) -> Self {
        self.depends_on_task_ids.push(task_id);
        self
    }

    /// Requires any itinerant crew.
    pub fn with_any_itinerant_team(mut self) -> Self {
        self.itinerant_team_requirement = ItinerantRequirement::Any;
        self.itinerant_team_id = None;
        self
    }

    /// Requires a specific itinerant crew.
    pub fn with_itinerant_team(mut self, team_id: u64) -> Self {
        self.itinerant_team_requirement = ItinerantRequirement::Specific;
        self.itinerant_team_id = Some(team_id);
        self
    }

    /// Marks this task as a manual block.
    pub fn manual_block(mut self) -> Self {
        self.is_manual_block = true;
        self
    }

    /// Marks this task as a meal/break entity.
    pub fn as_break(mut self) -> Self {
        self.is_break = true;
        self
    }

    /// Sets the camera count.
    pub fn with_cameras(mut self, cameras: u32) -> Self {
        self.cameras_required = cameras;
        self
    }

    /// Sets already-bound resources.
    pub fn with_assigned_resources(mut self, ids: Vec<PlanItemId>) -> Self {
        self.assigned_resource_ids = ids;
        self
    }

    /// Parsed planned interval, if both bounds are present and valid.
    pub fn planned_interval(&self) -> Option<Interval> {
        let iv = Interval::from_hhmm(self.start_planned.as_deref()?, self.end_planned.as_deref()?)?;
        iv.is_valid().then_some(iv)
    }

    /// Whether the engine must find a slot for this task.
    ///
    /// Final-status tasks and manual blocks are excluded: the former are
    /// frozen or dropped, the latter are user-placed.
    pub fn needs_placement(&self) -> bool {
        !self.status.is_final() && !self.is_manual_block
    }

    /// Whether the task needs an itinerant crew.
    pub fn is_itinerant(&self) -> bool {
        self.itinerant_team_requirement != ItinerantRequirement::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = Task::new(7)
            .with_template(3, "Interview")
            .with_zone(1)
            .with_space(10)
            .with_contestant(42)
            .with_duration(30)
            .with_dependency(6)
            .with_cameras(2);

        assert_eq!(task.id, 7);
        assert_eq!(task.template_name.as_deref(), Some("Interview"));
        assert_eq!(task.space_id, Some(10));
        assert_eq!(task.depends_on_task_ids, vec![6]);
        assert_eq!(task.cameras_required, 2);
        assert!(task.needs_placement());
        assert!(!task.is_itinerant());
    }

    #[test]
    fn test_status_classes() {
        assert!(TaskStatus::Done.is_fixed());
        assert!(TaskStatus::InProgress.is_final());
        assert!(TaskStatus::Cancelled.is_final());
        assert!(!TaskStatus::Cancelled.is_fixed());
        assert!(!TaskStatus::Interrupted.is_final());
        assert!(!Task::new(1).manual_block().needs_placement());
    }

    #[test]
    fn test_planned_interval() {
        let task = Task::new(1).with_planned("09:00", "09:30");
        assert_eq!(task.planned_interval(), Some(Interval::new(540, 570)));
        assert_eq!(Task::new(2).with_planned("09:30", "09:00").planned_interval(), None);
        assert_eq!(Task::new(3).planned_interval(), None);
    }

    #[test]
    fn test_wire_shape() {
        let json = r#"{
            "id": 5,
            "templateId": 2,
            "spaceId": 10,
            "status": "in_progress",
            "durationOverrideMin": 45,
            "itinerantTeamRequirement": "specific",
            "itinerantTeamId": 3
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.duration_minutes, Some(45));
        assert_eq!(task.itinerant_team_requirement, ItinerantRequirement::Specific);
        assert!(task.resource_requirements.is_empty());
        assert!(task.is_itinerant());
    }
}
