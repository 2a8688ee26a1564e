//! User pins on tasks.

use serde::{Deserialize, Serialize};

use super::resource::PlanItemId;
use super::task::TaskId;
use super::time::Interval;

/// What a lock pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    /// Start and end.
    Time,
    /// Space only.
    Space,
    /// A resource unit only.
    Resource,
    /// Start, end, and resources.
    Full,
}

/// A hard pin on one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    /// Lock identifier.
    pub id: u64,
    /// Pinned task.
    pub task_id: TaskId,
    /// Pin kind.
    pub lock_type: LockType,
    /// Locked start (`HH:MM`).
    #[serde(default)]
    pub locked_start: Option<String>,
    /// Locked end (`HH:MM`).
    #[serde(default)]
    pub locked_end: Option<String>,
    /// Locked resource unit.
    #[serde(default)]
    pub locked_resource_id: Option<PlanItemId>,
}

impl Lock {
    /// Creates a time lock.
    pub fn time(id: u64, task_id: TaskId, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            id,
            task_id,
            lock_type: LockType::Time,
            locked_start: Some(start.into()),
            locked_end: Some(end.into()),
            locked_resource_id: None,
        }
    }

    /// Creates a full lock.
    pub fn full(
        id: u64,
        task_id: TaskId,
        start: impl Into<String>,
        end: impl Into<String>,
        resource: Option<PlanItemId>,
    ) -> Self {
        Self {
            lock_type: LockType::Full,
            locked_resource_id: resource,
            ..Self::time(id, task_id, start, end)
        }
    }

    /// Whether this lock freezes start and end.
    pub fn pins_time(&self) -> bool {
        matches!(self.lock_type, LockType::Time | LockType::Full)
    }

    /// Locked interval, when this lock pins time and both bounds parse.
    pub fn interval(&self) -> Option<Interval> {
        if !self.pins_time() {
            return None;
        }
        let iv = Interval::from_hhmm(self.locked_start.as_deref()?, self.locked_end.as_deref()?)?;
        iv.is_valid().then_some(iv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_interval() {
        let lock = Lock::time(1, 9, "10:00", "10:45");
        assert!(lock.pins_time());
        assert_eq!(lock.interval(), Some(Interval::new(600, 645)));

        let full = Lock::full(2, 9, "11:00", "11:30", Some(4));
        assert_eq!(full.lock_type, LockType::Full);
        assert_eq!(full.locked_resource_id, Some(4));

        let space = Lock {
            lock_type: LockType::Space,
            ..Lock::time(3, 9, "10:00", "10:45")
        };
        assert_eq!(space.interval(), None);
    }
}
