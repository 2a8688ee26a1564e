//! Schedule quality score.
//!
//! The soft objective shared by the warm start and optimized candidates.
//! Lower is better.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Main-zone gap | Sum of idle minutes between consecutive main-zone tasks |
//! | Space switches | Template changes between consecutive tasks of a space |
//! | Score | gap × 10 + switches × 5 |

use std::collections::{BTreeMap, HashMap};

use crate::models::{EngineInput, PlannedTask, Task, TaskId};

/// Weight of one idle main-zone minute.
pub const GAP_WEIGHT: i64 = 10;
/// Weight of one template switch.
pub const SWITCH_WEIGHT: i64 = 5;

/// Soft-objective breakdown of a schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleQuality {
    /// Idle minutes between consecutive main-zone tasks.
    pub main_zone_gap_minutes: i64,
    /// Template changes between consecutive tasks of each space.
    pub space_switches: i64,
    /// `gap × 10 + switches × 5`.
    pub score: i64,
}

impl ScheduleQuality {
    /// Scores a list of placements.
    ///
    /// Placements of unknown tasks and malformed intervals are skipped.
    pub fn calculate(input: &EngineInput, planned: &[PlannedTask]) -> Self {
        let tasks: HashMap<TaskId, &Task> = input.tasks.iter().map(|t| (t.id, t)).collect();
        let mut by_space: BTreeMap<u64, Vec<(i64, u64)>> = BTreeMap::new();
        let mut main: Vec<(i64, i64)> = Vec::new();

        for p in planned {
            let Some(task) = tasks.get(&p.task_id) else {
                continue;
            };
            let Some(iv) = p.interval().filter(|iv| iv.is_valid()) else {
                continue;
            };
            if let Some(space) = task.space_id {
                by_space.entry(space).or_default().push((iv.start, task.template_id));
            }
            if input.main_zone_id.is_some() && task.zone_id == input.main_zone_id {
                main.push((iv.start, iv.end));
            }
        }

        let mut switches = 0;
        for list in by_space.values_mut() {
            list.sort_unstable();
            switches += list.windows(2).filter(|w| w[0].1 != w[1].1).count() as i64;
        }

        main.sort_unstable();
        let gap: i64 = main.windows(2).map(|w| (w[1].0 - w[0].1).max(0)).sum();

        Self {
            main_zone_gap_minutes: gap,
            space_switches: switches,
            score: gap * GAP_WEIGHT + switches * SWITCH_WEIGHT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Interval, TimeWindow};

    #[test]
    fn test_gap_and_switches() {
        let input = EngineInput::new(TimeWindow::new("09:00", "14:00"))
            .with_main_zone(1)
            .with_task(Task::new(1).with_zone(1).with_space(10).with_template(1, "A"))
            .with_task(Task::new(2).with_zone(1).with_space(10).with_template(2, "B"))
            .with_task(Task::new(3).with_zone(1).with_space(10).with_template(1, "A"))
            .with_task(Task::new(4).with_zone(2).with_space(20).with_template(1, "A"));
        let planned = vec![
            PlannedTask::new(1, Interval::new(540, 570)),
            PlannedTask::new(3, Interval::new(600, 630)),
            PlannedTask::new(2, Interval::new(570, 600)),
            PlannedTask::new(4, Interval::new(700, 730)),
            PlannedTask::new(99, Interval::new(540, 570)),
        ];
        let q = ScheduleQuality::calculate(&input, &planned);
        assert_eq!(q.main_zone_gap_minutes, 0);
        assert_eq!(q.space_switches, 2);
        assert_eq!(q.score, 10);

        let gappy = vec![
            PlannedTask::new(1, Interval::new(540, 570)),
            PlannedTask::new(3, Interval::new(620, 650)),
        ];
        let q = ScheduleQuality::calculate(&input, &gappy);
        assert_eq!(q.main_zone_gap_minutes, 50);
        assert_eq!(q.space_switches, 0);
        assert_eq!(q.score, 500);
    }

    #[test]
    fn test_no_main_zone() {
        let input = EngineInput::new(TimeWindow::new("09:00", "14:00"))
            .with_task(Task::new(1).with_zone(1))
            .with_task(Task::new(2).with_zone(1));
        let planned = vec![
            PlannedTask::new(1, Interval::new(540, 570)),
            PlannedTask::new(2, Interval::new(700, 730)),
        ];
        assert_eq!(ScheduleQuality::calculate(&input, &planned), ScheduleQuality::default());
    }
}
