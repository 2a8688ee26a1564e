//! Shooting-day domain models.
//!
//! Provides the data types for one engine invocation: the normalized
//! input, the schedule it produces, and the diagnostics around it.
//!
//! # Domain Mappings
//!
//! | showday-engine | Production floor |
//! |----------------|------------------|
//! | Task | Shot / segment of a contestant's day |
//! | Manual block | Rehearsal, press, anything pinned by hand |
//! | Zone / Space | Set / corner of the set |
//! | ResourceItem | Camera, coach, presenter, prop |
//! | Itinerant team | Roaming crew with travel buffers |

mod input;
mod lock;
mod output;
mod resource;
mod task;
mod time;

pub use input::{
    EngineInput, SoftWeights, DEFAULT_MEAL_MAX_SIMULTANEOUS, DEFAULT_MEAL_MINUTES, MAX_SOFT_WEIGHT,
};
pub use lock::{Lock, LockType};
pub use output::{
    codes, top_codes, AttemptSummary, Degradation, Diagnostic, EngineOutput, EngineReport,
    Insight, PlannedTask, QualityRecord, TieBreak, UnplannedTask,
};
pub use resource::{AnyOfRequirement, PlanItemId, ResourceItem, ResourceRequirements};
pub use task::{ItinerantRequirement, Task, TaskId, TaskStatus};
pub use time::{format_hhmm, parse_hhmm, snap_up, Interval, TimeWindow, GRID_MINUTES};
