//! Shooting-day scheduling engine.
//!
//! Places the tasks of a TV production day (interviews, challenges,
//! meals, crew moves) into a single work-day window without breaking any
//! hard constraint, then optionally hands the result to an external
//! CP-SAT optimizer for soft-objective polishing.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Task`, `Lock`, `ResourceItem`,
//!   `EngineInput`, `EngineOutput`, `Diagnostic`, clock helpers
//! - **`validation`**: Prevalidation, dependency ordering, candidate checks
//! - **`scheduler`**: `FeasibilitySolver` contract and the greedy solver
//! - **`engine`**: Soft-level ladder, rescue diagnostics, solve pipeline
//! - **`cp`**: External optimizer port and subprocess adapter
//!
//! # Pipeline
//!
//! 1. Prevalidate (fail fast on tasks without duration or location)
//! 2. Try soft levels 9 → 0, stop at the first complete schedule
//! 3. Optimize the warm start within a time budget; re-validate the result
//! 4. If no level completes, estimate overtime and suggest block moves
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Brucker (2007), "Scheduling Algorithms"

pub mod cp;
pub mod engine;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod validation;

pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, EngineResult};
