//! The schedule generation engine.
//!
//! Pure in-memory core: a snapshot of persisted state goes in, a set of
//! placed sessions and per-request failures come out. Persistence and HTTP
//! live elsewhere; the engine only publishes progress through a sink.

pub mod availability;
pub mod constraints;
pub mod errors;
pub mod placement;
pub mod planner;
pub mod progress;
pub mod relocation;
pub mod requests;

pub use availability::{AvailabilityIndex, PlacedSession};
pub use constraints::Rejection;
pub use errors::GenerationError;
pub use planner::{PlacementFailure, PlanOutcome, PlannerConfig, WeeklyPlanner};
pub use progress::{ProgressReader, ProgressSink, ProgressSnapshot, RunState};
