//! Domain model: scheduling entities and the immutable planning snapshot.

pub mod models;
pub mod snapshot;

pub use models::*;
pub use snapshot::PlanningSnapshot;
