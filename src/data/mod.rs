//! Database repositories and row models.

mod context;
pub mod loader;
pub mod models;
pub mod schedule_log;
pub mod sessions;

pub use context::DbContext;
