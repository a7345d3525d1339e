//! Error types for the generation engine.

/// Conditions that abort a generation before or during planning.
///
/// Per-request placement failures are values carried in the plan outcome,
/// not errors; only these conditions stop the run itself.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("inconsistent planning data: {0}")]
    DataInconsistency(String),
    #[error("planning window contains no working days")]
    WindowEmpty,
    #[error("generation cancelled")]
    Cancelled,
}
