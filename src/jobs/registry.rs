//! In-memory registry of generation jobs.
//!
//! The web layer reads job views out of the registry; the worker moves jobs
//! through their lifecycle. Progress itself flows through the engine's
//! watch channel, so the registry only tracks identity, state, and the
//! terminal result.

use crate::domain::Session;
use crate::engine::{ProgressReader, ProgressSnapshot};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use ts_rs::TS;
use ulid::Ulid;

/// Job lifecycle: `Queued → Running → (Success | Failed | Cancelled)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum JobState {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Success | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Terminal output of a successful (possibly partial) generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub sessions: Vec<Session>,
    /// Human-readable descriptions of series left unplaced.
    pub failures: Vec<String>,
}

struct JobEntry {
    label: String,
    state: JobState,
    progress: ProgressReader,
    cancel: CancellationToken,
    result: Option<Arc<JobResult>>,
    error: Option<String>,
    submitted_at: DateTime<Utc>,
}

/// Cloned-out view of a job, safe to hold across await points.
#[derive(Clone)]
pub struct JobView {
    pub id: String,
    pub label: String,
    pub state: JobState,
    pub progress: Arc<ProgressSnapshot>,
    pub result: Option<Arc<JobResult>>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Thread-safe job table shared between web handlers and the worker.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<DashMap<String, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_job_id() -> String {
        Ulid::new().to_string()
    }

    pub fn register(
        &self,
        id: String,
        label: String,
        progress: ProgressReader,
        cancel: CancellationToken,
    ) {
        self.inner.insert(
            id,
            JobEntry {
                label,
                state: JobState::Queued,
                progress,
                cancel,
                result: None,
                error: None,
                submitted_at: Utc::now(),
            },
        );
    }

    pub fn set_state(&self, id: &str, state: JobState) {
        if let Some(mut entry) = self.inner.get_mut(id) {
            entry.state = state;
        }
    }

    pub fn complete(&self, id: &str, state: JobState, result: JobResult) {
        if let Some(mut entry) = self.inner.get_mut(id) {
            entry.state = state;
            entry.result = Some(Arc::new(result));
        }
    }

    pub fn fail(&self, id: &str, state: JobState, error: String) {
        if let Some(mut entry) = self.inner.get_mut(id) {
            entry.state = state;
            entry.error = Some(error);
        }
    }

    /// Requests cancellation; the planner observes the token between weeks
    /// and between requests. Returns false for unknown or finished jobs.
    pub fn request_cancel(&self, id: &str) -> bool {
        match self.inner.get(id) {
            Some(entry) if !entry.state.is_terminal() => {
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn view(&self, id: &str) -> Option<JobView> {
        self.inner.get(id).map(|entry| JobView {
            id: id.to_owned(),
            label: entry.label.clone(),
            state: entry.state,
            progress: entry.progress.snapshot(),
            result: entry.result.clone(),
            error: entry.error.clone(),
            submitted_at: entry.submitted_at,
        })
    }

    /// All jobs, most recently submitted first.
    pub fn list(&self) -> Vec<JobView> {
        let mut views: Vec<JobView> = self
            .inner
            .iter()
            .map(|entry| JobView {
                id: entry.key().clone(),
                label: entry.label.clone(),
                state: entry.state,
                progress: entry.progress.snapshot(),
                result: entry.result.clone(),
                error: entry.error.clone(),
                submitted_at: entry.submitted_at,
            })
            .collect();
        views.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ProgressSink;

    fn registered() -> (JobRegistry, String) {
        let registry = JobRegistry::new();
        let id = JobRegistry::new_job_id();
        let (_sink, reader) = ProgressSink::new();
        registry.register(
            id.clone(),
            "test".to_owned(),
            reader,
            CancellationToken::new(),
        );
        (registry, id)
    }

    #[test]
    fn lifecycle_moves_through_states() {
        let (registry, id) = registered();
        assert_eq!(registry.view(&id).unwrap().state, JobState::Queued);

        registry.set_state(&id, JobState::Running);
        assert_eq!(registry.view(&id).unwrap().state, JobState::Running);

        registry.complete(
            &id,
            JobState::Success,
            JobResult {
                sessions: vec![],
                failures: vec![],
            },
        );
        let view = registry.view(&id).unwrap();
        assert_eq!(view.state, JobState::Success);
        assert!(view.result.is_some());
    }

    #[test]
    fn cancel_only_applies_to_live_jobs() {
        let (registry, id) = registered();
        assert!(registry.request_cancel(&id));

        registry.fail(&id, JobState::Failed, "boom".to_owned());
        assert!(!registry.request_cancel(&id));
        assert!(!registry.request_cancel("missing"));
    }
}
