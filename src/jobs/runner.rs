//! Background worker executing generation jobs.
//!
//! Jobs flow through a single bounded queue into one worker task, so two
//! generations can never plan over the same data concurrently. The worker
//! loads a snapshot, runs the planner, commits the placed sessions in one
//! transaction, writes schedule logs, and records the terminal state.

use crate::data::{loader, schedule_log, sessions, DbContext};
use crate::domain::CourseId;
use crate::engine::planner::{PlannerConfig, WeeklyPlanner};
use crate::engine::{GenerationError, ProgressSink};
use crate::jobs::registry::{JobRegistry, JobResult, JobState};
use crate::utils::fmt_duration;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use ts_rs::TS;

/// How many submitted jobs may wait behind the running one.
const QUEUE_CAPACITY: usize = 64;

/// What to generate: one course, or every course in the catalog.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GenerationRequest {
    pub course_id: Option<i64>,
    #[serde(default)]
    pub all: bool,
}

struct QueuedJob {
    id: String,
    request: GenerationRequest,
    sink: ProgressSink,
    cancel: CancellationToken,
}

/// Submission handle shared with the web layer.
#[derive(Clone)]
pub struct JobService {
    registry: JobRegistry,
    queue: mpsc::Sender<QueuedJob>,
}

impl JobService {
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Registers and enqueues a generation job, returning its id.
    pub fn submit(&self, request: GenerationRequest, label: String) -> anyhow::Result<String> {
        let id = JobRegistry::new_job_id();
        let (sink, reader) = ProgressSink::new();
        let cancel = CancellationToken::new();
        self.registry
            .register(id.clone(), label, reader, cancel.clone());

        let job = QueuedJob {
            id: id.clone(),
            request,
            sink,
            cancel,
        };
        if self.queue.try_send(job).is_err() {
            self.registry.fail(
                &id,
                JobState::Failed,
                "generation queue is full".to_owned(),
            );
            anyhow::bail!("generation queue is full");
        }
        info!(job_id = %id, "generation job queued");
        Ok(id)
    }
}

/// The single background worker draining the job queue.
pub struct GenerationWorker {
    db: DbContext,
    registry: JobRegistry,
    rx: mpsc::Receiver<QueuedJob>,
    soft_deadline: Option<Duration>,
}

impl GenerationWorker {
    /// Builds the worker and its paired submission service.
    pub fn new(
        db: DbContext,
        registry: JobRegistry,
        soft_deadline: Option<Duration>,
    ) -> (Self, JobService) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (
            Self {
                db,
                registry: registry.clone(),
                rx,
                soft_deadline,
            },
            JobService {
                registry,
                queue: tx,
            },
        )
    }

    /// Drains the queue until shutdown. Queued jobs left behind at shutdown
    /// stay `Queued`; they are lost with the process, never half-run.
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("generation worker started");
        loop {
            let job = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("generation worker received shutdown signal, exiting gracefully");
                    break;
                }
                job = self.rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.execute(job).await;
        }
    }

    async fn execute(&self, job: QueuedJob) {
        let QueuedJob {
            id,
            request,
            mut sink,
            cancel,
        } = job;

        self.registry.set_state(&id, JobState::Running);
        info!(job_id = %id, ?request, "generation job started");
        let start = Instant::now();

        match self.run_generation(&request, &mut sink, cancel).await {
            Ok(result) => {
                let placed = result.sessions.len();
                let message = format!("{placed} sessions placed");
                let detail = if result.failures.is_empty() {
                    String::new()
                } else {
                    format!("unplaced: {}", result.failures.join("; "))
                };
                info!(
                    job_id = %id,
                    placed,
                    failed_series = result.failures.len(),
                    duration = fmt_duration(start.elapsed()),
                    "generation job finished"
                );
                sink.finish_success(message, detail);
                self.registry.complete(&id, JobState::Success, result);
            }
            Err(e) => {
                let state = match e.downcast_ref::<GenerationError>() {
                    Some(GenerationError::Cancelled) => JobState::Cancelled,
                    _ => JobState::Failed,
                };
                let message = format!("{e:#}");
                if state == JobState::Cancelled {
                    warn!(job_id = %id, duration = fmt_duration(start.elapsed()), "generation job cancelled");
                } else {
                    error!(job_id = %id, error = %message, "generation job failed");
                }
                sink.finish_error(message.clone());
                self.registry.fail(&id, state, message);
            }
        }
    }

    async fn run_generation(
        &self,
        request: &GenerationRequest,
        sink: &mut ProgressSink,
        cancel: CancellationToken,
    ) -> anyhow::Result<JobResult> {
        use anyhow::Context;

        let pool = self.db.pool();
        let snapshot = loader::load_planning_snapshot(pool)
            .await
            .context("failed to load planning snapshot")?;

        let scope: Vec<CourseId> = match (request.course_id, request.all) {
            (Some(id), _) => vec![CourseId(id)],
            (None, true) => snapshot.courses.keys().copied().collect(),
            (None, false) => {
                anyhow::bail!("generation request names no course and does not set `all`")
            }
        };

        let config = PlannerConfig {
            soft_deadline: self.soft_deadline,
        };
        let planner = WeeklyPlanner::new(&snapshot, scope.clone(), config, cancel)?;
        let outcome = planner.run(sink).await?;

        let persisted = sessions::persist_placed(pool, &outcome.sessions)
            .await
            .context("failed to commit placed sessions")?;

        // Schedule logs are best-effort; a log failure must not undo the run.
        for course_id in &scope {
            let Some(course) = snapshot.courses.get(course_id) else {
                continue;
            };
            let placed = persisted
                .iter()
                .filter(|s| s.course == *course_id)
                .count();
            let missing: u32 = outcome
                .failures
                .iter()
                .filter(|f| f.course == *course_id)
                .map(|f| f.remaining)
                .sum();
            let status = if missing == 0 { "success" } else { "partial" };
            let summary = if missing == 0 {
                format!("{placed} sessions placed")
            } else {
                format!("{placed} sessions placed, {missing} missing")
            };
            if let Err(e) = schedule_log::append(
                pool,
                course_id.0,
                status,
                &summary,
                &outcome.messages,
                course.window.start,
                course.window.end,
            )
            .await
            {
                warn!(course = %course_id, error = ?e, "failed to append schedule log");
            }
        }

        Ok(JobResult {
            sessions: persisted,
            failures: outcome
                .failures
                .iter()
                .map(|f| f.describe())
                .collect(),
        })
    }
}
