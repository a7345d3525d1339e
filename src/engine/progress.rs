//! Live progress reporting for a generation run.
//!
//! The planner owns a `ProgressSink` and pushes immutable snapshots through
//! a `watch` channel; any number of readers poll the latest snapshot without
//! ever blocking the planner. Estimated time remaining is a linear
//! extrapolation of elapsed time over the placed/expected ratio.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use ts_rs::TS;

/// Lifecycle state of a generation as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RunState {
    Idle,
    Running,
    Success,
    Error,
}

/// One placed session as displayed in the current-week table.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlacedRow {
    pub course: String,
    pub class_label: String,
    pub subgroup: Option<String>,
    pub teacher: String,
    /// Human-readable `date start-end`.
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Immutable progress value; readers clone the `Arc`, never the planner's
/// working state.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProgressSnapshot {
    pub state: RunState,
    pub percent: f32,
    pub message: String,
    pub detail: String,
    pub eta_seconds: Option<u64>,
    pub current_week_label: Option<String>,
    pub current_week_sessions: Vec<PlacedRow>,
    pub placed: u32,
    pub expected: u32,
    pub finished: bool,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            percent: 0.0,
            message: String::new(),
            detail: String::new(),
            eta_seconds: None,
            current_week_label: None,
            current_week_sessions: Vec::new(),
            placed: 0,
            expected: 0,
            finished: false,
        }
    }
}

/// Read side: cheap to clone, lock-free snapshot access.
#[derive(Debug, Clone)]
pub struct ProgressReader {
    rx: watch::Receiver<Arc<ProgressSnapshot>>,
}

impl ProgressReader {
    pub fn snapshot(&self) -> Arc<ProgressSnapshot> {
        self.rx.borrow().clone()
    }
}

/// Write side, owned by the running job.
#[derive(Debug)]
pub struct ProgressSink {
    tx: watch::Sender<Arc<ProgressSnapshot>>,
    started: Instant,
    expected: u32,
    placed: u32,
    week_label: Option<String>,
    week_rows: Vec<PlacedRow>,
}

impl ProgressSink {
    pub fn new() -> (Self, ProgressReader) {
        let (tx, rx) = watch::channel(Arc::new(ProgressSnapshot::default()));
        (
            Self {
                tx,
                started: Instant::now(),
                expected: 0,
                placed: 0,
                week_label: None,
                week_rows: Vec::new(),
            },
            ProgressReader { rx },
        )
    }

    /// Marks the run started with the total expected session count.
    pub fn begin(&mut self, expected: u32) {
        self.started = Instant::now();
        self.expected = expected;
        self.placed = 0;
        self.publish(RunState::Running, "generation started".to_owned(), String::new(), false);
    }

    pub fn week_started(&mut self, label: String) {
        self.week_label = Some(label.clone());
        self.week_rows.clear();
        self.publish(
            RunState::Running,
            format!("planning week {label}"),
            String::new(),
            false,
        );
    }

    pub fn session_placed(&mut self, row: PlacedRow) {
        self.placed += 1;
        self.week_rows.push(row);
        let message = format!("{}/{} sessions placed", self.placed, self.expected);
        self.publish(RunState::Running, message, String::new(), false);
    }

    pub fn finish_success(&mut self, message: String, detail: String) {
        self.publish(RunState::Success, message, detail, true);
    }

    pub fn finish_error(&mut self, message: String) {
        self.publish(RunState::Error, message, String::new(), true);
    }

    fn eta_seconds(&self) -> Option<u64> {
        if self.placed == 0 || self.expected == 0 || self.placed >= self.expected {
            return None;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let per_session = elapsed / f64::from(self.placed);
        Some((per_session * f64::from(self.expected - self.placed)).round() as u64)
    }

    fn publish(&self, state: RunState, message: String, detail: String, finished: bool) {
        let percent = if self.expected == 0 {
            if finished { 100.0 } else { 0.0 }
        } else {
            (self.placed as f32 / self.expected as f32 * 100.0).min(100.0)
        };
        let snapshot = ProgressSnapshot {
            state,
            percent,
            message,
            detail,
            eta_seconds: if finished { None } else { self.eta_seconds() },
            current_week_label: self.week_label.clone(),
            current_week_sessions: self.week_rows.clone(),
            placed: self.placed,
            expected: self.expected,
            finished,
        };
        // Receivers may all be gone (job abandoned); that is fine.
        let _ = self.tx.send(Arc::new(snapshot));
    }
}
