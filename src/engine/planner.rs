//! Week-by-week planning orchestration.
//!
//! Each week the planner draws one request per pending series of every
//! active course (more under a week quota), orders the wave by
//! (type priority, course priority, course name), and hands each request to
//! the placement engine, falling back to relocation for tutorials and labs.
//! Unplaced requests carry over to the next week; whatever is still pending
//! after the last week is reported as a failure with the most specific
//! rejection observed.
//!
//! Placement order is fully deterministic, so identical inputs produce an
//! identical session set.

use crate::calendar;
use crate::domain::{
    ClassGroupId, CourseId, DateRange, PlanningSnapshot, SessionKind, TeacherId,
};
use crate::engine::availability::{AvailabilityIndex, PlacedSession};
use crate::engine::constraints::Rejection;
use crate::engine::errors::GenerationError;
use crate::engine::placement::{self, WeekState};
use crate::engine::progress::{PlacedRow, ProgressSink};
use crate::engine::relocation;
use crate::engine::requests::{self, SeriesKey, SessionRequest};
use crate::domain::snapshot::WeekRule;
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Knobs the job runner sets per generation.
#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    /// Soft wall-clock ceiling: once exceeded the planner stops after the
    /// current week and reports the rest as failures.
    pub soft_deadline: Option<Duration>,
}

/// A series that could not be fully placed.
#[derive(Debug, Clone)]
pub struct PlacementFailure {
    pub course: CourseId,
    pub course_name: String,
    pub class_group: ClassGroupId,
    pub class_name: String,
    pub subgroup: Option<String>,
    pub kind: SessionKind,
    /// Occurrences still missing at the end of the window.
    pub remaining: u32,
    pub reason: Option<Rejection>,
}

impl PlacementFailure {
    pub fn describe(&self) -> String {
        let series = match &self.subgroup {
            Some(label) => format!("{} / {} ({label})", self.course_name, self.class_name),
            None => format!("{} / {}", self.course_name, self.class_name),
        };
        let reason = self
            .reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "no candidate slot".to_owned());
        format!(
            "{series}: {} {} session(s) unplaced: {reason}",
            self.remaining,
            self.kind.as_str(),
        )
    }
}

/// Everything a finished (or partially finished) run produced.
#[derive(Debug)]
pub struct PlanOutcome {
    /// Sessions placed by this run, in allocation order.
    pub sessions: Vec<PlacedSession>,
    pub failures: Vec<PlacementFailure>,
    pub weeks_processed: usize,
    pub timed_out: bool,
    /// Notes for the schedule log: teacher switches, relocations, timeout.
    pub messages: Vec<String>,
}

pub struct WeeklyPlanner<'a> {
    snapshot: &'a PlanningSnapshot,
    scope: Vec<CourseId>,
    window: DateRange,
    index: AvailabilityIndex,
    queues: IndexMap<SeriesKey, VecDeque<SessionRequest>>,
    last_teacher: HashMap<SeriesKey, TeacherId>,
    config: PlannerConfig,
    cancel: CancellationToken,
    messages: Vec<String>,
}

impl<'a> WeeklyPlanner<'a> {
    /// Validates the snapshot for the requested scope and prepares request
    /// queues. Fails fast on inconsistent data before any placement.
    pub fn new(
        snapshot: &'a PlanningSnapshot,
        mut scope: Vec<CourseId>,
        config: PlannerConfig,
        cancel: CancellationToken,
    ) -> Result<Self, GenerationError> {
        scope.sort();
        scope.dedup();
        if scope.is_empty() {
            return Err(GenerationError::DataInconsistency(
                "generation scope is empty".to_owned(),
            ));
        }
        let issues = snapshot.validate(&scope);
        if !issues.is_empty() {
            return Err(GenerationError::DataInconsistency(issues.join("; ")));
        }
        let window = snapshot
            .planning_window(&scope)
            .ok_or_else(|| GenerationError::DataInconsistency("no courses in scope".to_owned()))?;

        let index = AvailabilityIndex::build(snapshot, &window);

        let mut queues: IndexMap<SeriesKey, VecDeque<SessionRequest>> = IndexMap::new();
        let mut last_teacher = HashMap::new();
        for course_id in &scope {
            let course = &snapshot.courses[course_id];
            for request in requests::build_requests(snapshot, course) {
                queues
                    .entry(request.series.clone())
                    .or_default()
                    .push_back(request);
            }
        }
        for series in queues.keys() {
            if let Some(previous) = snapshot.latest_existing(
                series.course,
                series.class_group,
                series.subgroup.as_deref(),
            ) {
                last_teacher.insert(series.clone(), previous.teacher);
            }
        }

        Ok(Self {
            snapshot,
            scope,
            window,
            index,
            queues,
            last_teacher,
            config,
            cancel,
            messages: Vec::new(),
        })
    }

    /// Total outstanding session occurrences.
    pub fn expected_sessions(&self) -> u32 {
        self.queues.values().map(|q| q.len() as u32).sum()
    }

    /// Runs the full planning loop.
    ///
    /// Cancellation is honored between weeks and between requests; the soft
    /// deadline is checked at week boundaries only, so a started week always
    /// finishes.
    pub async fn run(mut self, progress: &mut ProgressSink) -> Result<PlanOutcome, GenerationError> {
        let weeks = calendar::weeks_in(&self.window, &self.snapshot.closings);
        if weeks.is_empty() {
            return Err(GenerationError::WindowEmpty);
        }

        progress.begin(self.expected_sessions());
        info!(
            courses = self.scope.len(),
            weeks = weeks.len(),
            expected = self.expected_sessions(),
            window_start = %self.window.start,
            window_end = %self.window.end,
            "planning started"
        );

        let started = Instant::now();
        let mut weeks_processed = 0usize;
        let mut timed_out = false;

        for week_start in weeks {
            if self.cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            if let Some(ceiling) = self.config.soft_deadline
                && started.elapsed() >= ceiling
            {
                warn!(
                    elapsed = ?started.elapsed(),
                    "soft time ceiling reached, stopping before next week"
                );
                self.messages
                    .push("time ceiling reached before the planning window ended".to_owned());
                timed_out = true;
                break;
            }
            if self.queues.values().all(VecDeque::is_empty) {
                break;
            }

            let days =
                calendar::working_days(week_start, &self.window, &self.snapshot.closings);
            if days.is_empty() {
                continue;
            }
            let label = calendar::week_label(week_start);
            progress.week_started(label.clone());

            let mut week = WeekState::new(week_start, days);
            let wave = self.draw_wave(&week);
            debug!(week = %label, requests = wave.len(), "processing week");

            for mut request in wave {
                if self.cancel.is_cancelled() {
                    return Err(GenerationError::Cancelled);
                }
                self.attempt(&mut request, &mut week, progress);
                tokio::task::yield_now().await;
            }
            weeks_processed += 1;
        }

        let failures = self.collect_failures();
        let sessions: Vec<PlacedSession> = self.index.run_sessions().cloned().collect();
        info!(
            placed = sessions.len(),
            failed_series = failures.len(),
            weeks = weeks_processed,
            timed_out,
            "planning finished"
        );

        Ok(PlanOutcome {
            sessions,
            failures,
            weeks_processed,
            timed_out,
            messages: self.messages,
        })
    }

    /// Draws this week's requests and orders them by the composite
    /// (type priority, course priority, course name) key.
    fn draw_wave(&mut self, week: &WeekState) -> Vec<SessionRequest> {
        let mut course_order: Vec<CourseId> = Vec::new();
        for key in self.queues.keys() {
            if !course_order.contains(&key.course) {
                course_order.push(key.course);
            }
        }

        let mut wave: Vec<SessionRequest> = Vec::new();
        for course_id in course_order {
            let course = &self.snapshot.courses[&course_id];
            let rule = self.snapshot.week_rule(course_id, week.week_start);
            if rule == WeekRule::NotAllowed {
                continue;
            }
            if !week.days.iter().any(|d| course.window.contains(*d)) {
                continue;
            }
            let series: Vec<SeriesKey> = self
                .queues
                .iter()
                .filter(|(key, queue)| key.course == course_id && !queue.is_empty())
                .map(|(key, _)| key.clone())
                .collect();
            if series.is_empty() {
                continue;
            }

            // One request per series by default; a numeric week quota lets
            // the course draw further occurrences round-robin up to the cap.
            let cap = match rule {
                WeekRule::Allowed(Some(quota)) => quota as usize,
                _ => series.len(),
            };
            let mut drawn = 0usize;
            let mut rounds = match rule {
                WeekRule::Allowed(Some(_)) => usize::MAX,
                _ => 1,
            };
            while drawn < cap && rounds > 0 {
                let mut popped_any = false;
                for key in &series {
                    if drawn >= cap {
                        break;
                    }
                    if let Some(request) = self.queues.get_mut(key).and_then(VecDeque::pop_front)
                    {
                        wave.push(request);
                        drawn += 1;
                        popped_any = true;
                    }
                }
                if !popped_any {
                    break;
                }
                rounds -= 1;
            }
        }

        wave.sort_by(|a, b| {
            let ca = &self.snapshot.courses[&a.series.course];
            let cb = &self.snapshot.courses[&b.series.course];
            (a.kind(), ca.priority, &ca.name)
                .cmp(&(b.kind(), cb.priority, &cb.name))
        });
        wave
    }

    /// One placement attempt for a drawn request, with relocation fallback
    /// for tutorials and labs. Failed requests return to the front of their
    /// series queue for the next week.
    fn attempt(
        &mut self,
        request: &mut SessionRequest,
        week: &mut WeekState,
        progress: &mut ProgressSink,
    ) {
        request.attempts += 1;
        let previous = self.last_teacher.get(&request.series).copied();

        let placed = match placement::place(request, self.snapshot, &mut self.index, week, previous)
        {
            Ok(id) => {
                week.record_placed(request.series.course);
                Some(id)
            }
            Err(direct_reason) => {
                let relocated = relocation::try_relocate(
                    request,
                    self.snapshot,
                    &mut self.index,
                    week,
                    previous,
                );
                if relocated.is_some() {
                    self.messages.push(format!(
                        "freed a slot for {} by relocating a session",
                        self.series_label(&request.series)
                    ));
                } else if let Some(reason) = direct_reason {
                    request.last_rejection = Some(reason);
                }
                relocated
            }
        };

        match placed {
            Some(id) => {
                let session = self.index.get(id).expect("freshly placed session").clone();
                if let Some(previous) = previous
                    && previous != session.teacher
                {
                    info!(
                        series = %self.series_label(&request.series),
                        from = %self.teacher_label(previous),
                        to = %self.teacher_label(session.teacher),
                        "teacher continuity fallback"
                    );
                    self.messages.push(format!(
                        "{}: teacher changed from {} to {}",
                        self.series_label(&request.series),
                        self.teacher_label(previous),
                        self.teacher_label(session.teacher),
                    ));
                }
                self.last_teacher
                    .insert(request.series.clone(), session.teacher);
                progress.session_placed(self.placed_row(&session));
            }
            None => {
                request.carried_weeks += 1;
                debug!(
                    series = %self.series_label(&request.series),
                    carried_weeks = request.carried_weeks,
                    reason = ?request.last_rejection,
                    "request carried to next week"
                );
                if let Some(queue) = self.queues.get_mut(&request.series) {
                    queue.push_front(request.clone());
                }
            }
        }
    }

    fn collect_failures(&self) -> Vec<PlacementFailure> {
        self.queues
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(series, queue)| {
                let course = &self.snapshot.courses[&series.course];
                let class_name = self
                    .snapshot
                    .class_groups
                    .get(&series.class_group)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| series.class_group.to_string());
                PlacementFailure {
                    course: series.course,
                    course_name: course.name.clone(),
                    class_group: series.class_group,
                    class_name,
                    subgroup: series.subgroup.clone(),
                    kind: course.kind,
                    remaining: queue.len() as u32,
                    reason: queue.front().and_then(|r| r.last_rejection),
                }
            })
            .collect()
    }

    fn series_label(&self, series: &SeriesKey) -> String {
        let course = self
            .snapshot
            .courses
            .get(&series.course)
            .map(|c| c.name.as_str())
            .unwrap_or("?");
        let class = self
            .snapshot
            .class_groups
            .get(&series.class_group)
            .map(|c| c.name.as_str())
            .unwrap_or("?");
        match &series.subgroup {
            Some(label) => format!("{course} / {class} ({label})"),
            None => format!("{course} / {class}"),
        }
    }

    fn teacher_label(&self, teacher: TeacherId) -> String {
        self.snapshot
            .teachers
            .get(&teacher)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| teacher.to_string())
    }

    fn placed_row(&self, session: &PlacedSession) -> PlacedRow {
        let class_label = self
            .snapshot
            .class_groups
            .get(&session.class_group)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| session.class_group.to_string());
        let course = self
            .snapshot
            .courses
            .get(&session.course)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| session.course.to_string());
        PlacedRow {
            course,
            class_label,
            subgroup: session.subgroup.clone(),
            teacher: self.teacher_label(session.teacher),
            time: format!(
                "{} {}-{}",
                session.date,
                session.start.format("%H:%M"),
                session.end.format("%H:%M")
            ),
            kind: session.kind.as_str().to_owned(),
        }
    }
}
