//! Candidate search for a single session request.
//!
//! Enumeration order is fixed: days of the week earliest first, slots in
//! calendar order, teachers by continuity priority, rooms tightest-fit
//! first. The first candidate the constraint evaluator accepts wins, which
//! is what makes a whole generation run reproducible.

use crate::calendar;
use crate::domain::snapshot::WeekRule;
use crate::domain::{CourseId, PlanningSnapshot, TeacherId};
use crate::engine::availability::{AvailabilityIndex, PlacedSession};
use crate::engine::constraints::{self, Candidate, EvalContext, Rejection, RejectionTracker};
use crate::engine::requests::{RequestDetail, SessionRequest};
use crate::domain::SessionId;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Mutable per-week placement state shared by the planner, the placement
/// engine, and relocation trials.
#[derive(Debug, Clone)]
pub struct WeekState {
    pub week_start: NaiveDate,
    /// Working days of the week, Monday first.
    pub days: Vec<NaiveDate>,
    /// Sessions placed this week per course, checked against week quotas.
    pub placed: BTreeMap<CourseId, u32>,
}

impl WeekState {
    pub fn new(week_start: NaiveDate, days: Vec<NaiveDate>) -> Self {
        Self {
            week_start,
            days,
            placed: BTreeMap::new(),
        }
    }

    pub fn record_placed(&mut self, course: CourseId) {
        *self.placed.entry(course).or_default() += 1;
    }

    pub fn record_removed(&mut self, course: CourseId) {
        if let Some(count) = self.placed.get_mut(&course) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn placed_count(&self, course: CourseId) -> u32 {
        self.placed.get(&course).copied().unwrap_or(0)
    }
}

/// Teacher candidates for a request, in priority order: the teacher of the
/// previous session of the series, then the request's preferred teacher,
/// then every course-linked teacher in declaration order.
fn teacher_candidates(
    request: &SessionRequest,
    snapshot: &PlanningSnapshot,
    previous_teacher: Option<TeacherId>,
) -> Vec<TeacherId> {
    let mut out = Vec::new();
    let mut push = |teacher: Option<TeacherId>| {
        if let Some(id) = teacher
            && !out.contains(&id)
        {
            out.push(id);
        }
    };
    push(previous_teacher);
    push(request.preferred_teacher);
    for id in snapshot.course_teachers(request.series.course) {
        push(Some(id));
    }
    out
}

/// Ordered `(primary, secondary)` teacher assignments to try for a request.
/// Single-teacher types get `secondary = None`; project sessions enumerate
/// ordered pairs of the link's two teachers.
fn teacher_assignments(
    request: &SessionRequest,
    snapshot: &PlanningSnapshot,
    previous_teacher: Option<TeacherId>,
) -> Vec<(TeacherId, Option<TeacherId>)> {
    match &request.detail {
        RequestDetail::Sae {
            teacher_a,
            teacher_b,
        } => {
            let pair = [*teacher_a, *teacher_b];
            teacher_candidates(request, snapshot, previous_teacher)
                .into_iter()
                .filter(|t| pair.contains(t))
                .map(|primary| {
                    let secondary = if primary == *teacher_a {
                        *teacher_b
                    } else {
                        *teacher_a
                    };
                    (primary, Some(secondary))
                })
                .collect()
        }
        _ => teacher_candidates(request, snapshot, previous_teacher)
            .into_iter()
            .map(|t| (t, None))
            .collect(),
    }
}

/// Attempts to place `request` somewhere in the week.
///
/// On success the session is inserted into the index and its id returned.
/// On failure the most specific rejection observed across all candidates is
/// returned (`None` when the week offered no candidate at all).
pub fn place(
    request: &SessionRequest,
    snapshot: &PlanningSnapshot,
    index: &mut AvailabilityIndex,
    week: &WeekState,
    previous_teacher: Option<TeacherId>,
) -> Result<SessionId, Option<Rejection>> {
    let Some(course) = snapshot.courses.get(&request.series.course) else {
        return Err(None);
    };
    let week_rule: WeekRule = snapshot.week_rule(course.id, week.week_start);
    let attending = request.attending();
    let assignments = teacher_assignments(request, snapshot, previous_teacher);
    let slots = calendar::slots(request.duration_hours);
    let mut tracker = RejectionTracker::default();

    for date in &week.days {
        if !course.window.contains(*date) {
            tracker.observe(Rejection::WindowOutOfCoursePeriod);
            continue;
        }
        for slot in &slots {
            for (teacher, second_teacher) in &assignments {
                for room in &snapshot.rooms {
                    let candidate = Candidate {
                        course,
                        class_group: request.series.class_group,
                        attending: &attending,
                        subgroup: request.subgroup(),
                        teacher: *teacher,
                        second_teacher: *second_teacher,
                        room,
                        date: *date,
                        start: slot.start,
                        end: slot.end,
                    };
                    let ctx = EvalContext {
                        snapshot,
                        index,
                        week_start: week.week_start,
                        week_rule,
                        placed_this_week: week.placed_count(course.id),
                    };
                    match constraints::evaluate(&candidate, &ctx) {
                        Ok(()) => {
                            let id = index.allocate_id();
                            index.insert(PlacedSession {
                                id,
                                course: course.id,
                                kind: request.kind(),
                                class_group: request.series.class_group,
                                attending: attending.clone(),
                                subgroup: request.series.subgroup.clone(),
                                teacher: *teacher,
                                second_teacher: *second_teacher,
                                room: room.id,
                                date: *date,
                                start: slot.start,
                                end: slot.end,
                                placed_by_run: true,
                            });
                            return Ok(id);
                        }
                        Err(rejection) => tracker.observe(rejection),
                    }
                }
            }
        }
    }

    Err(tracker.into_reason())
}
