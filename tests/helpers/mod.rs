//! Shared fixtures for generation tests: entity builders, a planner driver,
//! and the universal timetable invariants.
#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use tempo::calendar;
use tempo::domain::{
    ClassGroup, ClassGroupId, Course, CourseClassLink, CourseId, DateRange, PlanningSnapshot,
    Room, RoomId, SessionKind, Teacher, TeacherId, TimeInterval,
};
use tempo::engine::planner::{PlanOutcome, PlannerConfig, WeeklyPlanner};
use tempo::engine::{PlacedSession, ProgressSink};
use tokio_util::sync::CancellationToken;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange::new(start, end).unwrap()
}

fn full_day() -> Vec<TimeInterval> {
    vec![
        TimeInterval::new(hm(8, 0), hm(12, 15)),
        TimeInterval::new(hm(13, 30), hm(17, 45)),
    ]
}

/// Teacher available Monday through Thursday, full working day.
pub fn teacher_mon_thu(id: i64, name: &str) -> Teacher {
    let mut weekly: [Vec<TimeInterval>; 7] = Default::default();
    for day in 0..4 {
        weekly[day] = full_day();
    }
    Teacher {
        id: TeacherId(id),
        name: name.to_owned(),
        weekly,
        ..Default::default()
    }
}

/// Teacher available all five weekdays, full working day.
pub fn teacher_all_week(id: i64, name: &str) -> Teacher {
    let mut weekly: [Vec<TimeInterval>; 7] = Default::default();
    for day in 0..5 {
        weekly[day] = full_day();
    }
    Teacher {
        id: TeacherId(id),
        name: name.to_owned(),
        weekly,
        ..Default::default()
    }
}

/// Teacher available weekday mornings only.
pub fn teacher_mornings(id: i64, name: &str) -> Teacher {
    let mut weekly: [Vec<TimeInterval>; 7] = Default::default();
    for day in 0..5 {
        weekly[day] = vec![TimeInterval::new(hm(8, 0), hm(12, 15))];
    }
    Teacher {
        id: TeacherId(id),
        name: name.to_owned(),
        weekly,
        ..Default::default()
    }
}

pub fn class_group(id: i64, name: &str, size: u32) -> ClassGroup {
    ClassGroup {
        id: ClassGroupId(id),
        name: name.to_owned(),
        size,
        unavailable: vec![],
    }
}

pub fn lab(id: i64, name: &str, capacity: u32, computers: u32) -> Room {
    Room {
        id: RoomId(id),
        name: name.to_owned(),
        capacity,
        computers,
        equipment: Default::default(),
        software: Default::default(),
    }
}

pub fn course(
    id: i64,
    name: &str,
    kind: SessionKind,
    sessions_required: u32,
    window: DateRange,
) -> Course {
    Course {
        id: CourseId(id),
        name: name.to_owned(),
        kind,
        session_hours: 2,
        sessions_required,
        window,
        priority: 0,
        equipment: Default::default(),
        software: Default::default(),
        computers: 0,
    }
}

pub fn link(course: i64, class_group: i64, teacher_a: Option<i64>, teacher_b: Option<i64>) -> CourseClassLink {
    CourseClassLink {
        course: CourseId(course),
        class_group: ClassGroupId(class_group),
        group_count: 1,
        teacher_a: teacher_a.map(TeacherId),
        teacher_b: teacher_b.map(TeacherId),
        subgroup_a: None,
        subgroup_b: None,
    }
}

/// Runs a full generation over the snapshot and unwraps the outcome.
pub async fn run_generation(snapshot: &PlanningSnapshot, scope: Vec<CourseId>) -> PlanOutcome {
    let planner = WeeklyPlanner::new(
        snapshot,
        scope,
        PlannerConfig::default(),
        CancellationToken::new(),
    )
    .expect("snapshot should validate");
    let (mut sink, _reader) = ProgressSink::new();
    planner.run(&mut sink).await.expect("generation should run")
}

fn overlaps(a: &PlacedSession, b: &PlacedSession) -> bool {
    a.date == b.date && a.start < b.end && b.start < a.end
}

/// Universal invariants every generation output must satisfy: no teacher,
/// class-group (modulo subgroup splits), or room double-booking, and every
/// session inside a working window on an open weekday.
pub fn assert_invariants(snapshot: &PlanningSnapshot, sessions: &[PlacedSession]) {
    for session in sessions {
        assert!(
            !matches!(session.date.weekday(), Weekday::Sat | Weekday::Sun),
            "session {} placed on a weekend",
            session.id
        );
        assert!(
            calendar::is_canonical_slot(session.start, session.end),
            "session {} is not on a canonical slot",
            session.id
        );
        assert!(
            !snapshot
                .closings
                .iter()
                .any(|c| c.range.contains(session.date)),
            "session {} placed inside a closing period",
            session.id
        );
    }

    for (i, a) in sessions.iter().enumerate() {
        for b in sessions.iter().skip(i + 1) {
            if !overlaps(a, b) {
                continue;
            }
            assert!(
                !(a.involves_teacher(b.teacher)
                    || b.involves_teacher(a.teacher)
                    || a.second_teacher.is_some_and(|t| b.involves_teacher(t))),
                "teacher double-booked: sessions {} and {}",
                a.id,
                b.id
            );
            assert_ne!(a.room, b.room, "room double-booked: {} and {}", a.id, b.id);
            for class in &a.attending {
                if b.attending.contains(class) {
                    let split = a.subgroup.is_some()
                        && b.subgroup.is_some()
                        && a.subgroup != b.subgroup;
                    assert!(
                        split,
                        "class group {class} double-booked: sessions {} and {}",
                        a.id, b.id
                    );
                }
            }
        }
    }
}
