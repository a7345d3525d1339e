//! End-to-end generation scenarios over in-memory snapshots.

mod helpers;

use chrono::Datelike;
use helpers::*;
use tempo::domain::{
    AllowedWeek, ClosingPeriod, CourseId, DateRange, PlanningSnapshot, RoomId, SessionKind,
    TeacherId,
};
use tempo::engine::Rejection;

/// One TD course, one class, one teacher, one room: four sessions land on
/// four distinct Mondays at 08:00 with the same teacher and room.
#[tokio::test]
async fn single_tutorial_fills_mondays_first_slot() {
    let window = range(d(2025, 10, 13), d(2025, 11, 21));
    let snapshot = PlanningSnapshot::assemble(
        vec![teacher_mon_thu(1, "T1")],
        vec![class_group(2, "A2", 20)],
        vec![lab(15, "R15", 20, 20)],
        vec![course(1, "C1", SessionKind::Td, 4, window)],
        vec![link(1, 2, Some(1), None)],
        vec![],
        vec![],
        vec![],
    );

    let outcome = run_generation(&snapshot, vec![CourseId(1)]).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.sessions.len(), 4);
    let mut dates = Vec::new();
    for session in &outcome.sessions {
        assert_eq!(session.start, hm(8, 0));
        assert_eq!(session.end, hm(10, 0));
        assert_eq!(session.teacher, TeacherId(1));
        assert_eq!(session.room, RoomId(15));
        assert_eq!(session.date.weekday(), chrono::Weekday::Mon);
        dates.push(session.date);
    }
    dates.sort();
    dates.dedup();
    assert_eq!(dates.len(), 4, "each session on a distinct week");
    assert_invariants(&snapshot, &outcome.sessions);
}

/// TP with a split class: eight sessions, four per subgroup; the two halves
/// of a week share the slot but never the room or the teacher.
#[tokio::test]
async fn split_lab_runs_subgroups_in_parallel() {
    let window = range(d(2025, 10, 13), d(2025, 11, 21));
    let mut split = link(1, 2, Some(1), Some(2));
    split.group_count = 2;
    let snapshot = PlanningSnapshot::assemble(
        vec![teacher_mon_thu(1, "T1"), teacher_mon_thu(2, "T2")],
        vec![class_group(2, "A2", 20)],
        vec![lab(15, "R15", 20, 20), lab(19, "R19", 20, 20)],
        vec![course(1, "C1", SessionKind::Tp, 4, window)],
        vec![split],
        vec![],
        vec![],
        vec![],
    );

    let outcome = run_generation(&snapshot, vec![CourseId(1)]).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.sessions.len(), 8);
    let half_a: Vec<_> = outcome
        .sessions
        .iter()
        .filter(|s| s.subgroup.as_deref() == Some("A"))
        .collect();
    let half_b: Vec<_> = outcome
        .sessions
        .iter()
        .filter(|s| s.subgroup.as_deref() == Some("B"))
        .collect();
    assert_eq!((half_a.len(), half_b.len()), (4, 4));

    for a in &half_a {
        let b = half_b
            .iter()
            .find(|b| tempo::calendar::monday_of(b.date) == tempo::calendar::monday_of(a.date))
            .expect("both subgroups placed every week");
        assert_ne!(a.room, b.room);
        assert_ne!(a.teacher, b.teacher);
    }
    assert_invariants(&snapshot, &outcome.sessions);
}

/// A teacher unavailability range pushes that week's session to the first
/// open day after it.
#[tokio::test]
async fn teacher_unavailability_moves_the_session_within_the_week() {
    let window = range(d(2025, 10, 13), d(2025, 11, 21));
    let mut teacher = teacher_mon_thu(1, "T1");
    teacher
        .unavailable
        .push(range(d(2025, 10, 20), d(2025, 10, 21)));
    let snapshot = PlanningSnapshot::assemble(
        vec![teacher],
        vec![class_group(2, "A2", 20)],
        vec![lab(15, "R15", 20, 20)],
        vec![course(1, "C1", SessionKind::Td, 4, window)],
        vec![link(1, 2, Some(1), None)],
        vec![],
        vec![],
        vec![],
    );

    let outcome = run_generation(&snapshot, vec![CourseId(1)]).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    let mut dates: Vec<_> = outcome.sessions.iter().map(|s| s.date).collect();
    dates.sort();
    assert_eq!(
        dates,
        vec![
            d(2025, 10, 13),
            d(2025, 10, 22), // Monday and Tuesday are blocked that week
            d(2025, 10, 27),
            d(2025, 11, 3),
        ]
    );
    assert_invariants(&snapshot, &outcome.sessions);
}

/// Relocation frees the lab: tutorials sit in the lab all morning, and the
/// lab-bound TP of a mornings-only teacher displaces one of them.
#[tokio::test]
async fn relocation_moves_a_tutorial_for_a_lab_request() {
    // A one-day window: the week offers exactly four slots.
    let week = range(d(2025, 10, 13), d(2025, 10, 13));
    let mut tp = course(2, "C2", SessionKind::Tp, 1, week);
    tp.computers = 20;
    let snapshot = PlanningSnapshot::assemble(
        vec![teacher_all_week(1, "T1"), teacher_mornings(2, "T2")],
        vec![class_group(2, "A2", 20)],
        vec![lab(15, "R15", 20, 20), lab(16, "R16", 20, 0)],
        vec![course(1, "C1", SessionKind::Td, 3, week), tp],
        vec![link(1, 2, Some(1), None), link(2, 2, Some(2), None)],
        vec![],
        // Let the TD course place all three sessions in the single week.
        vec![AllowedWeek {
            course: CourseId(1),
            week_start: d(2025, 10, 13),
            quota: Some(3),
        }],
        vec![],
    );

    let outcome = run_generation(&snapshot, vec![CourseId(1), CourseId(2)]).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.sessions.len(), 4);
    let tp_session = outcome
        .sessions
        .iter()
        .find(|s| s.course == CourseId(2))
        .expect("TP placed");
    assert_eq!(tp_session.room, RoomId(15), "TP needs the computer lab");
    assert!(tp_session.start < hm(12, 0), "TP teacher works mornings only");
    assert!(
        outcome.messages.iter().any(|m| m.contains("relocating")),
        "relocation should be logged: {:?}",
        outcome.messages
    );
    assert_invariants(&snapshot, &outcome.sessions);
}

/// When no existing session can move either, the request carries over and is
/// reported as a failure at the end of the window.
#[tokio::test]
async fn relocation_failure_carries_the_request_and_reports_it() {
    let week = range(d(2025, 10, 13), d(2025, 10, 13));
    let mut tp = course(2, "C2", SessionKind::Tp, 1, week);
    tp.computers = 20;
    let snapshot = PlanningSnapshot::assemble(
        vec![teacher_all_week(1, "T1"), teacher_mornings(2, "T2")],
        vec![class_group(2, "A2", 20)],
        vec![lab(15, "R15", 20, 20), lab(16, "R16", 20, 0)],
        // Four tutorials consume every slot of the only working week.
        vec![course(1, "C1", SessionKind::Td, 4, week), tp],
        vec![link(1, 2, Some(1), None), link(2, 2, Some(2), None)],
        vec![],
        vec![AllowedWeek {
            course: CourseId(1),
            week_start: d(2025, 10, 13),
            quota: Some(4),
        }],
        vec![],
    );

    let outcome = run_generation(&snapshot, vec![CourseId(1), CourseId(2)]).await;

    assert_eq!(outcome.sessions.len(), 4);
    assert!(outcome.sessions.iter().all(|s| s.course == CourseId(1)));
    assert_eq!(outcome.failures.len(), 1);
    let failure = &outcome.failures[0];
    assert_eq!(failure.course, CourseId(2));
    assert_eq!(failure.remaining, 1);
    assert!(failure.reason.is_some());
    assert_invariants(&snapshot, &outcome.sessions);
}

/// A closing period swallows whole weeks; requests flow into the new year.
#[tokio::test]
async fn closing_period_skips_weeks_entirely() {
    let window = range(d(2025, 12, 15), d(2026, 1, 9));
    let closing = ClosingPeriod {
        label: "winter break".to_owned(),
        range: DateRange::new(d(2025, 12, 22), d(2026, 1, 2)).unwrap(),
    };
    let snapshot = PlanningSnapshot::assemble(
        vec![teacher_all_week(1, "T1")],
        vec![class_group(2, "A2", 20)],
        vec![lab(15, "R15", 20, 20)],
        vec![course(1, "C1", SessionKind::Td, 2, window)],
        vec![link(1, 2, Some(1), None)],
        vec![closing],
        vec![],
        vec![],
    );

    let outcome = run_generation(&snapshot, vec![CourseId(1)]).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.sessions.len(), 2);
    let mut dates: Vec<_> = outcome.sessions.iter().map(|s| s.date).collect();
    dates.sort();
    assert_eq!(dates[0], d(2025, 12, 15));
    assert!(
        dates[1] >= d(2026, 1, 5),
        "second session must skip the closed weeks, got {}",
        dates[1]
    );
    assert_invariants(&snapshot, &outcome.sessions);
}

/// Rejection reasons surface on failures: a course whose room requirements
/// no room satisfies reports the resource shortfall, not a generic error.
#[tokio::test]
async fn impossible_resource_requirements_report_a_specific_reason() {
    let window = range(d(2025, 10, 13), d(2025, 10, 17));
    let mut demanding = course(1, "C1", SessionKind::Td, 1, window);
    demanding.computers = 99;
    let snapshot = PlanningSnapshot::assemble(
        vec![teacher_all_week(1, "T1")],
        vec![class_group(2, "A2", 20)],
        vec![lab(15, "R15", 20, 20)],
        vec![demanding],
        vec![link(1, 2, Some(1), None)],
        vec![],
        vec![],
        vec![],
    );

    let outcome = run_generation(&snapshot, vec![CourseId(1)]).await;

    assert!(outcome.sessions.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(
        outcome.failures[0].reason,
        Some(Rejection::ComputersInsufficient)
    );
}

/// Lectures shared by two class groups need a room seating both and block
/// both groups' calendars.
#[tokio::test]
async fn lecture_attends_all_linked_class_groups_jointly() {
    let window = range(d(2025, 10, 13), d(2025, 10, 24));
    let snapshot = PlanningSnapshot::assemble(
        vec![teacher_all_week(1, "T1")],
        vec![class_group(2, "A2", 20), class_group(3, "B2", 24)],
        vec![lab(15, "R15", 20, 0), lab(20, "Amphi", 60, 0)],
        vec![course(1, "C1", SessionKind::Cm, 2, window)],
        vec![link(1, 2, Some(1), None), link(1, 3, Some(1), None)],
        vec![],
        vec![],
        vec![],
    );

    let outcome = run_generation(&snapshot, vec![CourseId(1)]).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.sessions.len(), 2);
    for session in &outcome.sessions {
        assert_eq!(session.room, RoomId(20), "only the amphi seats 44");
        assert_eq!(
            session.attending,
            vec![tempo::domain::ClassGroupId(2), tempo::domain::ClassGroupId(3)]
        );
    }
    assert_invariants(&snapshot, &outcome.sessions);
}

/// Project sessions require both link teachers simultaneously free; the
/// placed session records the second teacher.
#[tokio::test]
async fn project_sessions_book_two_teachers() {
    let window = range(d(2025, 10, 13), d(2025, 10, 24));
    let snapshot = PlanningSnapshot::assemble(
        vec![teacher_all_week(1, "T1"), teacher_mornings(2, "T2")],
        vec![class_group(2, "A2", 20)],
        vec![lab(15, "R15", 20, 20)],
        vec![course(1, "C1", SessionKind::Sae, 2, window)],
        vec![link(1, 2, Some(1), Some(2))],
        vec![],
        vec![],
        vec![],
    );

    let outcome = run_generation(&snapshot, vec![CourseId(1)]).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.sessions.len(), 2);
    for session in &outcome.sessions {
        assert_eq!(session.teacher, TeacherId(1));
        assert_eq!(session.second_teacher, Some(TeacherId(2)));
        // T2 only works mornings, so the pair constrains the slot.
        assert!(session.start < hm(12, 0));
    }
    assert_invariants(&snapshot, &outcome.sessions);
}
