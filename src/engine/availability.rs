//! Precomputed availability lookups for teachers, class groups, and rooms.
//!
//! Built once per generation run from the planning snapshot. Teacher
//! intervals are derived up front for every working day of the window
//! (weekly pattern ∩ global daily window, emptied on unavailability dates);
//! occupancy is tracked per date as sessions are placed, so the three
//! point-queries answer in time proportional to the sessions of one day.
//!
//! Every mutation is reversible: `remove` returns the owned session and
//! `insert` puts it back under its original id, which is what makes the
//! relocation engine's trial moves transactional.

use crate::calendar;
use crate::domain::{
    ClassGroupId, CourseId, DateRange, PlanningSnapshot, RoomId, Session, SessionId, SessionKind,
    TeacherId, TimeInterval,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, HashMap};

/// A session held by the index: either pre-existing (persisted by an earlier
/// run) or placed by the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedSession {
    pub id: SessionId,
    pub course: CourseId,
    pub kind: SessionKind,
    /// Owning class group (the first linked group for lectures).
    pub class_group: ClassGroupId,
    /// Every group attending, owning group included.
    pub attending: Vec<ClassGroupId>,
    pub subgroup: Option<String>,
    pub teacher: TeacherId,
    pub second_teacher: Option<TeacherId>,
    pub room: RoomId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// True for sessions placed by the current run; only these may be
    /// relocated or committed at job end.
    pub placed_by_run: bool,
}

impl PlacedSession {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end)
    }

    pub fn duration_hours(&self) -> u32 {
        ((self.end - self.start).num_minutes() / 60).max(0) as u32
    }

    pub fn involves_teacher(&self, teacher: TeacherId) -> bool {
        self.teacher == teacher || self.second_teacher == Some(teacher)
    }

    fn overlaps(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.date == date && self.start < end && start < self.end
    }
}

#[derive(Debug, Default)]
pub struct AvailabilityIndex {
    /// Available intervals per (teacher, working day); absent key = not available.
    teacher_days: HashMap<(TeacherId, NaiveDate), Vec<TimeInterval>>,
    /// Global unavailability ranges per class group.
    class_unavailable: HashMap<ClassGroupId, Vec<DateRange>>,
    sessions: BTreeMap<SessionId, PlacedSession>,
    by_date: BTreeMap<NaiveDate, Vec<SessionId>>,
    next_id: i64,
}

impl AvailabilityIndex {
    /// Builds the index for one generation run over `window`.
    pub fn build(snapshot: &PlanningSnapshot, window: &DateRange) -> Self {
        let mut teacher_days = HashMap::new();
        for week in calendar::weeks_in(window, &snapshot.closings) {
            for date in calendar::working_days(week, window, &snapshot.closings) {
                for teacher in snapshot.teachers.values() {
                    let intervals = effective_intervals(teacher, date);
                    if !intervals.is_empty() {
                        teacher_days.insert((teacher.id, date), intervals);
                    }
                }
            }
        }

        let class_unavailable = snapshot
            .class_groups
            .values()
            .map(|c| (c.id, c.unavailable.clone()))
            .collect();

        let mut index = Self {
            teacher_days,
            class_unavailable,
            sessions: BTreeMap::new(),
            by_date: BTreeMap::new(),
            next_id: 1,
        };
        for session in &snapshot.existing_sessions {
            index.insert(existing_to_placed(snapshot, session));
        }
        index.next_id = index.sessions.keys().map(|id| id.0).max().unwrap_or(0) + 1;
        index
    }

    /// Allocates the id for a session about to be placed by this run.
    pub fn allocate_id(&mut self) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, session: PlacedSession) {
        self.by_date.entry(session.date).or_default().push(session.id);
        self.sessions.insert(session.id, session);
    }

    pub fn remove(&mut self, id: SessionId) -> Option<PlacedSession> {
        let session = self.sessions.remove(&id)?;
        if let Some(ids) = self.by_date.get_mut(&session.date) {
            ids.retain(|other| *other != id);
        }
        Some(session)
    }

    pub fn get(&self, id: SessionId) -> Option<&PlacedSession> {
        self.sessions.get(&id)
    }

    fn on_date(&self, date: NaiveDate) -> impl Iterator<Item = &PlacedSession> {
        self.by_date
            .get(&date)
            .into_iter()
            .flatten()
            .filter_map(|id| self.sessions.get(id))
    }

    /// True when the teacher's calendar covers `[start, end)` on `date`.
    pub fn teacher_available(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> bool {
        self.teacher_days
            .get(&(teacher, date))
            .is_some_and(|intervals| intervals.iter().any(|i| i.covers(start, end)))
    }

    /// True when the teacher already has an overlapping session.
    pub fn teacher_occupied(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> bool {
        self.on_date(date)
            .any(|s| s.involves_teacher(teacher) && s.overlaps(date, start, end))
    }

    /// Combined availability + occupancy point-query.
    pub fn teacher_free(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> bool {
        self.teacher_available(teacher, date, start, end)
            && !self.teacher_occupied(teacher, date, start, end)
    }

    /// Hours already scheduled for the teacher in the week of `week_start`.
    pub fn teacher_hours_in_week(&self, teacher: TeacherId, week_start: NaiveDate) -> u32 {
        self.sessions
            .values()
            .filter(|s| {
                s.involves_teacher(teacher) && calendar::monday_of(s.date) == week_start
            })
            .map(PlacedSession::duration_hours)
            .sum()
    }

    pub fn class_unavailable_on(&self, class_group: ClassGroupId, date: NaiveDate) -> bool {
        self.class_unavailable
            .get(&class_group)
            .is_some_and(|ranges| ranges.iter().any(|r| r.contains(date)))
    }

    /// True when the class group already attends an overlapping session.
    ///
    /// Two subgroup sessions with *different* labels may share a slot: that
    /// is the split-group case where each half of the class is elsewhere.
    pub fn class_occupied(
        &self,
        class_group: ClassGroupId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        subgroup: Option<&str>,
    ) -> bool {
        self.on_date(date).any(|s| {
            if !s.attending.contains(&class_group) || !s.overlaps(date, start, end) {
                return false;
            }
            match (s.subgroup.as_deref(), subgroup) {
                (Some(placed), Some(candidate)) => placed == candidate,
                _ => true,
            }
        })
    }

    /// Combined class point-query.
    pub fn class_free(
        &self,
        class_group: ClassGroupId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        subgroup: Option<&str>,
    ) -> bool {
        !self.class_unavailable_on(class_group, date)
            && !self.class_occupied(class_group, date, start, end, subgroup)
    }

    /// True when no session occupies the room over `[start, end)`, ignoring
    /// the excluded session ids (used by relocation trials).
    pub fn room_free(
        &self,
        room: RoomId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        excluding: &[SessionId],
    ) -> bool {
        !self.on_date(date).any(|s| {
            s.room == room && s.overlaps(date, start, end) && !excluding.contains(&s.id)
        })
    }

    /// Sessions placed by the current run on any of the given days, in
    /// deterministic (start datetime, id) order.
    pub fn run_sessions_on_days(&self, days: &[NaiveDate]) -> Vec<SessionId> {
        let mut found: Vec<(NaiveDateTime, SessionId)> = days
            .iter()
            .flat_map(|date| self.on_date(*date))
            .filter(|s| s.placed_by_run)
            .map(|s| (s.starts_at(), s.id))
            .collect();
        found.sort();
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// All sessions placed by the current run, in id (allocation) order.
    pub fn run_sessions(&self) -> impl Iterator<Item = &PlacedSession> {
        self.sessions.values().filter(|s| s.placed_by_run)
    }
}

/// Effective availability of a teacher on a date: weekly pattern clipped to
/// the global daily window, empty on unavailability dates.
fn effective_intervals(teacher: &crate::domain::Teacher, date: NaiveDate) -> Vec<TimeInterval> {
    if teacher.is_unavailable_on(date) {
        return Vec::new();
    }
    let base = &teacher.weekly[date.weekday().num_days_from_monday() as usize];
    match (teacher.day_start, teacher.day_end) {
        (None, None) => base.clone(),
        (day_start, day_end) => {
            let bounds = TimeInterval::new(
                day_start.unwrap_or(NaiveTime::MIN),
                day_end.unwrap_or_else(|| calendar::hm(23, 59)),
            );
            base.iter().filter_map(|i| i.clip(&bounds)).collect()
        }
    }
}

/// Lifts a persisted session into the index representation.
fn existing_to_placed(snapshot: &PlanningSnapshot, session: &Session) -> PlacedSession {
    let kind = snapshot
        .courses
        .get(&session.course)
        .map(|c| c.kind)
        .unwrap_or(SessionKind::Td);
    PlacedSession {
        id: session.id,
        course: session.course,
        kind,
        class_group: session.class_group,
        attending: session.attending.clone(),
        subgroup: session.subgroup.clone(),
        teacher: session.teacher,
        second_teacher: session.second_teacher,
        room: session.room,
        date: session.starts_at.date(),
        start: session.starts_at.time(),
        end: session.ends_at.time(),
        placed_by_run: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::hm;
    use crate::domain::{ClassGroup, Teacher};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn weekday_teacher(id: i64) -> Teacher {
        let mut weekly: [Vec<TimeInterval>; 7] = Default::default();
        for day in 0..4 {
            weekly[day] = vec![
                TimeInterval::new(hm(8, 0), hm(12, 15)),
                TimeInterval::new(hm(13, 30), hm(17, 45)),
            ];
        }
        Teacher {
            id: TeacherId(id),
            name: format!("T{id}"),
            weekly,
            ..Default::default()
        }
    }

    fn snapshot_with(teachers: Vec<Teacher>, class_groups: Vec<ClassGroup>) -> PlanningSnapshot {
        PlanningSnapshot::assemble(
            teachers,
            class_groups,
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
        )
    }

    fn window() -> DateRange {
        DateRange::new(d(2025, 10, 13), d(2025, 10, 24)).unwrap()
    }

    fn placed(
        index: &mut AvailabilityIndex,
        teacher: i64,
        class_group: i64,
        room: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> SessionId {
        let id = index.allocate_id();
        index.insert(PlacedSession {
            id,
            course: CourseId(1),
            kind: SessionKind::Td,
            class_group: ClassGroupId(class_group),
            attending: vec![ClassGroupId(class_group)],
            subgroup: None,
            teacher: TeacherId(teacher),
            second_teacher: None,
            room: RoomId(room),
            date,
            start,
            end,
            placed_by_run: true,
        });
        id
    }

    #[test]
    fn teacher_availability_follows_weekly_pattern() {
        let snapshot = snapshot_with(vec![weekday_teacher(1)], vec![]);
        let index = AvailabilityIndex::build(&snapshot, &window());

        // Monday morning is available, Friday is not in the pattern.
        assert!(index.teacher_free(TeacherId(1), d(2025, 10, 13), hm(8, 0), hm(10, 0)));
        assert!(!index.teacher_free(TeacherId(1), d(2025, 10, 17), hm(8, 0), hm(10, 0)));
        // Straddling the lunch gap is never covered.
        assert!(!index.teacher_available(TeacherId(1), d(2025, 10, 13), hm(11, 15), hm(13, 30)));
    }

    #[test]
    fn unavailability_dates_empty_a_teachers_day() {
        let mut teacher = weekday_teacher(1);
        teacher
            .unavailable
            .push(DateRange::new(d(2025, 10, 20), d(2025, 10, 21)).unwrap());
        let snapshot = snapshot_with(vec![teacher], vec![]);
        let index = AvailabilityIndex::build(&snapshot, &window());

        assert!(!index.teacher_available(TeacherId(1), d(2025, 10, 20), hm(8, 0), hm(10, 0)));
        assert!(!index.teacher_available(TeacherId(1), d(2025, 10, 21), hm(8, 0), hm(10, 0)));
        assert!(index.teacher_available(TeacherId(1), d(2025, 10, 22), hm(8, 0), hm(10, 0)));
    }

    #[test]
    fn global_daily_window_clips_weekly_intervals() {
        let mut teacher = weekday_teacher(1);
        teacher.day_start = Some(hm(9, 0));
        teacher.day_end = Some(hm(16, 0));
        let snapshot = snapshot_with(vec![teacher], vec![]);
        let index = AvailabilityIndex::build(&snapshot, &window());

        assert!(!index.teacher_available(TeacherId(1), d(2025, 10, 13), hm(8, 0), hm(10, 0)));
        assert!(index.teacher_available(TeacherId(1), d(2025, 10, 13), hm(9, 0), hm(10, 0)));
        assert!(!index.teacher_available(TeacherId(1), d(2025, 10, 13), hm(15, 45), hm(17, 45)));
    }

    #[test]
    fn occupancy_blocks_teacher_room_and_class() {
        let snapshot = snapshot_with(
            vec![weekday_teacher(1), weekday_teacher(2)],
            vec![ClassGroup {
                id: ClassGroupId(5),
                name: "A2".to_owned(),
                size: 20,
                unavailable: vec![],
            }],
        );
        let mut index = AvailabilityIndex::build(&snapshot, &window());
        let monday = d(2025, 10, 13);
        placed(&mut index, 1, 5, 10, monday, hm(8, 0), hm(10, 0));

        assert!(index.teacher_occupied(TeacherId(1), monday, hm(9, 0), hm(10, 0)));
        assert!(!index.teacher_occupied(TeacherId(2), monday, hm(9, 0), hm(10, 0)));
        assert!(!index.room_free(RoomId(10), monday, hm(8, 0), hm(9, 0), &[]));
        assert!(index.room_free(RoomId(11), monday, hm(8, 0), hm(9, 0), &[]));
        assert!(index.class_occupied(ClassGroupId(5), monday, hm(8, 0), hm(10, 0), None));
        // Adjacent slot is free.
        assert!(index.teacher_free(TeacherId(1), monday, hm(10, 15), hm(12, 15)));
    }

    #[test]
    fn distinct_subgroups_may_share_a_slot() {
        let snapshot = snapshot_with(
            vec![weekday_teacher(1)],
            vec![ClassGroup {
                id: ClassGroupId(5),
                name: "A2".to_owned(),
                size: 20,
                unavailable: vec![],
            }],
        );
        let mut index = AvailabilityIndex::build(&snapshot, &window());
        let monday = d(2025, 10, 13);
        let id = index.allocate_id();
        index.insert(PlacedSession {
            id,
            course: CourseId(1),
            kind: SessionKind::Tp,
            class_group: ClassGroupId(5),
            attending: vec![ClassGroupId(5)],
            subgroup: Some("A".to_owned()),
            teacher: TeacherId(1),
            second_teacher: None,
            room: RoomId(10),
            date: monday,
            start: hm(8, 0),
            end: hm(10, 0),
            placed_by_run: true,
        });

        // The other subgroup fits in parallel; the same one does not, and a
        // whole-class session does not either.
        assert!(!index.class_occupied(ClassGroupId(5), monday, hm(8, 0), hm(10, 0), Some("B")));
        assert!(index.class_occupied(ClassGroupId(5), monday, hm(8, 0), hm(10, 0), Some("A")));
        assert!(index.class_occupied(ClassGroupId(5), monday, hm(8, 0), hm(10, 0), None));
    }

    #[test]
    fn remove_and_reinsert_restore_exact_state() {
        let snapshot = snapshot_with(vec![weekday_teacher(1)], vec![]);
        let mut index = AvailabilityIndex::build(&snapshot, &window());
        let monday = d(2025, 10, 13);
        let id = placed(&mut index, 1, 5, 10, monday, hm(8, 0), hm(10, 0));

        let session = index.remove(id).unwrap();
        assert!(index.room_free(RoomId(10), monday, hm(8, 0), hm(10, 0), &[]));
        index.insert(session);
        assert!(!index.room_free(RoomId(10), monday, hm(8, 0), hm(10, 0), &[]));
        assert_eq!(index.get(id).unwrap().id, id);
    }

    #[test]
    fn weekly_hours_sum_both_teaching_roles() {
        let snapshot = snapshot_with(vec![weekday_teacher(1), weekday_teacher(2)], vec![]);
        let mut index = AvailabilityIndex::build(&snapshot, &window());
        let monday = d(2025, 10, 13);
        placed(&mut index, 1, 5, 10, monday, hm(8, 0), hm(10, 0));
        let id = index.allocate_id();
        index.insert(PlacedSession {
            id,
            course: CourseId(2),
            kind: SessionKind::Sae,
            class_group: ClassGroupId(5),
            attending: vec![ClassGroupId(5)],
            subgroup: None,
            teacher: TeacherId(2),
            second_teacher: Some(TeacherId(1)),
            room: RoomId(11),
            date: monday,
            start: hm(10, 15),
            end: hm(12, 15),
            placed_by_run: true,
        });

        assert_eq!(index.teacher_hours_in_week(TeacherId(1), monday), 4);
        assert_eq!(index.teacher_hours_in_week(TeacherId(2), monday), 2);
        assert_eq!(index.teacher_hours_in_week(TeacherId(1), d(2025, 10, 20)), 0);
    }
}
