//! Stateless validity check for one candidate placement.
//!
//! Checks run in a fixed, documented order so the rejection reason for a
//! given candidate is reproducible: course window, closed dates, working
//! windows, week quota, then teacher / class / room availability, then
//! room resource fit. Cheapest first.

use crate::calendar;
use crate::domain::snapshot::WeekRule;
use crate::domain::{ClassGroupId, Course, PlanningSnapshot, Room, TeacherId};
use crate::engine::availability::AvailabilityIndex;
use chrono::{NaiveDate, NaiveTime};

/// Why a candidate placement is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("teacher already has a session in this slot")]
    TeacherBusy,
    #[error("teacher is not available at this time")]
    TeacherUnavailable,
    #[error("class group already has a session in this slot")]
    ClassBusy,
    #[error("class group is unavailable on this date")]
    ClassUnavailable,
    #[error("room is occupied in this slot")]
    RoomBusy,
    #[error("room capacity is below the attending headcount")]
    CapacityInsufficient,
    #[error("room has too few computers")]
    ComputersInsufficient,
    #[error("room lacks required equipment")]
    EquipmentMissing,
    #[error("room lacks required software")]
    SoftwareMissing,
    #[error("slot is outside the working windows")]
    OutsideWorkingWindow,
    #[error("date falls on a weekend or closing period")]
    DateClosed,
    #[error("weekly session quota for the course is reached")]
    WeekQuotaReached,
    #[error("date is outside the course planning window")]
    WindowOutOfCoursePeriod,
}

impl Rejection {
    /// How telling a rejection is about the real obstacle. Calendar-level
    /// rejections are trivial; a conflict at an otherwise valid slot is the
    /// most specific. Placement failure reporting keeps the highest rank
    /// seen, later candidates winning ties.
    pub fn specificity(&self) -> u8 {
        match self {
            Rejection::WindowOutOfCoursePeriod
            | Rejection::DateClosed
            | Rejection::OutsideWorkingWindow => 0,
            Rejection::WeekQuotaReached => 1,
            Rejection::TeacherUnavailable | Rejection::ClassUnavailable => 2,
            Rejection::CapacityInsufficient
            | Rejection::ComputersInsufficient
            | Rejection::EquipmentMissing
            | Rejection::SoftwareMissing => 3,
            Rejection::TeacherBusy | Rejection::ClassBusy | Rejection::RoomBusy => 4,
        }
    }
}

/// One fully-specified placement to validate.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub course: &'a Course,
    pub class_group: ClassGroupId,
    /// Every attending class group (more than one only for lectures).
    pub attending: &'a [ClassGroupId],
    pub subgroup: Option<&'a str>,
    pub teacher: TeacherId,
    pub second_teacher: Option<TeacherId>,
    pub room: &'a Room,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Read-only state the evaluator consults.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub snapshot: &'a PlanningSnapshot,
    pub index: &'a AvailabilityIndex,
    pub week_start: NaiveDate,
    pub week_rule: WeekRule,
    /// Sessions of the candidate's course already placed this week.
    pub placed_this_week: u32,
}

/// Headcount the room must seat for this candidate.
fn attending_size(candidate: &Candidate, ctx: &EvalContext) -> u32 {
    candidate
        .attending
        .iter()
        .filter_map(|id| ctx.snapshot.class_groups.get(id))
        .map(|group| {
            if candidate.subgroup.is_some() {
                group.subgroup_size()
            } else {
                group.size
            }
        })
        .sum()
}

/// Validates a candidate. `Ok(())` means every hard constraint holds.
pub fn evaluate(candidate: &Candidate, ctx: &EvalContext) -> Result<(), Rejection> {
    let Candidate {
        course,
        date,
        start,
        end,
        ..
    } = *candidate;

    // Calendar checks.
    if !course.window.contains(date) {
        return Err(Rejection::WindowOutOfCoursePeriod);
    }
    if !calendar::is_weekday(date)
        || ctx.snapshot.closings.iter().any(|c| c.range.contains(date))
    {
        return Err(Rejection::DateClosed);
    }
    let slot_minutes = (end - start).num_minutes();
    if slot_minutes != i64::from(course.session_hours) * 60
        || !calendar::is_canonical_slot(start, end)
    {
        return Err(Rejection::OutsideWorkingWindow);
    }

    // Week quota.
    match ctx.week_rule {
        WeekRule::Unrestricted => {}
        WeekRule::NotAllowed => return Err(Rejection::WeekQuotaReached),
        WeekRule::Allowed(Some(quota)) if ctx.placed_this_week >= quota => {
            return Err(Rejection::WeekQuotaReached);
        }
        WeekRule::Allowed(_) => {}
    }

    // Teacher availability, both roles for two-teacher sessions.
    for teacher in std::iter::once(candidate.teacher).chain(candidate.second_teacher) {
        if !ctx.index.teacher_available(teacher, date, start, end) {
            return Err(Rejection::TeacherUnavailable);
        }
        if ctx.index.teacher_occupied(teacher, date, start, end) {
            return Err(Rejection::TeacherBusy);
        }
        if let Some(max_hours) = ctx
            .snapshot
            .teachers
            .get(&teacher)
            .and_then(|t| t.max_weekly_hours)
        {
            let scheduled = ctx.index.teacher_hours_in_week(teacher, ctx.week_start);
            if scheduled + course.session_hours > max_hours {
                return Err(Rejection::TeacherBusy);
            }
        }
    }

    // Class availability, every attending group.
    for class_group in candidate.attending {
        if ctx.index.class_unavailable_on(*class_group, date) {
            return Err(Rejection::ClassUnavailable);
        }
        if ctx
            .index
            .class_occupied(*class_group, date, start, end, candidate.subgroup)
        {
            return Err(Rejection::ClassBusy);
        }
    }

    // Room occupancy, then resource fit.
    if !ctx.index.room_free(candidate.room.id, date, start, end, &[]) {
        return Err(Rejection::RoomBusy);
    }
    if candidate.room.capacity < attending_size(candidate, ctx) {
        return Err(Rejection::CapacityInsufficient);
    }
    if candidate.room.computers < course.computers {
        return Err(Rejection::ComputersInsufficient);
    }
    if !course.equipment.is_subset(&candidate.room.equipment) {
        return Err(Rejection::EquipmentMissing);
    }
    if !course.software.is_subset(&candidate.room.software) {
        return Err(Rejection::SoftwareMissing);
    }

    Ok(())
}

/// Keeps the most specific rejection seen while a request's candidates are
/// enumerated; later rejections win ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectionTracker {
    best: Option<Rejection>,
}

impl RejectionTracker {
    pub fn observe(&mut self, rejection: Rejection) {
        let keep = match self.best {
            None => true,
            Some(current) => rejection.specificity() >= current.specificity(),
        };
        if keep {
            self.best = Some(rejection);
        }
    }

    pub fn into_reason(self) -> Option<Rejection> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::hm;
    use crate::domain::{
        ClassGroup, CourseId, DateRange, Room, RoomId, SessionKind, Teacher, TimeInterval,
    };

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn full_week_teacher(id: i64) -> Teacher {
        let mut weekly: [Vec<TimeInterval>; 7] = Default::default();
        for day in 0..5 {
            weekly[day] = vec![
                TimeInterval::new(hm(8, 0), hm(12, 15)),
                TimeInterval::new(hm(13, 30), hm(17, 45)),
            ];
        }
        Teacher {
            id: crate::domain::TeacherId(id),
            name: format!("T{id}"),
            weekly,
            ..Default::default()
        }
    }

    fn lab(id: i64) -> Room {
        Room {
            id: RoomId(id),
            name: format!("R{id}"),
            capacity: 20,
            computers: 20,
            equipment: Default::default(),
            software: Default::default(),
        }
    }

    fn td_course() -> Course {
        Course {
            id: CourseId(1),
            name: "C1".to_owned(),
            kind: SessionKind::Td,
            session_hours: 2,
            sessions_required: 4,
            window: DateRange::new(d(2025, 10, 13), d(2025, 11, 21)).unwrap(),
            priority: 0,
            equipment: Default::default(),
            software: Default::default(),
            computers: 0,
        }
    }

    struct Fixture {
        snapshot: PlanningSnapshot,
        index: AvailabilityIndex,
        course: Course,
        room: Room,
        attending: Vec<ClassGroupId>,
    }

    fn fixture() -> Fixture {
        let course = td_course();
        let snapshot = PlanningSnapshot::assemble(
            vec![full_week_teacher(1)],
            vec![ClassGroup {
                id: ClassGroupId(5),
                name: "A2".to_owned(),
                size: 20,
                unavailable: vec![],
            }],
            vec![lab(10)],
            vec![course.clone()],
            vec![],
            vec![],
            vec![],
            vec![],
        );
        let window = DateRange::new(d(2025, 10, 13), d(2025, 11, 21)).unwrap();
        let index = AvailabilityIndex::build(&snapshot, &window);
        Fixture {
            snapshot,
            index,
            course,
            room: lab(10),
            attending: vec![ClassGroupId(5)],
        }
    }

    fn candidate<'a>(f: &'a Fixture, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Candidate<'a> {
        Candidate {
            course: &f.course,
            class_group: ClassGroupId(5),
            attending: &f.attending,
            subgroup: None,
            teacher: crate::domain::TeacherId(1),
            second_teacher: None,
            room: &f.room,
            date,
            start,
            end,
        }
    }

    fn context<'a>(f: &'a Fixture) -> EvalContext<'a> {
        EvalContext {
            snapshot: &f.snapshot,
            index: &f.index,
            week_start: d(2025, 10, 13),
            week_rule: WeekRule::Unrestricted,
            placed_this_week: 0,
        }
    }

    #[test]
    fn accepts_a_clean_candidate() {
        let f = fixture();
        let cand = candidate(&f, d(2025, 10, 13), hm(8, 0), hm(10, 0));
        assert_eq!(evaluate(&cand, &context(&f)), Ok(()));
    }

    #[test]
    fn rejects_dates_outside_the_course_window() {
        let f = fixture();
        let cand = candidate(&f, d(2025, 12, 1), hm(8, 0), hm(10, 0));
        assert_eq!(
            evaluate(&cand, &context(&f)),
            Err(Rejection::WindowOutOfCoursePeriod)
        );
    }

    #[test]
    fn rejects_weekends_as_closed() {
        let f = fixture();
        let cand = candidate(&f, d(2025, 10, 18), hm(8, 0), hm(10, 0));
        assert_eq!(evaluate(&cand, &context(&f)), Err(Rejection::DateClosed));
    }

    #[test]
    fn rejects_non_canonical_slots() {
        let f = fixture();
        let cand = candidate(&f, d(2025, 10, 13), hm(8, 30), hm(10, 30));
        assert_eq!(
            evaluate(&cand, &context(&f)),
            Err(Rejection::OutsideWorkingWindow)
        );
        // Right boundary but wrong duration for a 2h course.
        let cand = candidate(&f, d(2025, 10, 13), hm(8, 0), hm(9, 0));
        assert_eq!(
            evaluate(&cand, &context(&f)),
            Err(Rejection::OutsideWorkingWindow)
        );
    }

    #[test]
    fn rejects_when_quota_consumed() {
        let f = fixture();
        let cand = candidate(&f, d(2025, 10, 13), hm(8, 0), hm(10, 0));
        let mut ctx = context(&f);
        ctx.week_rule = WeekRule::Allowed(Some(1));
        ctx.placed_this_week = 1;
        assert_eq!(evaluate(&cand, &ctx), Err(Rejection::WeekQuotaReached));

        ctx.placed_this_week = 0;
        assert_eq!(evaluate(&cand, &ctx), Ok(()));

        // Listed week without a numeric cap is simply allowed.
        ctx.week_rule = WeekRule::Allowed(None);
        ctx.placed_this_week = 7;
        assert_eq!(evaluate(&cand, &ctx), Ok(()));
    }

    #[test]
    fn rejects_capacity_and_computer_shortfalls() {
        let mut f = fixture();
        f.room.capacity = 10;
        let cand = candidate(&f, d(2025, 10, 13), hm(8, 0), hm(10, 0));
        assert_eq!(
            evaluate(&cand, &context(&f)),
            Err(Rejection::CapacityInsufficient)
        );

        let mut f = fixture();
        f.course.computers = 30;
        let cand = candidate(&f, d(2025, 10, 13), hm(8, 0), hm(10, 0));
        assert_eq!(
            evaluate(&cand, &context(&f)),
            Err(Rejection::ComputersInsufficient)
        );
    }

    #[test]
    fn rejects_missing_equipment_before_software() {
        let mut f = fixture();
        f.course.equipment.insert("projector".to_owned());
        f.course.software.insert("matlab".to_owned());
        let cand = candidate(&f, d(2025, 10, 13), hm(8, 0), hm(10, 0));
        assert_eq!(
            evaluate(&cand, &context(&f)),
            Err(Rejection::EquipmentMissing)
        );
    }

    #[test]
    fn subgroup_candidates_need_only_half_the_seats() {
        let mut f = fixture();
        f.room.capacity = 10;
        let mut cand = candidate(&f, d(2025, 10, 13), hm(8, 0), hm(10, 0));
        cand.subgroup = Some("A");
        assert_eq!(evaluate(&cand, &context(&f)), Ok(()));
    }

    #[test]
    fn tracker_keeps_the_most_specific_rejection() {
        let mut tracker = RejectionTracker::default();
        tracker.observe(Rejection::DateClosed);
        tracker.observe(Rejection::TeacherBusy);
        tracker.observe(Rejection::WeekQuotaReached);
        assert_eq!(tracker.into_reason(), Some(Rejection::TeacherBusy));

        // Equal specificity: the later observation wins.
        let mut tracker = RejectionTracker::default();
        tracker.observe(Rejection::RoomBusy);
        tracker.observe(Rejection::ClassBusy);
        assert_eq!(tracker.into_reason(), Some(Rejection::ClassBusy));
    }
}
