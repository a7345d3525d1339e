//! Immutable snapshot of the persisted state a generation plans over.
//!
//! Loaded once at job start; the engine never touches the database while
//! placing. All lookups are by id over sorted tables so iteration order is
//! reproducible run to run.

use crate::domain::models::{
    AllowedWeek, ClassGroup, ClassGroupId, ClosingPeriod, Course, CourseClassLink, CourseId,
    DateRange, Room, Session, SessionKind, Teacher, TeacherId,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Whether a course may place sessions in a given week, per its
/// `AllowedWeek` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekRule {
    /// The course has no `AllowedWeek` entries: every week in its window is fine.
    Unrestricted,
    /// The week is listed; `Some(n)` caps sessions placed that week.
    Allowed(Option<u32>),
    /// The course has entries and this week is not among them.
    NotAllowed,
}

#[derive(Debug, Clone, Default)]
pub struct PlanningSnapshot {
    pub teachers: BTreeMap<TeacherId, Teacher>,
    pub class_groups: BTreeMap<ClassGroupId, ClassGroup>,
    /// Sorted by ascending capacity then id: tightest-fit room first.
    pub rooms: Vec<Room>,
    pub courses: BTreeMap<CourseId, Course>,
    /// Course-class links in declaration order.
    pub links: Vec<CourseClassLink>,
    pub closings: Vec<ClosingPeriod>,
    allowed_weeks: BTreeMap<CourseId, BTreeMap<NaiveDate, Option<u32>>>,
    pub existing_sessions: Vec<Session>,
}

impl PlanningSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        teachers: Vec<Teacher>,
        class_groups: Vec<ClassGroup>,
        mut rooms: Vec<Room>,
        courses: Vec<Course>,
        links: Vec<CourseClassLink>,
        closings: Vec<ClosingPeriod>,
        allowed_weeks: Vec<AllowedWeek>,
        existing_sessions: Vec<Session>,
    ) -> Self {
        rooms.sort_by_key(|r| (r.capacity, r.id));
        let mut allowed: BTreeMap<CourseId, BTreeMap<NaiveDate, Option<u32>>> = BTreeMap::new();
        for entry in allowed_weeks {
            allowed
                .entry(entry.course)
                .or_default()
                .insert(entry.week_start, entry.quota);
        }
        Self {
            teachers: teachers.into_iter().map(|t| (t.id, t)).collect(),
            class_groups: class_groups.into_iter().map(|c| (c.id, c)).collect(),
            rooms,
            courses: courses.into_iter().map(|c| (c.id, c)).collect(),
            links,
            closings,
            allowed_weeks: allowed,
            existing_sessions,
        }
    }

    pub fn links_for(&self, course: CourseId) -> impl Iterator<Item = &CourseClassLink> {
        self.links.iter().filter(move |l| l.course == course)
    }

    /// Teachers linked to a course, in link declaration order (A before B),
    /// deduplicated.
    pub fn course_teachers(&self, course: CourseId) -> Vec<TeacherId> {
        let mut out = Vec::new();
        for link in self.links_for(course) {
            for teacher in [link.teacher_a, link.teacher_b].into_iter().flatten() {
                if !out.contains(&teacher) {
                    out.push(teacher);
                }
            }
        }
        out
    }

    pub fn week_rule(&self, course: CourseId, week_start: NaiveDate) -> WeekRule {
        match self.allowed_weeks.get(&course) {
            None => WeekRule::Unrestricted,
            Some(weeks) => match weeks.get(&week_start) {
                Some(quota) => WeekRule::Allowed(*quota),
                None => WeekRule::NotAllowed,
            },
        }
    }

    /// Sessions already persisted for a `(course, class-group, subgroup)`
    /// series; lecture sessions count through their attendance list.
    pub fn existing_count(
        &self,
        course: CourseId,
        class_group: ClassGroupId,
        subgroup: Option<&str>,
    ) -> u32 {
        self.existing_sessions
            .iter()
            .filter(|s| {
                s.course == course
                    && (s.class_group == class_group || s.attending.contains(&class_group))
                    && s.subgroup.as_deref() == subgroup
            })
            .count() as u32
    }

    /// The most recent persisted session of a series, used to seed teacher
    /// continuity across generation runs.
    pub fn latest_existing(
        &self,
        course: CourseId,
        class_group: ClassGroupId,
        subgroup: Option<&str>,
    ) -> Option<&Session> {
        self.existing_sessions
            .iter()
            .filter(|s| {
                s.course == course
                    && (s.class_group == class_group || s.attending.contains(&class_group))
                    && s.subgroup.as_deref() == subgroup
            })
            .max_by_key(|s| (s.starts_at, s.id))
    }

    /// Union of the planning windows of the given courses.
    pub fn planning_window(&self, scope: &[CourseId]) -> Option<DateRange> {
        let mut bounds: Option<DateRange> = None;
        for id in scope {
            let Some(course) = self.courses.get(id) else {
                continue;
            };
            bounds = Some(match bounds {
                None => course.window,
                Some(acc) => DateRange {
                    start: acc.start.min(course.window.start),
                    end: acc.end.max(course.window.end),
                },
            });
        }
        bounds
    }

    /// Pre-planning consistency checks over the generation scope.
    ///
    /// Returns a list of human-readable problems; planning must not start
    /// unless it is empty.
    pub fn validate(&self, scope: &[CourseId]) -> Vec<String> {
        let mut issues = Vec::new();

        for id in scope {
            let Some(course) = self.courses.get(id) else {
                issues.push(format!("course {id} does not exist"));
                continue;
            };
            let links: Vec<&CourseClassLink> = self.links_for(*id).collect();
            if links.is_empty() {
                issues.push(format!("course '{}' is linked to no class group", course.name));
                continue;
            }
            for link in &links {
                if !self.class_groups.contains_key(&link.class_group) {
                    issues.push(format!(
                        "course '{}' references unknown class group {}",
                        course.name, link.class_group
                    ));
                }
                for teacher in [link.teacher_a, link.teacher_b].into_iter().flatten() {
                    if !self.teachers.contains_key(&teacher) {
                        issues.push(format!(
                            "course '{}' references unknown teacher {}",
                            course.name, teacher
                        ));
                    }
                }
                if course.kind == SessionKind::Sae
                    && (link.teacher_a.is_none() || link.teacher_b.is_none())
                {
                    issues.push(format!(
                        "project course '{}' needs two teachers on its link to class {}",
                        course.name, link.class_group
                    ));
                }
            }
            if self.course_teachers(*id).is_empty() {
                issues.push(format!(
                    "course '{}' has zero eligible teachers",
                    course.name
                ));
            }
        }

        for session in &self.existing_sessions {
            if !self.courses.contains_key(&session.course) {
                continue; // session of a course outside this snapshot's scope
            }
            if !self.teachers.contains_key(&session.teacher) {
                issues.push(format!(
                    "session {} references unknown teacher {}",
                    session.id, session.teacher
                ));
            }
            if !self.rooms.iter().any(|r| r.id == session.room) {
                issues.push(format!(
                    "session {} references unknown room {}",
                    session.id, session.room
                ));
            }
        }

        issues
    }
}
