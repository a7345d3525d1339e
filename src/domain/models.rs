//! Scheduling entities as loaded into a planning snapshot.
//!
//! Entities reference each other by integer id only; the snapshot holds the
//! lookup tables. This keeps the planner free of shared object graphs and
//! makes every iteration order explicit.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(TeacherId);
entity_id!(ClassGroupId);
entity_id!(RoomId);
entity_id!(CourseId);
entity_id!(SessionId);

/// An inclusive date range with the invariant that `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new `DateRange`, returning an error if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if start > end {
            return Err(format!(
                "invalid date range: start ({start}) is after end ({end})"
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// A half-open time-of-day interval `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeInterval {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// True when `[start, end)` lies entirely inside this interval.
    pub fn covers(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start <= start && end <= self.end
    }

    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start < end && start < self.end
    }

    /// Clips this interval to `bounds`, returning `None` when nothing remains.
    pub fn clip(&self, bounds: &TimeInterval) -> Option<TimeInterval> {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        (start < end).then_some(TimeInterval { start, end })
    }
}

/// Session type tag, declared in placement-priority order (lectures first,
/// labs last). The derived `Ord` is the planner's type priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionKind {
    Cm,
    Sae,
    Eval,
    Td,
    Tp,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Cm => "CM",
            SessionKind::Sae => "SAE",
            SessionKind::Eval => "Eval",
            SessionKind::Td => "TD",
            SessionKind::Tp => "TP",
        }
    }

    /// Only tutorial and lab sessions may be moved by the relocation engine.
    pub fn relocatable(&self) -> bool {
        matches!(self, SessionKind::Td | SessionKind::Tp)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CM" => Some(SessionKind::Cm),
            "SAE" => Some(SessionKind::Sae),
            "Eval" | "EVAL" => Some(SessionKind::Eval),
            "TD" => Some(SessionKind::Td),
            "TP" => Some(SessionKind::Tp),
            _ => None,
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A teacher with calendar availability.
///
/// Effective availability on a date is the per-weekday intervals clipped to
/// the global daily window, and empty on any date covered by an
/// unavailability range.
#[derive(Debug, Clone, Default)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    /// Global daily window; `None` means no additional bound.
    pub day_start: Option<NaiveTime>,
    pub day_end: Option<NaiveTime>,
    /// Available intervals per weekday, indexed by `Weekday::num_days_from_monday()`.
    pub weekly: [Vec<TimeInterval>; 7],
    /// Date ranges during which the teacher cannot be scheduled at all.
    pub unavailable: Vec<DateRange>,
    /// Optional cap on scheduled hours per ISO week.
    pub max_weekly_hours: Option<u32>,
}

impl Teacher {
    pub fn is_unavailable_on(&self, date: NaiveDate) -> bool {
        self.unavailable.iter().any(|r| r.contains(date))
    }
}

/// A cohort of students scheduled as a unit.
#[derive(Debug, Clone, Default)]
pub struct ClassGroup {
    pub id: ClassGroupId,
    pub name: String,
    pub size: u32,
    pub unavailable: Vec<DateRange>,
}

impl ClassGroup {
    pub fn is_unavailable_on(&self, date: NaiveDate) -> bool {
        self.unavailable.iter().any(|r| r.contains(date))
    }

    /// Headcount of one half of the group, rounded up.
    pub fn subgroup_size(&self) -> u32 {
        self.size.div_ceil(2)
    }
}

/// A room with capacity and installed resources.
#[derive(Debug, Clone, Default)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    pub computers: u32,
    pub equipment: BTreeSet<String>,
    pub software: BTreeSet<String>,
}

/// A course to be planned.
///
/// `priority` orders courses within a type tier: lower values place first.
#[derive(Debug, Clone)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub kind: SessionKind,
    pub session_hours: u32,
    pub sessions_required: u32,
    pub window: DateRange,
    pub priority: i32,
    pub equipment: BTreeSet<String>,
    pub software: BTreeSet<String>,
    pub computers: u32,
}

/// Association between a course and one class group it is taught to.
///
/// With `group_count == 2` the class is split into two subgroups, each with
/// its own session series, label, and preferred teacher.
#[derive(Debug, Clone)]
pub struct CourseClassLink {
    pub course: CourseId,
    pub class_group: ClassGroupId,
    pub group_count: u8,
    pub teacher_a: Option<TeacherId>,
    pub teacher_b: Option<TeacherId>,
    pub subgroup_a: Option<String>,
    pub subgroup_b: Option<String>,
}

impl CourseClassLink {
    pub fn is_split(&self) -> bool {
        self.group_count >= 2
    }
}

/// A calendar range globally excluded from placement.
#[derive(Debug, Clone)]
pub struct ClosingPeriod {
    pub label: String,
    pub range: DateRange,
}

/// Opt-in restriction of a course to specific ISO weeks, with an optional
/// per-week session cap. A quota of `None` means "allowed, no numeric cap".
#[derive(Debug, Clone, Copy)]
pub struct AllowedWeek {
    pub course: CourseId,
    pub week_start: NaiveDate,
    pub quota: Option<u32>,
}

/// A placed session as persisted.
///
/// `class_group` is the owning group; `attending` lists every group present
/// (more than one only for lectures). `second_teacher` is set for project
/// sessions that require two teachers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub course: CourseId,
    pub class_group: ClassGroupId,
    pub subgroup: Option<String>,
    pub teacher: TeacherId,
    pub second_teacher: Option<TeacherId>,
    pub room: RoomId,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub attending: Vec<ClassGroupId>,
}
