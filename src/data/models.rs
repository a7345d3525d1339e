//! Row types mapped from the schema.
//!
//! Conversion into the domain model happens in the snapshot loader; rows
//! stay close to the tables so queries remain plain `SELECT`s.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct TeacherRow {
    pub id: i64,
    pub name: String,
    pub day_start: Option<NaiveTime>,
    pub day_end: Option<NaiveTime>,
    pub max_weekly_hours: Option<i32>,
}

#[derive(Debug, FromRow)]
pub struct TeacherWindowRow {
    pub teacher_id: i64,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, FromRow)]
pub struct TeacherUnavailabilityRow {
    pub teacher_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, FromRow)]
pub struct ClassGroupRow {
    pub id: i64,
    pub name: String,
    pub size: i32,
}

#[derive(Debug, FromRow)]
pub struct ClassUnavailabilityRow {
    pub class_group_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, FromRow)]
pub struct RoomRow {
    pub id: i64,
    pub name: String,
    pub capacity: i32,
    pub computers: i32,
}

/// One `(owner, resource name)` pair; used for room and course equipment
/// and software alike.
#[derive(Debug, FromRow)]
pub struct ResourceRow {
    pub owner_id: i64,
    pub name: String,
}

#[derive(Debug, FromRow)]
pub struct CourseRow {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub session_hours: i32,
    pub sessions_required: i32,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub priority: i32,
    pub computers: i32,
}

#[derive(Debug, FromRow)]
pub struct CourseClassLinkRow {
    pub course_id: i64,
    pub class_group_id: i64,
    pub group_count: i16,
    pub teacher_a: Option<i64>,
    pub teacher_b: Option<i64>,
    pub subgroup_a: Option<String>,
    pub subgroup_b: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct ClosingPeriodRow {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, FromRow)]
pub struct AllowedWeekRow {
    pub course_id: i64,
    pub week_start: NaiveDate,
    pub quota: Option<i32>,
}

#[derive(Debug, FromRow)]
pub struct SessionRow {
    pub id: i64,
    pub course_id: i64,
    pub class_group_id: i64,
    pub subgroup: Option<String>,
    pub teacher_id: i64,
    pub second_teacher_id: Option<i64>,
    pub room_id: i64,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
}

#[derive(Debug, FromRow)]
pub struct SessionAttendanceRow {
    pub session_id: i64,
    pub class_group_id: i64,
}
