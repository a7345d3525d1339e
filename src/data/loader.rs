//! Assembles the immutable planning snapshot from the database.
//!
//! One read pass at job start: every table is pulled with an explicit
//! `ORDER BY` so the snapshot's declaration orders (and with them the whole
//! generation) are reproducible.

use crate::data::models::{
    AllowedWeekRow, ClassGroupRow, ClassUnavailabilityRow, ClosingPeriodRow, CourseClassLinkRow,
    CourseRow, ResourceRow, RoomRow, TeacherRow, TeacherUnavailabilityRow, TeacherWindowRow,
};
use crate::data::sessions;
use crate::domain::{
    AllowedWeek, ClassGroup, ClassGroupId, ClosingPeriod, Course, CourseClassLink, CourseId,
    DateRange, PlanningSnapshot, Room, RoomId, SessionKind, Teacher, TeacherId, TimeInterval,
};
use sqlx::PgPool;
use std::collections::BTreeMap;
use tracing::warn;

fn date_range(start: chrono::NaiveDate, end: chrono::NaiveDate, what: &str) -> Option<DateRange> {
    match DateRange::new(start, end) {
        Ok(range) => Some(range),
        Err(e) => {
            warn!(what, error = %e, "skipping inverted date range");
            None
        }
    }
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

async fn load_teachers(pool: &PgPool) -> Result<Vec<Teacher>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TeacherRow>(
        "SELECT id, name, day_start, day_end, max_weekly_hours FROM teachers ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let windows = sqlx::query_as::<_, TeacherWindowRow>(
        "SELECT teacher_id, weekday, start_time, end_time
         FROM teacher_windows ORDER BY teacher_id, weekday, start_time",
    )
    .fetch_all(pool)
    .await?;
    let unavailabilities = sqlx::query_as::<_, TeacherUnavailabilityRow>(
        "SELECT teacher_id, start_date, end_date
         FROM teacher_unavailabilities ORDER BY teacher_id, start_date",
    )
    .fetch_all(pool)
    .await?;

    let mut teachers: BTreeMap<i64, Teacher> = rows
        .into_iter()
        .map(|row| {
            (
                row.id,
                Teacher {
                    id: TeacherId(row.id),
                    name: row.name,
                    day_start: row.day_start,
                    day_end: row.day_end,
                    weekly: Default::default(),
                    unavailable: Vec::new(),
                    max_weekly_hours: row.max_weekly_hours.map(to_u32),
                },
            )
        })
        .collect();

    for window in windows {
        let Some(teacher) = teachers.get_mut(&window.teacher_id) else {
            continue;
        };
        let Ok(weekday) = usize::try_from(window.weekday) else {
            continue;
        };
        if weekday < 7 && window.start_time < window.end_time {
            teacher.weekly[weekday].push(TimeInterval::new(window.start_time, window.end_time));
        }
    }
    for row in unavailabilities {
        if let Some(teacher) = teachers.get_mut(&row.teacher_id)
            && let Some(range) = date_range(row.start_date, row.end_date, "teacher unavailability")
        {
            teacher.unavailable.push(range);
        }
    }

    Ok(teachers.into_values().collect())
}

async fn load_class_groups(pool: &PgPool) -> Result<Vec<ClassGroup>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ClassGroupRow>(
        "SELECT id, name, size FROM class_groups ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let unavailabilities = sqlx::query_as::<_, ClassUnavailabilityRow>(
        "SELECT class_group_id, start_date, end_date
         FROM class_unavailabilities ORDER BY class_group_id, start_date",
    )
    .fetch_all(pool)
    .await?;

    let mut groups: BTreeMap<i64, ClassGroup> = rows
        .into_iter()
        .map(|row| {
            (
                row.id,
                ClassGroup {
                    id: ClassGroupId(row.id),
                    name: row.name,
                    size: to_u32(row.size),
                    unavailable: Vec::new(),
                },
            )
        })
        .collect();
    for row in unavailabilities {
        if let Some(group) = groups.get_mut(&row.class_group_id)
            && let Some(range) = date_range(row.start_date, row.end_date, "class unavailability")
        {
            group.unavailable.push(range);
        }
    }

    Ok(groups.into_values().collect())
}

async fn load_rooms(pool: &PgPool) -> Result<Vec<Room>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RoomRow>(
        "SELECT id, name, capacity, computers FROM rooms ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let equipment = sqlx::query_as::<_, ResourceRow>(
        "SELECT room_id AS owner_id, equipment AS name FROM room_equipment ORDER BY room_id",
    )
    .fetch_all(pool)
    .await?;
    let software = sqlx::query_as::<_, ResourceRow>(
        "SELECT room_id AS owner_id, software AS name FROM room_software ORDER BY room_id",
    )
    .fetch_all(pool)
    .await?;

    let mut rooms: BTreeMap<i64, Room> = rows
        .into_iter()
        .map(|row| {
            (
                row.id,
                Room {
                    id: RoomId(row.id),
                    name: row.name,
                    capacity: to_u32(row.capacity),
                    computers: to_u32(row.computers),
                    equipment: Default::default(),
                    software: Default::default(),
                },
            )
        })
        .collect();
    for row in equipment {
        if let Some(room) = rooms.get_mut(&row.owner_id) {
            room.equipment.insert(row.name);
        }
    }
    for row in software {
        if let Some(room) = rooms.get_mut(&row.owner_id) {
            room.software.insert(row.name);
        }
    }

    Ok(rooms.into_values().collect())
}

async fn load_courses(pool: &PgPool) -> Result<Vec<Course>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CourseRow>(
        "SELECT id, name, kind, session_hours, sessions_required,
                window_start, window_end, priority, computers
         FROM courses ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let equipment = sqlx::query_as::<_, ResourceRow>(
        "SELECT course_id AS owner_id, equipment AS name FROM course_equipment ORDER BY course_id",
    )
    .fetch_all(pool)
    .await?;
    let software = sqlx::query_as::<_, ResourceRow>(
        "SELECT course_id AS owner_id, software AS name FROM course_software ORDER BY course_id",
    )
    .fetch_all(pool)
    .await?;

    let mut courses: BTreeMap<i64, Course> = BTreeMap::new();
    for row in rows {
        let Some(kind) = SessionKind::parse(&row.kind) else {
            warn!(course = row.id, kind = %row.kind, "skipping course with unknown type tag");
            continue;
        };
        let Some(window) = date_range(row.window_start, row.window_end, "course window") else {
            continue;
        };
        courses.insert(
            row.id,
            Course {
                id: CourseId(row.id),
                name: row.name,
                kind,
                session_hours: to_u32(row.session_hours),
                sessions_required: to_u32(row.sessions_required),
                window,
                priority: row.priority,
                equipment: Default::default(),
                software: Default::default(),
                computers: to_u32(row.computers),
            },
        );
    }
    for row in equipment {
        if let Some(course) = courses.get_mut(&row.owner_id) {
            course.equipment.insert(row.name);
        }
    }
    for row in software {
        if let Some(course) = courses.get_mut(&row.owner_id) {
            course.software.insert(row.name);
        }
    }

    Ok(courses.into_values().collect())
}

async fn load_links(pool: &PgPool) -> Result<Vec<CourseClassLink>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CourseClassLinkRow>(
        "SELECT course_id, class_group_id, group_count, teacher_a, teacher_b,
                subgroup_a, subgroup_b
         FROM course_class_links ORDER BY position, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| CourseClassLink {
            course: CourseId(row.course_id),
            class_group: ClassGroupId(row.class_group_id),
            group_count: u8::try_from(row.group_count).unwrap_or(1),
            teacher_a: row.teacher_a.map(TeacherId),
            teacher_b: row.teacher_b.map(TeacherId),
            subgroup_a: row.subgroup_a,
            subgroup_b: row.subgroup_b,
        })
        .collect())
}

async fn load_closings(pool: &PgPool) -> Result<Vec<ClosingPeriod>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ClosingPeriodRow>(
        "SELECT label, start_date, end_date FROM closing_periods ORDER BY start_date, end_date",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            date_range(row.start_date, row.end_date, "closing period").map(|range| {
                ClosingPeriod {
                    label: row.label,
                    range,
                }
            })
        })
        .collect())
}

async fn load_allowed_weeks(pool: &PgPool) -> Result<Vec<AllowedWeek>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AllowedWeekRow>(
        "SELECT course_id, week_start, quota FROM allowed_weeks ORDER BY course_id, week_start",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| AllowedWeek {
            course: CourseId(row.course_id),
            week_start: row.week_start,
            quota: row.quota.map(to_u32),
        })
        .collect())
}

/// Loads everything a generation run reads, in one pass.
pub async fn load_planning_snapshot(pool: &PgPool) -> Result<PlanningSnapshot, sqlx::Error> {
    let teachers = load_teachers(pool).await?;
    let class_groups = load_class_groups(pool).await?;
    let rooms = load_rooms(pool).await?;
    let courses = load_courses(pool).await?;
    let links = load_links(pool).await?;
    let closings = load_closings(pool).await?;
    let allowed_weeks = load_allowed_weeks(pool).await?;
    let existing_sessions = sessions::list_all(pool).await?;

    Ok(PlanningSnapshot::assemble(
        teachers,
        class_groups,
        rooms,
        courses,
        links,
        closings,
        allowed_weeks,
        existing_sessions,
    ))
}
