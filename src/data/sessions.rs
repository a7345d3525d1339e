//! Session persistence: reading existing sessions and committing a run.

use crate::data::models::{SessionAttendanceRow, SessionRow};
use crate::domain::{ClassGroupId, CourseId, RoomId, Session, SessionId, TeacherId};
use crate::engine::PlacedSession;
use sqlx::PgPool;
use std::collections::HashMap;

/// All persisted sessions with their attendance lists, ordered by id.
pub async fn list_all(pool: &PgPool) -> Result<Vec<Session>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SessionRow>(
        "SELECT id, course_id, class_group_id, subgroup, teacher_id, second_teacher_id,
                room_id, starts_at, ends_at
         FROM sessions ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let attendance = sqlx::query_as::<_, SessionAttendanceRow>(
        "SELECT session_id, class_group_id
         FROM session_attendance ORDER BY session_id, class_group_id",
    )
    .fetch_all(pool)
    .await?;

    let mut attending: HashMap<i64, Vec<ClassGroupId>> = HashMap::new();
    for row in attendance {
        attending
            .entry(row.session_id)
            .or_default()
            .push(ClassGroupId(row.class_group_id));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let attending = attending
                .remove(&row.id)
                .unwrap_or_else(|| vec![ClassGroupId(row.class_group_id)]);
            Session {
                id: SessionId(row.id),
                course: CourseId(row.course_id),
                class_group: ClassGroupId(row.class_group_id),
                subgroup: row.subgroup,
                teacher: TeacherId(row.teacher_id),
                second_teacher: row.second_teacher_id.map(TeacherId),
                room: RoomId(row.room_id),
                starts_at: row.starts_at,
                ends_at: row.ends_at,
                attending,
            }
        })
        .collect())
}

/// Commits the sessions placed by a run in a single transaction, registering
/// attendance for every attending class group. Returns the persisted
/// sessions with their database ids.
///
/// The `(room_id, starts_at)` uniqueness constraint makes a conflicting
/// concurrent write fail the whole transaction rather than corrupt the
/// timetable.
pub async fn persist_placed(
    pool: &PgPool,
    placed: &[PlacedSession],
) -> Result<Vec<Session>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut persisted = Vec::with_capacity(placed.len());

    for session in placed {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO sessions
                 (course_id, class_group_id, subgroup, teacher_id, second_teacher_id,
                  room_id, starts_at, ends_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(session.course.0)
        .bind(session.class_group.0)
        .bind(&session.subgroup)
        .bind(session.teacher.0)
        .bind(session.second_teacher.map(|t| t.0))
        .bind(session.room.0)
        .bind(session.starts_at())
        .bind(session.ends_at())
        .fetch_one(&mut *tx)
        .await?;

        for class_group in &session.attending {
            sqlx::query(
                "INSERT INTO session_attendance (session_id, class_group_id) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(class_group.0)
            .execute(&mut *tx)
            .await?;
        }

        persisted.push(Session {
            id: SessionId(id),
            course: session.course,
            class_group: session.class_group,
            subgroup: session.subgroup.clone(),
            teacher: session.teacher,
            second_teacher: session.second_teacher,
            room: session.room,
            starts_at: session.starts_at(),
            ends_at: session.ends_at(),
            attending: session.attending.clone(),
        });
    }

    tx.commit().await?;
    Ok(persisted)
}
