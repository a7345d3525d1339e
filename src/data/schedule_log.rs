//! Generation log: one entry per course per run.

use chrono::NaiveDate;
use sqlx::PgPool;

/// Appends a schedule-log entry. Failures here must not fail the job, so
/// callers log and continue.
pub async fn append(
    pool: &PgPool,
    course_id: i64,
    status: &str,
    summary: &str,
    messages: &[String],
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO schedule_logs (course_id, status, summary, messages, window_start, window_end)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(course_id)
    .bind(status)
    .bind(summary)
    .bind(messages)
    .bind(window_start)
    .bind(window_end)
    .execute(pool)
    .await?;
    Ok(())
}
