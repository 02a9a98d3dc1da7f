use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_id, to_json, to_u32};
use crate::models::Batch;

const BATCH_COLUMNS: &str = "id, course_id, name, instructors, start_date, end_date, \
    enrollment_start, enrollment_end, max_student_count, enrolled_count, is_full, address, created_at";

#[derive(Debug, FromRow)]
struct BatchRow {
    id: String,
    course_id: String,
    name: String,
    instructors: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    enrollment_start: DateTime<Utc>,
    enrollment_end: DateTime<Utc>,
    max_student_count: i64,
    enrolled_count: i64,
    is_full: bool,
    address: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for Batch {
    type Error = sqlx::Error;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(Batch {
            id: parse_id(&row.id)?,
            course_id: parse_id(&row.course_id)?,
            name: row.name,
            instructors: from_json(&row.instructors)?,
            start_date: row.start_date,
            end_date: row.end_date,
            enrollment_start: row.enrollment_start,
            enrollment_end: row.enrollment_end,
            max_student_count: to_u32(row.max_student_count)?,
            enrolled_count: to_u32(row.enrolled_count)?,
            is_full: row.is_full,
            address: from_json(&row.address)?,
            created_at: row.created_at,
        })
    }
}

pub async fn insert(db: &SqlitePool, batch: &Batch) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT INTO batches ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        BATCH_COLUMNS
    ))
    .bind(batch.id.to_string())
    .bind(batch.course_id.to_string())
    .bind(&batch.name)
    .bind(to_json(&batch.instructors)?)
    .bind(batch.start_date)
    .bind(batch.end_date)
    .bind(batch.enrollment_start)
    .bind(batch.enrollment_end)
    .bind(i64::from(batch.max_student_count))
    .bind(i64::from(batch.enrolled_count))
    .bind(batch.is_full)
    .bind(to_json(&batch.address)?)
    .bind(batch.created_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> Result<Option<Batch>, sqlx::Error> {
    sqlx::query_as::<_, BatchRow>(&format!("SELECT {} FROM batches WHERE id = ?", BATCH_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .map(Batch::try_from)
        .transpose()
}

/// Batches of `course_id` among `ids`, in the order of `ids`. Unknown ids are skipped.
pub async fn find_for_course(
    db: &SqlitePool,
    course_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Batch>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {} FROM batches WHERE course_id = ?",
        BATCH_COLUMNS
    ))
    .bind(course_id.to_string())
    .fetch_all(db)
    .await?;

    let mut batches: Vec<Batch> = rows
        .into_iter()
        .map(Batch::try_from)
        .collect::<Result<_, _>>()?;
    batches.retain(|b| ids.contains(&b.id));
    batches.sort_by_key(|b| ids.iter().position(|id| *id == b.id));
    Ok(batches)
}

/// Take one seat in a batch if one is free, updating `is_full` in the same
/// statement. Returns `false` when the batch is full (or not part of the course).
pub async fn claim_seat(
    conn: &mut SqliteConnection,
    batch_id: Uuid,
    course_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE batches
        SET enrolled_count = enrolled_count + 1,
            is_full = (enrolled_count + 1 >= max_student_count)
        WHERE id = ?1 AND course_id = ?2 AND enrolled_count < max_student_count
        "#,
    )
    .bind(batch_id.to_string())
    .bind(course_id.to_string())
    .execute(conn)
    .await?
    .rows_affected();

    Ok(updated > 0)
}
