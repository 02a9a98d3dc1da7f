use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::{parse_id, to_u32};
use crate::models::CourseModule;

#[derive(Debug, FromRow)]
struct ModuleRow {
    id: String,
    course_id: String,
    title: String,
    summary: Option<String>,
    duration_minutes: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ModuleRow> for CourseModule {
    type Error = sqlx::Error;

    fn try_from(row: ModuleRow) -> Result<Self, Self::Error> {
        Ok(CourseModule {
            id: parse_id(&row.id)?,
            course_id: parse_id(&row.course_id)?,
            title: row.title,
            summary: row.summary,
            duration_minutes: to_u32(row.duration_minutes)?,
            created_at: row.created_at,
        })
    }
}

pub async fn insert(db: &SqlitePool, module: &CourseModule) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO course_modules (id, course_id, title, summary, duration_minutes, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(module.id.to_string())
    .bind(module.course_id.to_string())
    .bind(&module.title)
    .bind(&module.summary)
    .bind(i64::from(module.duration_minutes))
    .bind(module.created_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete(db: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM course_modules WHERE id = ?1")
        .bind(id.to_string())
        .execute(db)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Modules of `course_id` in the order given by `ids`; dangling ids are skipped.
pub async fn find_ordered(
    db: &SqlitePool,
    course_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<CourseModule>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, ModuleRow>(
        r#"
        SELECT id, course_id, title, summary, duration_minutes, created_at
        FROM course_modules
        WHERE course_id = ?1
        "#,
    )
    .bind(course_id.to_string())
    .fetch_all(db)
    .await?;

    let mut modules: Vec<CourseModule> = rows
        .into_iter()
        .map(CourseModule::try_from)
        .collect::<Result<_, _>>()?;
    modules.retain(|m| ids.contains(&m.id));
    modules.sort_by_key(|m| ids.iter().position(|id| *id == m.id));
    Ok(modules)
}
