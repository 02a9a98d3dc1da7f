use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{courses, parse_id};
use crate::domain::aggregate;
use crate::models::{Course, CourseVariant, Review, Visibility};

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: String,
    course_id: String,
    learner_id: String,
    score: f64,
    comment: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = sqlx::Error;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Review {
            id: parse_id(&row.id)?,
            course_id: parse_id(&row.course_id)?,
            learner_id: parse_id(&row.learner_id)?,
            score: row.score,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

/// What [`detach`] found.
#[derive(Debug)]
pub enum Detached {
    Removed(Course),
    NotAttached,
    CourseMissing,
}

pub async fn insert(db: &SqlitePool, review: &Review) -> Result<(), sqlx::Error> {
    let mut conn = db.acquire().await?;
    insert_on(&mut conn, review).await
}

async fn insert_on(conn: &mut SqliteConnection, review: &Review) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO reviews (id, course_id, learner_id, score, comment, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(review.id.to_string())
    .bind(review.course_id.to_string())
    .bind(review.learner_id.to_string())
    .bind(review.score)
    .bind(&review.comment)
    .bind(review.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert `review`, append it to its course and re-aggregate the rating in
/// one transaction. Returns `None`, having written nothing, when the course
/// is missing or deleted.
pub async fn attach(
    db: &SqlitePool,
    variant: CourseVariant,
    review: &Review,
    now: DateTime<Utc>,
) -> Result<Option<Course>, sqlx::Error> {
    let mut tx = db.begin().await?;
    // Writing first takes the write lock, so the reads below see the latest commit.
    insert_on(&mut *tx, review).await?;

    let Some(mut course) =
        courses::find_by_id_on(&mut *tx, variant, review.course_id, Visibility::Live).await?
    else {
        tx.rollback().await?;
        return Ok(None);
    };
    if !course.reviews.contains(&review.id) {
        course.reviews.push(review.id);
    }

    if !rerate(&mut *tx, &mut course, now).await? {
        tx.rollback().await?;
        return Ok(None);
    }
    tx.commit().await?;
    Ok(Some(course))
}

/// Delete a review row, drop it from its course and re-aggregate the rating
/// in one transaction. Nothing changes unless the course lists the review.
pub async fn detach(
    db: &SqlitePool,
    variant: CourseVariant,
    course_id: Uuid,
    review_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Detached, sqlx::Error> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM reviews WHERE id = ?1 AND course_id = ?2")
        .bind(review_id.to_string())
        .bind(course_id.to_string())
        .execute(&mut *tx)
        .await?;

    let Some(mut course) =
        courses::find_by_id_on(&mut *tx, variant, course_id, Visibility::Live).await?
    else {
        tx.rollback().await?;
        return Ok(Detached::CourseMissing);
    };
    let before = course.reviews.len();
    course.reviews.retain(|r| *r != review_id);
    if course.reviews.len() == before {
        tx.rollback().await?;
        return Ok(Detached::NotAttached);
    }

    if !rerate(&mut *tx, &mut course, now).await? {
        tx.rollback().await?;
        return Ok(Detached::CourseMissing);
    }
    tx.commit().await?;
    Ok(Detached::Removed(course))
}

async fn rerate(
    conn: &mut SqliteConnection,
    course: &mut Course,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let attached = find_attached_on(conn, course.id, &course.reviews).await?;
    course.rating = aggregate(attached.iter().map(|r| r.score), now);

    let expected = course.version;
    course.version = expected + 1;
    course.updated_at = now;
    courses::save_reviews(conn, course, expected).await
}

/// Reviews of `course_id` whose ids are in `ids`. References to missing
/// reviews are silently skipped.
pub async fn find_attached(
    db: &SqlitePool,
    course_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Review>, sqlx::Error> {
    let mut conn = db.acquire().await?;
    find_attached_on(&mut conn, course_id, ids).await
}

async fn find_attached_on(
    conn: &mut SqliteConnection,
    course_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Review>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, course_id, learner_id, score, comment, created_at FROM reviews WHERE course_id = ",
    );
    qb.push_bind(course_id.to_string());
    qb.push(" AND id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(") ORDER BY created_at DESC");

    let rows = qb.build_query_as::<ReviewRow>().fetch_all(&mut *conn).await?;
    rows.into_iter().map(Review::try_from).collect()
}
