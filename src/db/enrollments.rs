use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::{batches, parse_enum, parse_id};
use crate::error::CatalogError;
use crate::models::{EnrollOutcome, Enrollment};
use crate::services::trending_service::EnrollmentActivity;

#[derive(Debug, FromRow)]
struct EnrollmentRow {
    id: String,
    course_id: String,
    variant: String,
    learner_id: String,
    batch_id: Option<String>,
    enrolled_at: DateTime<Utc>,
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = sqlx::Error;

    fn try_from(row: EnrollmentRow) -> Result<Self, Self::Error> {
        Ok(Enrollment {
            id: parse_id(&row.id)?,
            course_id: parse_id(&row.course_id)?,
            variant: parse_enum(&row.variant)?,
            learner_id: parse_id(&row.learner_id)?,
            batch_id: row.batch_id.as_deref().map(parse_id).transpose()?,
            enrolled_at: row.enrolled_at,
        })
    }
}

/// Record an enrollment and, for batch enrollments, take a seat atomically.
///
/// Both writes share one transaction: a full batch rolls back the enrollment
/// row, and an existing (course, learner) pair changes nothing.
pub async fn enroll(db: &SqlitePool, enrollment: &Enrollment) -> Result<EnrollOutcome, sqlx::Error> {
    let mut tx = db.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO enrollments (id, course_id, variant, learner_id, batch_id, enrolled_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(course_id, learner_id) DO NOTHING
        "#,
    )
    .bind(enrollment.id.to_string())
    .bind(enrollment.course_id.to_string())
    .bind(enrollment.variant.as_str())
    .bind(enrollment.learner_id.to_string())
    .bind(enrollment.batch_id.map(|id| id.to_string()))
    .bind(enrollment.enrolled_at)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.commit().await?;
        return Ok(EnrollOutcome::AlreadyEnrolled);
    }

    if let Some(batch_id) = enrollment.batch_id {
        if !batches::claim_seat(&mut *tx, batch_id, enrollment.course_id).await? {
            tx.rollback().await?;
            return Ok(EnrollOutcome::BatchFull);
        }
    }

    tx.commit().await?;
    Ok(EnrollOutcome::Enrolled)
}

pub async fn find(
    db: &SqlitePool,
    course_id: Uuid,
    learner_id: Uuid,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentRow>(
        r#"
        SELECT id, course_id, variant, learner_id, batch_id, enrolled_at
        FROM enrollments
        WHERE course_id = ?1 AND learner_id = ?2
        "#,
    )
    .bind(course_id.to_string())
    .bind(learner_id.to_string())
    .fetch_optional(db)
    .await?
    .map(Enrollment::try_from)
    .transpose()
}

pub async fn list_for_course(db: &SqlitePool, course_id: Uuid) -> Result<Vec<Enrollment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EnrollmentRow>(
        r#"
        SELECT id, course_id, variant, learner_id, batch_id, enrolled_at
        FROM enrollments
        WHERE course_id = ?1
        ORDER BY enrolled_at ASC
        "#,
    )
    .bind(course_id.to_string())
    .fetch_all(db)
    .await?;
    rows.into_iter().map(Enrollment::try_from).collect()
}

pub async fn count_for_course(db: &SqlitePool, course_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = ?1")
        .bind(course_id.to_string())
        .fetch_one(db)
        .await
}

pub async fn count_since(
    db: &SqlitePool,
    course_id: Uuid,
    since: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = ?1 AND enrolled_at >= ?2")
        .bind(course_id.to_string())
        .bind(since)
        .fetch_one(db)
        .await
}

pub async fn count_for_batch(db: &SqlitePool, batch_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE batch_id = ?1")
        .bind(batch_id.to_string())
        .fetch_one(db)
        .await
}

/// Enrollment counts read straight from the `enrollments` table.
#[derive(Clone)]
pub struct SqliteEnrollmentActivity {
    db: SqlitePool,
}

impl SqliteEnrollmentActivity {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EnrollmentActivity for SqliteEnrollmentActivity {
    async fn enrollment_count(&self, course_id: Uuid) -> Result<i64, CatalogError> {
        Ok(count_for_course(&self.db, course_id).await?)
    }

    async fn enrollments_since(
        &self,
        course_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, CatalogError> {
        Ok(count_since(&self.db, course_id, since).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::models::{Address, Batch, CourseVariant};
    use chrono::TimeDelta;

    fn batch(course_id: Uuid, max_student_count: u32) -> Batch {
        let now = Utc::now();
        Batch {
            id: Uuid::new_v4(),
            course_id,
            name: "Evening".to_string(),
            instructors: vec![],
            start_date: now + TimeDelta::days(7),
            end_date: now + TimeDelta::days(14),
            enrollment_start: now,
            enrollment_end: now + TimeDelta::days(5),
            max_student_count,
            enrolled_count: 0,
            is_full: false,
            address: Address::default(),
            created_at: now,
        }
    }

    fn enrollment(course_id: Uuid, learner_id: Uuid, batch_id: Option<Uuid>) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            course_id,
            variant: CourseVariant::Offline,
            learner_id,
            batch_id,
            enrolled_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_enroll_claims_seats_until_full() {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let course_id = Uuid::new_v4();
        let b = batch(course_id, 1);
        batches::insert(&pool, &b).await.expect("Failed to insert batch");

        let first = enroll(&pool, &enrollment(course_id, Uuid::new_v4(), Some(b.id)))
            .await
            .unwrap();
        assert_eq!(first, EnrollOutcome::Enrolled);

        let stored = batches::find_by_id(&pool, b.id).await.unwrap().unwrap();
        assert_eq!(stored.enrolled_count, 1);
        assert!(stored.is_full);

        let second = enroll(&pool, &enrollment(course_id, Uuid::new_v4(), Some(b.id)))
            .await
            .unwrap();
        assert_eq!(second, EnrollOutcome::BatchFull);

        // The rejected enrollment row was rolled back
        assert_eq!(count_for_course(&pool, course_id).await.unwrap(), 1);
        assert_eq!(count_for_batch(&pool, b.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_enroll_twice_is_reported_not_counted() {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let course_id = Uuid::new_v4();
        let b = batch(course_id, 10);
        batches::insert(&pool, &b).await.unwrap();
        let learner = Uuid::new_v4();

        enroll(&pool, &enrollment(course_id, learner, Some(b.id))).await.unwrap();
        let again = enroll(&pool, &enrollment(course_id, learner, Some(b.id))).await.unwrap();
        assert_eq!(again, EnrollOutcome::AlreadyEnrolled);

        let stored = batches::find_by_id(&pool, b.id).await.unwrap().unwrap();
        assert_eq!(stored.enrolled_count, 1);
        assert!(find(&pool, course_id, learner).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_seat_claim_checks_course() {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let b = batch(Uuid::new_v4(), 10);
        batches::insert(&pool, &b).await.unwrap();

        let other_course = Uuid::new_v4();
        let outcome = enroll(&pool, &enrollment(other_course, Uuid::new_v4(), Some(b.id)))
            .await
            .unwrap();
        assert_eq!(outcome, EnrollOutcome::BatchFull);
        assert_eq!(count_for_course(&pool, other_course).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_since_uses_window() {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let course_id = Uuid::new_v4();

        let mut old = enrollment(course_id, Uuid::new_v4(), None);
        old.enrolled_at = Utc::now() - TimeDelta::days(40);
        enroll(&pool, &old).await.unwrap();
        enroll(&pool, &enrollment(course_id, Uuid::new_v4(), None)).await.unwrap();

        let since = Utc::now() - TimeDelta::days(30);
        assert_eq!(count_since(&pool, course_id, since).await.unwrap(), 1);

        let activity = SqliteEnrollmentActivity::new(pool.clone());
        assert_eq!(activity.enrollment_count(course_id).await.unwrap(), 2);
    }
}
