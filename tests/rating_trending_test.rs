mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use common::{available_online, new_course, pooled_test_catalog, test_catalog};
use course_catalog::error::CatalogError;
use course_catalog::models::*;
use course_catalog::services::{Catalog, CatalogSettings, EnrollmentActivity};
use uuid::Uuid;

struct UnavailableActivity;

#[async_trait]
impl EnrollmentActivity for UnavailableActivity {
    async fn enrollment_count(&self, _course_id: Uuid) -> Result<i64, CatalogError> {
        Err(CatalogError::StoreUnavailable("enrollment store offline".to_string()))
    }

    async fn enrollments_since(
        &self,
        _course_id: Uuid,
        _since: DateTime<Utc>,
    ) -> Result<i64, CatalogError> {
        Err(CatalogError::StoreUnavailable("enrollment store offline".to_string()))
    }
}

fn review(score: f64) -> NewReview {
    NewReview {
        learner_id: Uuid::new_v4(),
        score,
        comment: "Worth it".to_string(),
    }
}

#[tokio::test]
async fn test_rating_aggregates_attached_reviews() {
    let t = test_catalog().await;
    let course = t
        .catalog
        .courses
        .create(new_course("Public Speaking", CourseVariant::Online))
        .await
        .unwrap();

    let mut latest = course.clone();
    for score in [5.0, 3.0, 4.0] {
        latest = t
            .catalog
            .reviews
            .add_review(CourseVariant::Online, course.id, review(score))
            .await
            .expect("Failed to add review");
    }

    assert_eq!(latest.rating.average, 4.0);
    assert_eq!(latest.rating.count, 3);
    assert!(latest.rating.last_updated.is_some());

    let reviews = t.catalog.reviews.reviews(CourseVariant::Online, course.id).await.unwrap();
    assert_eq!(reviews.len(), 3);

    // Removing the 3 leaves [5, 4]
    let three = reviews.iter().find(|r| r.score == 3.0).unwrap().id;
    let after = t
        .catalog
        .reviews
        .remove_review(CourseVariant::Online, course.id, three)
        .await
        .unwrap();
    assert_eq!(after.rating.average, 4.5);
    assert_eq!(after.rating.count, 2);

    let err = t
        .catalog
        .reviews
        .remove_review(CourseVariant::Online, course.id, three)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reviews_keep_rating_in_step() {
    let t = pooled_test_catalog().await;
    let course = t
        .catalog
        .courses
        .create(new_course("Night Photography", CourseVariant::Online))
        .await
        .unwrap();
    let course_id = course.id;

    let mut handles = Vec::new();
    for i in 0..20 {
        let catalog = t.catalog.clone();
        let score = if i % 2 == 0 { 5.0 } else { 3.0 };
        handles.push(tokio::spawn(async move {
            catalog
                .reviews
                .add_review(CourseVariant::Online, course_id, review(score))
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked").expect("review was not added");
    }

    let course = t.catalog.courses.get(CourseVariant::Online, course_id).await.unwrap();
    let attached = t.catalog.reviews.reviews(CourseVariant::Online, course_id).await.unwrap();
    assert_eq!(course.reviews.len(), 20);
    assert_eq!(attached.len(), 20);
    assert_eq!(course.rating.count, 20);
    assert_eq!(course.rating.average, 4.0);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE course_id = ?")
        .bind(course_id.to_string())
        .fetch_one(&t.db)
        .await
        .unwrap();
    assert_eq!(rows, 20);

    // Drop five of the 5s at once
    let removed: Vec<Uuid> = attached
        .iter()
        .filter(|r| r.score == 5.0)
        .take(5)
        .map(|r| r.id)
        .collect();
    let mut handles = Vec::new();
    for review_id in removed {
        let catalog = t.catalog.clone();
        handles.push(tokio::spawn(async move {
            catalog
                .reviews
                .remove_review(CourseVariant::Online, course_id, review_id)
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked").expect("review was not removed");
    }

    let course = t.catalog.courses.get(CourseVariant::Online, course_id).await.unwrap();
    assert_eq!(course.reviews.len(), 15);
    assert_eq!(course.rating.count, 15);
    // five 5s and ten 3s
    assert_eq!(course.rating.average, 3.7);
}

#[tokio::test]
async fn test_review_for_missing_course_writes_nothing() {
    let t = test_catalog().await;

    let err = t
        .catalog
        .reviews
        .add_review(CourseVariant::Online, Uuid::new_v4(), review(4.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
        .fetch_one(&t.db)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_dangling_review_reference_is_skipped() {
    let t = test_catalog().await;
    let course = t
        .catalog
        .courses
        .create(new_course("Interior Design", CourseVariant::Free))
        .await
        .unwrap();

    let reviewed = t
        .catalog
        .reviews
        .add_review(CourseVariant::Free, course.id, review(2.0))
        .await
        .unwrap();
    t.catalog
        .reviews
        .add_review(CourseVariant::Free, course.id, review(4.0))
        .await
        .unwrap();

    // Delete one review row behind the course's back
    sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(reviewed.reviews[0].to_string())
        .execute(&t.db)
        .await
        .unwrap();

    let rating = t
        .catalog
        .reviews
        .refresh_rating(CourseVariant::Free, course.id)
        .await
        .expect("dangling references are not fatal");
    assert_eq!(rating.average, 4.0);
    assert_eq!(rating.count, 1);
}

#[tokio::test]
async fn test_out_of_range_score_is_rejected() {
    let t = test_catalog().await;
    let course = t
        .catalog
        .courses
        .create(new_course("Astronomy", CourseVariant::Online))
        .await
        .unwrap();

    let err = t
        .catalog
        .reviews
        .add_review(CourseVariant::Online, course.id, review(6.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));
}

#[tokio::test]
async fn test_trending_is_cached_within_staleness_window() {
    let t = test_catalog().await;
    let course = available_online(&t, "Guitar for Beginners").await;

    // One enrollment: 1 * 0.4 + 0 + 1 recent * 0.2
    t.catalog
        .enrollments
        .enroll_student(CourseVariant::Online, course.id, Uuid::new_v4(), None)
        .await
        .unwrap();
    let first = t.catalog.trending.recompute(CourseVariant::Online, course.id).await.unwrap();
    assert_eq!(first, 0.6);

    t.catalog
        .enrollments
        .enroll_student(CourseVariant::Online, course.id, Uuid::new_v4(), None)
        .await
        .unwrap();
    t.clock.advance(TimeDelta::hours(5));
    let cached = t.catalog.trending.recompute(CourseVariant::Online, course.id).await.unwrap();
    assert_eq!(cached, 0.6);

    t.clock.advance(TimeDelta::hours(1));
    let fresh = t.catalog.trending.recompute(CourseVariant::Online, course.id).await.unwrap();
    assert_eq!(fresh, 1.2);

    // Same inputs after another window: same score
    t.clock.advance(TimeDelta::hours(7));
    let again = t.catalog.trending.recompute(CourseVariant::Online, course.id).await.unwrap();
    assert_eq!(again, fresh);
}

#[tokio::test]
async fn test_trending_weights_rating() {
    let t = test_catalog().await;
    let course = t
        .catalog
        .courses
        .create(new_course("Chess Openings", CourseVariant::Online))
        .await
        .unwrap();

    for score in [5.0, 3.0, 4.0] {
        t.catalog
            .reviews
            .add_review(CourseVariant::Online, course.id, review(score))
            .await
            .unwrap();
    }

    t.clock.advance(TimeDelta::hours(6));
    // 4.0 average * 3 reviews * 0.4
    let score = t.catalog.trending.recompute(CourseVariant::Online, course.id).await.unwrap();
    assert_eq!(score, 4.8);

    let listed = t.catalog.courses.get(CourseVariant::Online, course.id).await.unwrap();
    assert_eq!(listed.trending_score, 4.8);
}

#[tokio::test]
async fn test_failed_activity_lookup_keeps_previous_score() {
    let t = test_catalog().await;
    let course = available_online(&t, "Watercolour Painting").await;
    t.catalog
        .enrollments
        .enroll_student(CourseVariant::Online, course.id, Uuid::new_v4(), None)
        .await
        .unwrap();
    let before = t.catalog.courses.get(CourseVariant::Online, course.id).await.unwrap();
    assert_eq!(before.trending_score, 0.6);

    let broken = Catalog::with_activity(
        t.db.clone(),
        t.clock.clone(),
        CatalogSettings::default(),
        Arc::new(UnavailableActivity),
    );
    t.clock.advance(TimeDelta::hours(7));

    let err = broken.trending.recompute(CourseVariant::Online, course.id).await.unwrap_err();
    assert!(matches!(err, CatalogError::StoreUnavailable(_)));

    let after = t.catalog.courses.get(CourseVariant::Online, course.id).await.unwrap();
    assert_eq!(after.trending_score, 0.6);
    assert_eq!(after.last_trending_update, before.last_trending_update);
}

#[tokio::test]
async fn test_recompute_on_missing_course() {
    let t = test_catalog().await;
    let err = t
        .catalog
        .trending
        .recompute(CourseVariant::Offline, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
}
