mod common;

use chrono::TimeDelta;
use common::{
    available_online, new_batch, new_course, offline_with_batch, pooled_test_catalog, test_catalog,
};
use course_catalog::clock::Clock;
use course_catalog::error::CatalogError;
use course_catalog::models::*;
use uuid::Uuid;

#[tokio::test]
async fn test_two_seats_three_concurrent_learners() {
    let t = test_catalog().await;
    let (course, batch) = offline_with_batch(&t, "Pottery Weekend", 2).await;
    let enrollments = &t.catalog.enrollments;

    let (a, b, c) = tokio::join!(
        enrollments.enroll_student(CourseVariant::Offline, course.id, Uuid::new_v4(), Some(batch.id)),
        enrollments.enroll_student(CourseVariant::Offline, course.id, Uuid::new_v4(), Some(batch.id)),
        enrollments.enroll_student(CourseVariant::Offline, course.id, Uuid::new_v4(), Some(batch.id)),
    );

    let results = [a, b, c];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(CatalogError::BatchFull(id)) if *id == batch.id))
        .count();
    assert_eq!(succeeded, 2);
    assert_eq!(full, 1);

    let batches = enrollments.batches(course.id).await.unwrap();
    assert_eq!(batches[0].enrolled_count, 2);
    assert!(batches[0].is_full);

    // A full batch closes enrollment for the course
    let course = t.catalog.courses.get(CourseVariant::Offline, course.id).await.unwrap();
    assert_eq!(course.enrollment_status(), Some(EnrollmentStatus::Closed));

    let late = enrollments
        .enroll_student(CourseVariant::Offline, course.id, Uuid::new_v4(), Some(batch.id))
        .await;
    assert!(matches!(late, Err(CatalogError::BatchFull(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_never_exceeded_under_parallel_load() {
    let t = pooled_test_catalog().await;
    let (course, batch) = offline_with_batch(&t, "Sailing Course", 3).await;
    let (course_id, batch_id) = (course.id, batch.id);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let catalog = t.catalog.clone();
        handles.push(tokio::spawn(async move {
            catalog
                .enrollments
                .enroll_student(CourseVariant::Offline, course_id, Uuid::new_v4(), Some(batch_id))
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => succeeded += 1,
            Err(CatalogError::BatchFull(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(succeeded, 3);

    let batches = t.catalog.enrollments.batches(course.id).await.unwrap();
    assert_eq!(batches[0].enrolled_count, 3);
    assert!(batches[0].is_full);
    let listed = t
        .catalog
        .enrollments
        .enrollments(CourseVariant::Offline, course.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);

    let course = t.catalog.courses.get(CourseVariant::Offline, course.id).await.unwrap();
    assert_eq!(course.enrollment_status(), Some(EnrollmentStatus::Closed));
}

#[tokio::test]
async fn test_batch_rejects_enrollment_before_its_window_opens() {
    let t = test_catalog().await;
    let course = t
        .catalog
        .courses
        .create(new_course("Stone Carving", CourseVariant::Offline))
        .await
        .unwrap();
    let mut opens_later = new_batch(t.clock.now(), 5);
    opens_later.enrollment_start = t.clock.now() + TimeDelta::days(2);
    let batch = t
        .catalog
        .enrollments
        .create_batch(course.id, opens_later)
        .await
        .unwrap();

    let early = t
        .catalog
        .enrollments
        .enroll_student(CourseVariant::Offline, course.id, Uuid::new_v4(), Some(batch.id))
        .await
        .unwrap_err();
    assert!(matches!(early, CatalogError::NotOpen(_)));
    let batches = t.catalog.enrollments.batches(course.id).await.unwrap();
    assert_eq!(batches[0].enrolled_count, 0);

    t.clock.advance(TimeDelta::days(3));
    t.catalog
        .enrollments
        .enroll_student(CourseVariant::Offline, course.id, Uuid::new_v4(), Some(batch.id))
        .await
        .expect("enrollment is open once the window starts");
}

#[tokio::test]
async fn test_reenrolling_is_a_noop() {
    let t = test_catalog().await;
    let (course, batch) = offline_with_batch(&t, "Woodworking", 5).await;
    let learner = Uuid::new_v4();
    let enrollments = &t.catalog.enrollments;

    enrollments
        .enroll_student(CourseVariant::Offline, course.id, learner, Some(batch.id))
        .await
        .expect("first enrollment");
    enrollments
        .enroll_student(CourseVariant::Offline, course.id, learner, Some(batch.id))
        .await
        .expect("second enrollment is a no-op");

    let batches = enrollments.batches(course.id).await.unwrap();
    assert_eq!(batches[0].enrolled_count, 1);
    let listed = enrollments.enrollments(CourseVariant::Offline, course.id).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_unknown_batch_is_rejected() {
    let t = test_catalog().await;
    let (course, _) = offline_with_batch(&t, "Glass Blowing", 5).await;
    let missing = Uuid::new_v4();

    let err = t
        .catalog
        .enrollments
        .enroll_student(CourseVariant::Offline, course.id, Uuid::new_v4(), Some(missing))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::BatchNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_enrollment_closes_after_deadline() {
    let t = test_catalog().await;
    let (course, batch) = offline_with_batch(&t, "Beekeeping", 5).await;

    t.clock.advance(TimeDelta::days(6));

    let err = t
        .catalog
        .enrollments
        .enroll_student(CourseVariant::Offline, course.id, Uuid::new_v4(), Some(batch.id))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotOpen(_)));

    let course = t.catalog.courses.get(CourseVariant::Offline, course.id).await.unwrap();
    assert_eq!(course.enrollment_status(), Some(EnrollmentStatus::Closed));
}

#[tokio::test]
async fn test_enrollment_status_moves_forward_only() {
    let t = test_catalog().await;
    let course = t
        .catalog
        .courses
        .create(new_course("Rock Climbing", CourseVariant::Offline))
        .await
        .unwrap();

    let mut batch = new_batch(t.clock.now(), 10);
    batch.enrollment_end = t.clock.now() + TimeDelta::days(20);
    t.catalog.enrollments.create_batch(course.id, batch).await.unwrap();

    let enrollments = &t.catalog.enrollments;
    assert_eq!(
        enrollments.update_enrollment_status(course.id).await.unwrap(),
        EnrollmentStatus::Open
    );

    t.clock.advance(TimeDelta::days(11));
    assert_eq!(
        enrollments.update_enrollment_status(course.id).await.unwrap(),
        EnrollmentStatus::InProgress
    );
    // Idempotent
    assert_eq!(
        enrollments.update_enrollment_status(course.id).await.unwrap(),
        EnrollmentStatus::InProgress
    );

    // Past the batch end date
    t.clock.advance(TimeDelta::days(30));
    assert_eq!(
        enrollments.update_enrollment_status(course.id).await.unwrap(),
        EnrollmentStatus::Closed
    );

    // Moving the clock back does not reopen
    t.clock.advance(TimeDelta::days(-41));
    assert_eq!(
        enrollments.update_enrollment_status(course.id).await.unwrap(),
        EnrollmentStatus::Closed
    );
}

#[tokio::test]
async fn test_batch_end_date_follows_course_duration() {
    let t = test_catalog().await;
    let (_, batch) = offline_with_batch(&t, "Life Drawing", 8).await;
    assert_eq!(batch.end_date - batch.start_date, TimeDelta::days(14));
    assert_eq!(batch.enrolled_count, 0);
    assert!(!batch.is_full);
}

#[tokio::test]
async fn test_add_and_remove_batch() {
    let t = test_catalog().await;
    let (course, batch) = offline_with_batch(&t, "Calligraphy", 8).await;
    let enrollments = &t.catalog.enrollments;

    // Adding an attached batch changes nothing
    let same = enrollments.add_batch(course.id, batch.id).await.unwrap();
    assert_eq!(same.batches(), &[batch.id]);
    assert_eq!(same.version, course.version);

    let removed = enrollments.remove_batch(course.id, batch.id).await.unwrap();
    assert!(removed.batches().is_empty());

    let readded = enrollments.add_batch(course.id, batch.id).await.unwrap();
    assert_eq!(readded.batches(), &[batch.id]);

    let err = enrollments.add_batch(course.id, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CatalogError::BatchNotFound(_)));
}

#[tokio::test]
async fn test_online_enrollment_requires_available_course() {
    let t = test_catalog().await;
    let draft = t
        .catalog
        .courses
        .create(new_course("Draft Only", CourseVariant::Online))
        .await
        .unwrap();

    let err = t
        .catalog
        .enrollments
        .enroll_student(CourseVariant::Online, draft.id, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotOpen(_)));

    let course = available_online(&t, "Machine Learning").await;
    t.catalog
        .enrollments
        .enroll_student(CourseVariant::Online, course.id, Uuid::new_v4(), None)
        .await
        .expect("available course accepts enrollments");

    let err = t
        .catalog
        .enrollments
        .enroll_student(CourseVariant::Online, course.id, Uuid::new_v4(), Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));
}

#[tokio::test]
async fn test_deleted_course_rejects_enrollment() {
    let t = test_catalog().await;
    let course = available_online(&t, "Typography").await;
    t.catalog.courses.soft_delete(CourseVariant::Online, course.id).await.unwrap();

    let err = t
        .catalog
        .enrollments
        .enroll_student(CourseVariant::Online, course.id, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
}
