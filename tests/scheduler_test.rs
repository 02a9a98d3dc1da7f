mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use common::{available_online, offline_with_batch, test_catalog};
use course_catalog::models::*;
use course_catalog::services::CatalogScheduler;

#[tokio::test]
async fn test_run_once_refreshes_every_live_course() {
    let t = test_catalog().await;
    let (offline, _) = offline_with_batch(&t, "Canoe Skills", 4).await;
    available_online(&t, "Spreadsheet Mastery").await;
    let deleted = available_online(&t, "Retired Course").await;
    t.catalog
        .courses
        .soft_delete(CourseVariant::Online, deleted.id)
        .await
        .unwrap();

    // Past the batch enrollment deadline
    t.clock.advance(TimeDelta::days(6));

    let scheduler = CatalogScheduler::new(Arc::new(t.catalog.clone()), 60);
    let stats = scheduler.run_once().await.expect("refresh run failed");

    assert_eq!(stats.courses_scanned, 2);
    assert_eq!(stats.statuses_refreshed, 1);
    assert_eq!(stats.scores_refreshed, 2);
    assert_eq!(stats.failures, 0);

    let offline = t.catalog.courses.get(CourseVariant::Offline, offline.id).await.unwrap();
    assert_eq!(offline.enrollment_status(), Some(EnrollmentStatus::Closed));
    assert!(offline.last_trending_update.is_some());
}

#[tokio::test]
async fn test_scheduler_keeps_running_after_failed_run() {
    let t = test_catalog().await;
    let scheduler = CatalogScheduler::new(Arc::new(t.catalog.clone()), 1);

    // Every run fails once the pool is closed; the loop must survive it
    t.db.close().await;
    let task = tokio::spawn(scheduler.start());

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!task.is_finished());

    task.abort();
}
