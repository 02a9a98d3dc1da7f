#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use course_catalog::clock::{Clock, ManualClock};
use course_catalog::db::{self, connect_in_memory};
use course_catalog::models::*;
use course_catalog::services::{Catalog, CatalogSettings};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub struct TestCatalog {
    pub db: SqlitePool,
    pub clock: Arc<ManualClock>,
    pub catalog: Catalog,
    _dir: Option<TempDir>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub async fn test_catalog() -> TestCatalog {
    let db = connect_in_memory().await.expect("Failed to create test db");
    let clock = Arc::new(ManualClock::new(start_time()));
    let catalog = Catalog::with_clock(db.clone(), clock.clone(), CatalogSettings::default());
    TestCatalog {
        db,
        clock,
        catalog,
        _dir: None,
    }
}

/// A catalog on a file-backed database with several pooled connections, so
/// concurrent calls really run on separate connections.
pub async fn pooled_test_catalog() -> TestCatalog {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("catalog.db").display());
    let db = db::connect(&url, 5).await.expect("Failed to open test db");
    db::migrate(&db).await.expect("Failed to migrate test db");

    let clock = Arc::new(ManualClock::new(start_time()));
    let catalog = Catalog::with_clock(db.clone(), clock.clone(), CatalogSettings::default());
    TestCatalog {
        db,
        clock,
        catalog,
        _dir: Some(dir),
    }
}

pub fn new_course(name: &str, variant: CourseVariant) -> NewCourse {
    let pricing = Pricing {
        price: 120.0,
        currency: "USD".to_string(),
        offer_id: None,
    };
    let details = match variant {
        CourseVariant::Online => VariantDetails::Online(OnlineDetails {
            duration_hours: 20,
            validity_months: 12,
            pricing,
            faqs: vec![],
            discussion_groups: vec![],
        }),
        CourseVariant::Offline => VariantDetails::Offline(OfflineDetails {
            duration_days: 14,
            daily_class_minutes: 120,
            pricing,
            batches: vec![],
            enrollment_status: EnrollmentStatus::Open,
            refund_policy: None,
            materials: vec![],
            equipment: vec![],
        }),
        CourseVariant::Free => VariantDetails::Free(FreeDetails {
            duration_hours: 2,
            modules: vec![],
        }),
    };

    NewCourse {
        name: name.to_string(),
        description: format!("Hands-on introduction: {}.", name),
        level: CourseLevel::Beginner,
        language: "en".to_string(),
        instructors: vec![],
        outline: vec!["Getting started".to_string(), "Going further".to_string()],
        category: CategoryDetails {
            category: "programming".to_string(),
            subcategory: None,
            tags: vec![],
        },
        seo: SeoDetails::default(),
        features: AdditionalFeatures::default(),
        details,
    }
}

/// Enrollment opened yesterday, closes in five days, classes start in ten.
pub fn new_batch(now: DateTime<Utc>, max_student_count: u32) -> NewBatch {
    NewBatch {
        name: "Spring cohort".to_string(),
        instructors: vec![],
        start_date: now + TimeDelta::days(10),
        enrollment_start: now - TimeDelta::days(1),
        enrollment_end: now + TimeDelta::days(5),
        max_student_count,
        address: Address {
            line1: "12 Harbour Street".to_string(),
            line2: None,
            city: "Leeds".to_string(),
            state: None,
            postal_code: Some("LS1 4AB".to_string()),
            country: "GB".to_string(),
        },
    }
}

/// A published online course open for enrollment.
pub async fn available_online(t: &TestCatalog, name: &str) -> Course {
    let course = t
        .catalog
        .courses
        .create(new_course(name, CourseVariant::Online))
        .await
        .expect("Failed to create course");
    t.catalog
        .courses
        .change_status(CourseVariant::Online, course.id, CourseStatus::Available)
        .await
        .expect("Failed to publish course")
}

/// An offline course with one batch of the given capacity.
pub async fn offline_with_batch(t: &TestCatalog, name: &str, capacity: u32) -> (Course, Batch) {
    let course = t
        .catalog
        .courses
        .create(new_course(name, CourseVariant::Offline))
        .await
        .expect("Failed to create course");
    let batch = t
        .catalog
        .enrollments
        .create_batch(course.id, new_batch(t.clock.now(), capacity))
        .await
        .expect("Failed to create batch");
    let course = t
        .catalog
        .courses
        .get(CourseVariant::Offline, course.id)
        .await
        .expect("Failed to reload course");
    (course, batch)
}
