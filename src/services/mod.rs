pub mod course_service;
pub mod enrollment_service;
pub mod review_service;
pub mod scheduler;
pub mod trending_service;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::db::{courses, enrollments::SqliteEnrollmentActivity};
use crate::domain::trending::DEFAULT_STALENESS_HOURS;
use crate::error::CatalogError;
use crate::models::{Course, CourseVariant, Visibility};

pub use course_service::CourseService;
pub use enrollment_service::EnrollmentService;
pub use review_service::ReviewService;
pub use scheduler::{CatalogScheduler, RefreshStats};
pub use trending_service::{EnrollmentActivity, TrendingService};

const RETRY_BACKOFF_MS: u64 = 10;

#[derive(Clone, Debug)]
pub struct CatalogSettings {
    /// Upper bound for a single store call.
    pub store_timeout: Duration,
    /// How long a trending score is served before being recomputed.
    pub trending_staleness: TimeDelta,
    /// Extra attempts after a version conflict on a section write.
    pub write_retries: u32,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            trending_staleness: TimeDelta::hours(DEFAULT_STALENESS_HOURS),
            write_retries: 3,
        }
    }
}

/// Handles shared by every service: the store, the clock and the settings.
#[derive(Clone)]
pub struct CatalogContext {
    pub db: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub settings: CatalogSettings,
}

impl CatalogContext {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run a store call under the configured timeout.
    ///
    /// An expired call is dropped (rolling back any open transaction) and
    /// reported as `StoreUnavailable`.
    pub async fn store<T, E, F>(&self, call: F) -> Result<T, CatalogError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<CatalogError>,
    {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(CatalogError::StoreUnavailable(format!(
                "store call timed out after {:?}",
                self.settings.store_timeout
            ))),
        }
    }

    pub async fn load_course(&self, variant: CourseVariant, id: Uuid) -> Result<Course, CatalogError> {
        self.load_course_with(variant, id, Visibility::Live).await
    }

    pub async fn load_course_with(
        &self,
        variant: CourseVariant,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Course, CatalogError> {
        self.store(courses::find_by_id(&self.db, variant, id, visibility))
            .await?
            .ok_or_else(|| CatalogError::course_not_found(id))
    }

    /// Pause before retrying a lost write. Grows with the attempt, plus a
    /// random few milliseconds so racing writers drift apart.
    pub async fn backoff(&self, attempt: u32) {
        let spread = (Uuid::new_v4().as_u128() % 5) as u64;
        let millis = RETRY_BACKOFF_MS * u64::from(attempt) + spread;
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    /// Read-modify-write of a live course guarded by its version.
    ///
    /// `apply` runs against a fresh copy on every attempt, so it must be
    /// deterministic in the course it is given. Gives up with `Conflict` once
    /// the retries are spent, backing off between attempts.
    pub async fn mutate_course<F>(
        &self,
        variant: CourseVariant,
        id: Uuid,
        mut apply: F,
    ) -> Result<Course, CatalogError>
    where
        F: FnMut(&mut Course) -> Result<(), CatalogError>,
    {
        let attempts = self.settings.write_retries + 1;
        for attempt in 1..=attempts {
            let mut course = self.load_course(variant, id).await?;
            let expected = course.version;
            apply(&mut course)?;
            course.version = expected + 1;
            course.updated_at = self.now();

            if self.store(courses::save(&self.db, &course, expected)).await? {
                return Ok(course);
            }
            warn!(
                "version conflict on {} course {} (attempt {}/{})",
                variant, id, attempt, attempts
            );
            if attempt < attempts {
                self.backoff(attempt).await;
            }
        }

        Err(CatalogError::Conflict(format!(
            "{} course {} was modified concurrently",
            variant, id
        )))
    }
}

/// The catalog core: every service wired to the same store and clock.
#[derive(Clone)]
pub struct Catalog {
    pub courses: CourseService,
    pub enrollments: EnrollmentService,
    pub reviews: ReviewService,
    pub trending: TrendingService,
}

impl Catalog {
    pub fn new(db: SqlitePool, settings: CatalogSettings) -> Self {
        Self::with_clock(db, Arc::new(SystemClock), settings)
    }

    pub fn with_clock(db: SqlitePool, clock: Arc<dyn Clock>, settings: CatalogSettings) -> Self {
        let activity = Arc::new(SqliteEnrollmentActivity::new(db.clone()));
        Self::with_activity(db, clock, settings, activity)
    }

    pub fn with_activity(
        db: SqlitePool,
        clock: Arc<dyn Clock>,
        settings: CatalogSettings,
        activity: Arc<dyn EnrollmentActivity>,
    ) -> Self {
        let ctx = CatalogContext { db, clock, settings };
        let trending = TrendingService::new(ctx.clone(), activity);
        Self {
            courses: CourseService::new(ctx.clone()),
            enrollments: EnrollmentService::new(ctx.clone(), trending.clone()),
            reviews: ReviewService::new(ctx, trending.clone()),
            trending,
        }
    }
}
