use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::CatalogContext;
use crate::db::courses;
use crate::domain::trending::recent_window_start;
use crate::domain::{TrendingInputs, is_fresh, trending_score};
use crate::error::CatalogError;
use crate::models::CourseVariant;

/// Enrollment counters consumed by the trending calculation.
#[async_trait]
pub trait EnrollmentActivity: Send + Sync {
    async fn enrollment_count(&self, course_id: Uuid) -> Result<i64, CatalogError>;
    async fn enrollments_since(
        &self,
        course_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, CatalogError>;
}

#[derive(Clone)]
pub struct TrendingService {
    ctx: CatalogContext,
    activity: Arc<dyn EnrollmentActivity>,
}

impl TrendingService {
    pub fn new(ctx: CatalogContext, activity: Arc<dyn EnrollmentActivity>) -> Self {
        Self { ctx, activity }
    }

    /// Recompute and store a course's trending score, or return the cached
    /// one while it is younger than the staleness window.
    ///
    /// A failing activity lookup leaves the stored score untouched.
    pub async fn recompute(&self, variant: CourseVariant, id: Uuid) -> Result<f64, CatalogError> {
        let course = self.ctx.load_course(variant, id).await?;
        let now = self.ctx.now();
        let window = self.ctx.settings.trending_staleness;

        if is_fresh(course.last_trending_update, now, window) {
            debug!("trending score for {} course {} is fresh, using cached value", variant, id);
            return Ok(course.trending_score);
        }

        let enrollment_count = self.ctx.store(self.activity.enrollment_count(id)).await?;
        let recent_enrollments = self
            .ctx
            .store(self.activity.enrollments_since(id, recent_window_start(now)))
            .await?;

        let score = trending_score(&TrendingInputs {
            enrollment_count,
            rating_average: course.rating.average,
            rating_count: course.rating.count,
            recent_enrollments,
        });

        let won = self
            .ctx
            .store(courses::set_trending_score(
                &self.ctx.db,
                variant,
                id,
                score,
                now,
                now - window,
            ))
            .await?;

        if won {
            info!("trending score for {} course {} recomputed: {}", variant, id, score);
            return Ok(score);
        }

        // Another writer refreshed the score first, or the course is gone.
        let current = self.ctx.load_course(variant, id).await?;
        debug!("trending score for {} course {} refreshed concurrently", variant, id);
        Ok(current.trending_score)
    }
}
