use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{CatalogContext, TrendingService};
use crate::db::courses;
use crate::db::reviews::{self, Detached};
use crate::domain::aggregate;
use crate::error::CatalogError;
use crate::models::{Course, CourseVariant, NewReview, Rating, Review};

#[derive(Clone)]
pub struct ReviewService {
    ctx: CatalogContext,
    trending: TrendingService,
}

impl ReviewService {
    pub fn new(ctx: CatalogContext, trending: TrendingService) -> Self {
        Self { ctx, trending }
    }

    /// Create a review and attach it with the re-aggregated rating in one
    /// store transaction, then recompute the trending score.
    pub async fn add_review(
        &self,
        variant: CourseVariant,
        id: Uuid,
        new: NewReview,
    ) -> Result<Course, CatalogError> {
        new.validate()?;

        let review = Review {
            id: Uuid::new_v4(),
            course_id: id,
            learner_id: new.learner_id,
            score: new.score,
            comment: new.comment.trim().to_string(),
            created_at: self.ctx.now(),
        };
        let course = self
            .ctx
            .store(reviews::attach(&self.ctx.db, variant, &review, self.ctx.now()))
            .await?
            .ok_or_else(|| CatalogError::course_not_found(id))?;
        info!(
            "review {} added to {} course {}, rated {} over {} reviews",
            review.id, variant, id, course.rating.average, course.rating.count
        );

        self.trending.recompute(variant, id).await?;
        self.ctx.load_course(variant, id).await
    }

    pub async fn remove_review(
        &self,
        variant: CourseVariant,
        id: Uuid,
        review_id: Uuid,
    ) -> Result<Course, CatalogError> {
        let detached = self
            .ctx
            .store(reviews::detach(&self.ctx.db, variant, id, review_id, self.ctx.now()))
            .await?;
        let course = match detached {
            Detached::Removed(course) => course,
            Detached::NotAttached => {
                return Err(CatalogError::NotFound(format!("review {}", review_id)));
            }
            Detached::CourseMissing => return Err(CatalogError::course_not_found(id)),
        };
        info!(
            "review {} removed from {} course {}, rated {} over {} reviews",
            review_id, variant, id, course.rating.average, course.rating.count
        );

        self.trending.recompute(variant, id).await?;
        self.ctx.load_course(variant, id).await
    }

    /// Re-aggregate the rating from the attached reviews that still exist,
    /// store it, then recompute the trending score.
    ///
    /// The write only lands if the review list is unchanged since it was read;
    /// otherwise the aggregate is recomputed, up to the configured retries.
    pub async fn refresh_rating(&self, variant: CourseVariant, id: Uuid) -> Result<Rating, CatalogError> {
        let attempts = self.ctx.settings.write_retries + 1;
        for attempt in 1..=attempts {
            let course = self.ctx.load_course(variant, id).await?;
            let attached = self
                .ctx
                .store(reviews::find_attached(&self.ctx.db, id, &course.reviews))
                .await?;
            let rating = aggregate(attached.iter().map(|r| r.score), self.ctx.now());

            let stored = self
                .ctx
                .store(courses::set_rating(&self.ctx.db, variant, id, &rating, course.version))
                .await?;
            if stored {
                info!(
                    "{} course {} rated {} over {} reviews",
                    variant, id, rating.average, rating.count
                );
                self.trending.recompute(variant, id).await?;
                return Ok(rating);
            }
            warn!(
                "{} course {} changed while its rating was refreshed (attempt {}/{})",
                variant, id, attempt, attempts
            );
            if attempt < attempts {
                self.ctx.backoff(attempt).await;
            }
        }

        Err(CatalogError::Conflict(format!(
            "rating of {} course {} kept changing",
            variant, id
        )))
    }

    pub async fn reviews(&self, variant: CourseVariant, id: Uuid) -> Result<Vec<Review>, CatalogError> {
        let course = self.ctx.load_course(variant, id).await?;
        self.ctx
            .store(reviews::find_attached(&self.ctx.db, id, &course.reviews))
            .await
    }
}
