use chrono::TimeDelta;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::{CatalogContext, TrendingService};
use crate::db::{batches, enrollments};
use crate::domain::derive_status;
use crate::error::CatalogError;
use crate::models::{
    Batch, Course, CourseStatus, CourseVariant, EnrollOutcome, Enrollment, EnrollmentStatus,
    NewBatch, VariantDetails,
};

/// Enrollment and batch management.
#[derive(Clone)]
pub struct EnrollmentService {
    ctx: CatalogContext,
    trending: TrendingService,
}

impl EnrollmentService {
    pub fn new(ctx: CatalogContext, trending: TrendingService) -> Self {
        Self { ctx, trending }
    }

    /// Enroll a learner, optionally into a batch of an offline course.
    ///
    /// Re-enrolling an enrolled learner is a no-op. Seats are claimed with a
    /// conditional update, so a batch never exceeds its capacity however many
    /// callers race for the last seat.
    pub async fn enroll_student(
        &self,
        variant: CourseVariant,
        id: Uuid,
        learner_id: Uuid,
        batch_id: Option<Uuid>,
    ) -> Result<Course, CatalogError> {
        if variant != CourseVariant::Offline && batch_id.is_some() {
            return Err(CatalogError::Validation(format!(
                "{} courses have no batches",
                variant
            )));
        }

        let course = self.ctx.load_course(variant, id).await?;
        let existing = self
            .ctx
            .store(enrollments::find(&self.ctx.db, id, learner_id))
            .await?;
        if existing.is_some() {
            debug!("learner {} already enrolled in {} course {}", learner_id, variant, id);
            return Ok(course);
        }

        match variant {
            CourseVariant::Offline => self.check_offline_open(&course, batch_id).await?,
            _ => {
                if course.status != CourseStatus::Available {
                    return Err(CatalogError::NotOpen(format!(
                        "course is {}",
                        course.status
                    )));
                }
            }
        }

        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            course_id: id,
            variant,
            learner_id,
            batch_id,
            enrolled_at: self.ctx.now(),
        };
        match self
            .ctx
            .store(enrollments::enroll(&self.ctx.db, &enrollment))
            .await?
        {
            EnrollOutcome::Enrolled => {
                info!(
                    "enrolled learner {} in {} course {} (batch {:?})",
                    learner_id, variant, id, batch_id
                );
            }
            EnrollOutcome::AlreadyEnrolled => {
                debug!("learner {} enrolled concurrently in course {}", learner_id, id);
                return self.ctx.load_course(variant, id).await;
            }
            EnrollOutcome::BatchFull => {
                return Err(match batch_id {
                    Some(batch_id) => CatalogError::BatchFull(batch_id),
                    None => CatalogError::Conflict(format!("enrollment in course {} was rejected", id)),
                });
            }
        }

        if variant == CourseVariant::Offline {
            self.update_enrollment_status(id).await?;
        }
        self.trending.recompute(variant, id).await?;
        self.ctx.load_course(variant, id).await
    }

    /// Batch existence, then capacity, then the course-level window, then
    /// the batch's own enrollment start.
    async fn check_offline_open(&self, course: &Course, batch_id: Option<Uuid>) -> Result<(), CatalogError> {
        if let Some(batch_id) = batch_id {
            if !course.batches().contains(&batch_id) {
                return Err(CatalogError::BatchNotFound(batch_id));
            }
        }

        let attached = self
            .ctx
            .store(batches::find_for_course(&self.ctx.db, course.id, course.batches()))
            .await?;

        let now = self.ctx.now();
        let mut target = None;
        if let Some(batch_id) = batch_id {
            let batch = attached
                .iter()
                .find(|b| b.id == batch_id)
                .ok_or(CatalogError::BatchNotFound(batch_id))?;
            if batch.is_full {
                return Err(CatalogError::BatchFull(batch_id));
            }
            target = Some(batch);
        }

        let current = course.enrollment_status().unwrap_or_default();
        let status = derive_status(current, &attached, now);
        if status != current {
            self.persist_status(course.id, &attached).await?;
        }
        if status != EnrollmentStatus::Open {
            return Err(CatalogError::NotOpen(format!("enrollment is {}", status)));
        }
        if let Some(batch) = target.filter(|b| b.enrollment_not_yet_open(now)) {
            return Err(CatalogError::NotOpen(format!(
                "enrollment for batch {} opens at {}",
                batch.id, batch.enrollment_start
            )));
        }
        Ok(())
    }

    /// Create a batch for an offline course and attach it. The end date is
    /// the start date plus the course duration.
    pub async fn create_batch(&self, id: Uuid, new: NewBatch) -> Result<Batch, CatalogError> {
        new.validate()?;
        if new.enrollment_end < new.enrollment_start {
            return Err(CatalogError::Validation(
                "enrollment_end must not precede enrollment_start".to_string(),
            ));
        }

        let course = self.ctx.load_course(CourseVariant::Offline, id).await?;
        let duration_days = match &course.details {
            VariantDetails::Offline(d) => d.duration_days,
            _ => 0,
        };

        let batch = Batch {
            id: Uuid::new_v4(),
            course_id: id,
            name: new.name.trim().to_string(),
            instructors: new.instructors,
            start_date: new.start_date,
            end_date: new.start_date + TimeDelta::days(i64::from(duration_days)),
            enrollment_start: new.enrollment_start,
            enrollment_end: new.enrollment_end,
            max_student_count: new.max_student_count,
            enrolled_count: 0,
            is_full: false,
            address: new.address,
            created_at: self.ctx.now(),
        };
        self.ctx.store(batches::insert(&self.ctx.db, &batch)).await?;
        self.add_batch(id, batch.id).await?;
        Ok(batch)
    }

    /// Attach an existing batch. Attaching it twice changes nothing.
    pub async fn add_batch(&self, id: Uuid, batch_id: Uuid) -> Result<Course, CatalogError> {
        let batch = self
            .ctx
            .store(batches::find_by_id(&self.ctx.db, batch_id))
            .await?
            .filter(|b| b.course_id == id)
            .ok_or(CatalogError::BatchNotFound(batch_id))?;

        let course = self.ctx.load_course(CourseVariant::Offline, id).await?;
        if course.batches().contains(&batch.id) {
            return Ok(course);
        }

        let course = self
            .ctx
            .mutate_course(CourseVariant::Offline, id, |course| {
                let list = offline_batches(course)?;
                if !list.contains(&batch_id) {
                    list.push(batch_id);
                }
                Ok(())
            })
            .await?;
        info!("attached batch {} to offline course {}", batch_id, id);
        Ok(course)
    }

    /// Detach a batch. The batch row and its enrollments are kept.
    pub async fn remove_batch(&self, id: Uuid, batch_id: Uuid) -> Result<Course, CatalogError> {
        let course = self.ctx.load_course(CourseVariant::Offline, id).await?;
        if !course.batches().contains(&batch_id) {
            return Ok(course);
        }

        let course = self
            .ctx
            .mutate_course(CourseVariant::Offline, id, |course| {
                offline_batches(course)?.retain(|b| *b != batch_id);
                Ok(())
            })
            .await?;
        info!("detached batch {} from offline course {}", batch_id, id);
        Ok(course)
    }

    /// Re-derive an offline course's enrollment status from its batches and
    /// the current time. Idempotent.
    pub async fn update_enrollment_status(&self, id: Uuid) -> Result<EnrollmentStatus, CatalogError> {
        let course = self.ctx.load_course(CourseVariant::Offline, id).await?;
        let attached = self
            .ctx
            .store(batches::find_for_course(&self.ctx.db, id, course.batches()))
            .await?;

        let current = course.enrollment_status().unwrap_or_default();
        let derived = derive_status(current, &attached, self.ctx.now());
        if derived == current {
            return Ok(current);
        }
        self.persist_status(id, &attached).await
    }

    async fn persist_status(&self, id: Uuid, attached: &[Batch]) -> Result<EnrollmentStatus, CatalogError> {
        let now = self.ctx.now();
        let mut status = EnrollmentStatus::Open;
        self.ctx
            .mutate_course(CourseVariant::Offline, id, |course| {
                if let VariantDetails::Offline(d) = &mut course.details {
                    d.enrollment_status = derive_status(d.enrollment_status, attached, now);
                    status = d.enrollment_status;
                }
                Ok(())
            })
            .await?;
        info!("offline course {} enrollment is now {}", id, status);
        Ok(status)
    }

    pub async fn batches(&self, id: Uuid) -> Result<Vec<Batch>, CatalogError> {
        let course = self.ctx.load_course(CourseVariant::Offline, id).await?;
        self.ctx
            .store(batches::find_for_course(&self.ctx.db, id, course.batches()))
            .await
    }

    pub async fn enrollments(&self, variant: CourseVariant, id: Uuid) -> Result<Vec<Enrollment>, CatalogError> {
        self.ctx.load_course(variant, id).await?;
        self.ctx
            .store(enrollments::list_for_course(&self.ctx.db, id))
            .await
    }
}

fn offline_batches(course: &mut Course) -> Result<&mut Vec<Uuid>, CatalogError> {
    match &mut course.details {
        VariantDetails::Offline(d) => Ok(&mut d.batches),
        _ => Err(CatalogError::Validation(
            "batches only apply to offline courses".to_string(),
        )),
    }
}
