use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::CatalogContext;
use crate::db::{courses, modules, offers, search_index};
use crate::domain::{apply_section, build_course, check_transition, validate_update};
use crate::error::CatalogError;
use crate::models::{
    CatalogFilter, Course, CourseLevel, CourseModule, CourseStatus, CourseVariant, NewCourse,
    NewModule, NewOffer, Offer, Page, SectionUpdate, SortOrder, VariantDetails, Visibility,
};

/// Course creation, section edits, lifecycle and catalog reads.
#[derive(Clone)]
pub struct CourseService {
    ctx: CatalogContext,
}

impl CourseService {
    pub fn new(ctx: CatalogContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, new: NewCourse) -> Result<Course, CatalogError> {
        let course = build_course(new, self.ctx.now())?;
        self.ctx.store(courses::insert(&self.ctx.db, &course)).await?;
        info!(
            "created {} course {} ({})",
            course.variant(),
            course.id,
            course.core.slug
        );
        Ok(course)
    }

    pub async fn get(&self, variant: CourseVariant, id: Uuid) -> Result<Course, CatalogError> {
        self.ctx.load_course(variant, id).await
    }

    pub async fn get_including_deleted(
        &self,
        variant: CourseVariant,
        id: Uuid,
    ) -> Result<Course, CatalogError> {
        self.ctx
            .load_course_with(variant, id, Visibility::IncludeDeleted)
            .await
    }

    pub async fn get_by_slug(&self, variant: CourseVariant, slug: &str) -> Result<Course, CatalogError> {
        self.ctx
            .store(courses::find_by_slug(&self.ctx.db, variant, slug))
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("course with slug '{}'", slug)))
    }

    pub async fn update_section(
        &self,
        variant: CourseVariant,
        id: Uuid,
        update: SectionUpdate,
    ) -> Result<Course, CatalogError> {
        validate_update(&update)?;
        if let SectionUpdate::Pricing(pricing) = &update {
            if let Some(offer_id) = pricing.offer_id {
                self.find_offer(offer_id).await?;
            }
        }

        let course = self
            .ctx
            .mutate_course(variant, id, |course| apply_section(course, &update))
            .await?;
        info!("updated {} of {} course {}", update.name(), variant, id);
        Ok(course)
    }

    pub async fn change_status(
        &self,
        variant: CourseVariant,
        id: Uuid,
        status: CourseStatus,
    ) -> Result<Course, CatalogError> {
        let mut from = None;
        let course = self
            .ctx
            .mutate_course(variant, id, |course| {
                check_transition(course, status)?;
                from = Some(course.status);
                course.status = status;
                Ok(())
            })
            .await?;
        if let Some(from) = from {
            info!("{} course {} moved from {} to {}", variant, id, from, status);
        }
        Ok(course)
    }

    pub async fn soft_delete(&self, variant: CourseVariant, id: Uuid) -> Result<Course, CatalogError> {
        let now = self.ctx.now();
        let deleted = self
            .ctx
            .store(courses::soft_delete(&self.ctx.db, variant, id, now))
            .await?;
        if !deleted {
            return Err(CatalogError::course_not_found(id));
        }
        info!("soft-deleted {} course {}", variant, id);
        self.get_including_deleted(variant, id).await
    }

    pub async fn list(
        &self,
        variant: CourseVariant,
        filter: &CatalogFilter,
        sort: SortOrder,
        page: Page,
    ) -> Result<Vec<Course>, CatalogError> {
        self.ctx
            .store(courses::find(&self.ctx.db, variant, filter, sort, page))
            .await
    }

    /// Free-text search ranked by field weight, or a filtered listing by
    /// trending score when no text is given.
    pub async fn search(
        &self,
        variant: CourseVariant,
        text: Option<&str>,
        filter: &CatalogFilter,
        page: Page,
    ) -> Result<Vec<Course>, CatalogError> {
        let expression = text.and_then(search_index::match_expression);
        match expression {
            Some(expression) => {
                self.ctx
                    .store(search_index::search(&self.ctx.db, variant, &expression, filter, page))
                    .await
            }
            None => self.list(variant, filter, SortOrder::TrendingDesc, page).await,
        }
    }

    pub async fn find_popular(&self, variant: CourseVariant, page: Page) -> Result<Vec<Course>, CatalogError> {
        let filter = CatalogFilter {
            status: Some(CourseStatus::Available),
            ..Default::default()
        };
        self.list(variant, &filter, SortOrder::TrendingDesc, page).await
    }

    pub async fn find_by_category(
        &self,
        variant: CourseVariant,
        category: &str,
        subcategory: Option<&str>,
        page: Page,
    ) -> Result<Vec<Course>, CatalogError> {
        let filter = CatalogFilter {
            category: Some(category.to_string()),
            subcategory: subcategory.map(str::to_string),
            ..Default::default()
        };
        self.list(variant, &filter, SortOrder::TrendingDesc, page).await
    }

    pub async fn find_by_status(
        &self,
        variant: CourseVariant,
        status: CourseStatus,
        page: Page,
    ) -> Result<Vec<Course>, CatalogError> {
        let filter = CatalogFilter {
            status: Some(status),
            ..Default::default()
        };
        self.list(variant, &filter, SortOrder::NewestFirst, page).await
    }

    pub async fn find_by_level(
        &self,
        variant: CourseVariant,
        level: CourseLevel,
        page: Page,
    ) -> Result<Vec<Course>, CatalogError> {
        let filter = CatalogFilter {
            level: Some(level),
            ..Default::default()
        };
        self.list(variant, &filter, SortOrder::TrendingDesc, page).await
    }

    pub async fn find_by_language(
        &self,
        variant: CourseVariant,
        language: &str,
        page: Page,
    ) -> Result<Vec<Course>, CatalogError> {
        let filter = CatalogFilter {
            language: Some(language.trim().to_lowercase()),
            ..Default::default()
        };
        self.list(variant, &filter, SortOrder::TrendingDesc, page).await
    }

    /// Case-insensitive substring match on the course name.
    pub async fn search_by_name(
        &self,
        variant: CourseVariant,
        name: &str,
        page: Page,
    ) -> Result<Vec<Course>, CatalogError> {
        let filter = CatalogFilter {
            name_contains: Some(name.trim().to_string()),
            ..Default::default()
        };
        self.list(variant, &filter, SortOrder::NameAsc, page).await
    }

    /// Ids of every live course of a variant.
    pub async fn live_ids(&self, variant: CourseVariant) -> Result<Vec<Uuid>, CatalogError> {
        self.ctx
            .store(courses::list_ids(&self.ctx.db, variant, Visibility::Live))
            .await
    }

    pub async fn add_module(&self, id: Uuid, new: NewModule) -> Result<CourseModule, CatalogError> {
        new.validate()?;
        // Fail before writing the module row when the course is missing.
        self.ctx.load_course(CourseVariant::Free, id).await?;

        let module = CourseModule {
            id: Uuid::new_v4(),
            course_id: id,
            title: new.title.trim().to_string(),
            summary: new.summary,
            duration_minutes: new.duration_minutes,
            created_at: self.ctx.now(),
        };
        self.ctx.store(modules::insert(&self.ctx.db, &module)).await?;

        self.ctx
            .mutate_course(CourseVariant::Free, id, |course| {
                free_modules(course)?.push(module.id);
                Ok(())
            })
            .await?;
        info!("added module {} to free course {}", module.id, id);
        Ok(module)
    }

    pub async fn remove_module(&self, id: Uuid, module_id: Uuid) -> Result<Course, CatalogError> {
        let course = self
            .ctx
            .mutate_course(CourseVariant::Free, id, |course| {
                let list = free_modules(course)?;
                let position = list
                    .iter()
                    .position(|m| *m == module_id)
                    .ok_or_else(|| CatalogError::NotFound(format!("module {}", module_id)))?;
                list.remove(position);
                Ok(())
            })
            .await?;
        self.ctx.store(modules::delete(&self.ctx.db, module_id)).await?;
        info!("removed module {} from free course {}", module_id, id);
        Ok(course)
    }

    /// Replace the module order. `order` must be a permutation of the
    /// current module list.
    pub async fn reorder_modules(&self, id: Uuid, order: Vec<Uuid>) -> Result<Course, CatalogError> {
        self.ctx
            .mutate_course(CourseVariant::Free, id, |course| {
                let list = free_modules(course)?;
                let mut current = list.clone();
                let mut requested = order.clone();
                current.sort();
                requested.sort();
                if current != requested {
                    return Err(CatalogError::Validation(
                        "module order must list every attached module exactly once".to_string(),
                    ));
                }
                *list = order.clone();
                Ok(())
            })
            .await
    }

    pub async fn modules(&self, id: Uuid) -> Result<Vec<CourseModule>, CatalogError> {
        let course = self.ctx.load_course(CourseVariant::Free, id).await?;
        self.ctx
            .store(modules::find_ordered(&self.ctx.db, id, course.modules()))
            .await
    }

    pub async fn create_offer(&self, new: NewOffer) -> Result<Offer, CatalogError> {
        new.validate()?;
        if new.valid_until <= new.valid_from {
            return Err(CatalogError::Validation(
                "valid_until must be after valid_from".to_string(),
            ));
        }

        let offer = Offer {
            id: Uuid::new_v4(),
            code: new.code.trim().to_uppercase(),
            discount_percent: new.discount_percent,
            valid_from: new.valid_from,
            valid_until: new.valid_until,
            created_at: self.ctx.now(),
        };
        self.ctx.store(offers::insert(&self.ctx.db, &offer)).await?;
        info!("created offer {} ({}%)", offer.code, offer.discount_percent);
        Ok(offer)
    }

    /// List price after any active offer. Free courses cost nothing; expired
    /// or missing offers are ignored.
    pub async fn effective_price(&self, variant: CourseVariant, id: Uuid) -> Result<f64, CatalogError> {
        let course = self.ctx.load_course(variant, id).await?;
        let Some(pricing) = course.details.pricing() else {
            return Ok(0.0);
        };

        let offer = match pricing.offer_id {
            Some(offer_id) => self.ctx.store(offers::find_by_id(&self.ctx.db, offer_id)).await?,
            None => None,
        };

        Ok(match offer {
            Some(offer) if offer.is_active(self.ctx.now()) => offer.apply(pricing.price),
            _ => pricing.price,
        })
    }

    async fn find_offer(&self, offer_id: Uuid) -> Result<Offer, CatalogError> {
        self.ctx
            .store(offers::find_by_id(&self.ctx.db, offer_id))
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("offer {}", offer_id)))
    }
}

fn free_modules(course: &mut Course) -> Result<&mut Vec<Uuid>, CatalogError> {
    match &mut course.details {
        VariantDetails::Free(d) => Ok(&mut d.modules),
        _ => Err(CatalogError::Validation(
            "modules only apply to free courses".to_string(),
        )),
    }
}
