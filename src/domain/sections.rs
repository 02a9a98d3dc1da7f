//! Building new courses and applying section-scoped partial updates.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::domain::slug::{fill_seo_defaults, slugify};
use crate::error::CatalogError;
use crate::models::{
    Course, CourseStatus, EnrollmentStatus, FeaturesUpdate, NewCourse, Rating, SectionUpdate,
    VariantDetails, SCHEMA_VERSION,
};

const NAME_MIN_CHARS: usize = 3;
const NAME_MAX_CHARS: usize = 100;

/// Validate a draft and turn it into a new `Draft` course.
pub fn build_course(mut new: NewCourse, now: DateTime<Utc>) -> Result<Course, CatalogError> {
    new.name = checked_name(&new.name)?.to_string();
    new.validate()?;
    validate_details(&new.details)?;
    if new.category.category.trim().is_empty() {
        return Err(CatalogError::Validation("category is required".to_string()));
    }
    if !new.details.variant_is_empty() {
        return Err(CatalogError::Validation(
            "batches and modules are attached after the course is created".to_string(),
        ));
    }

    let name = new.name;
    let slug = slug_for(&name)?;
    let mut details = new.details;
    if let VariantDetails::Offline(d) = &mut details {
        d.enrollment_status = EnrollmentStatus::Open;
    }

    let mut course = Course {
        id: Uuid::new_v4(),
        core: crate::models::CoreDetails {
            name,
            slug,
            description: new.description.trim().to_string(),
            level: new.level,
            language: new.language.trim().to_lowercase(),
            instructors: dedup(new.instructors),
            outline: new.outline,
        },
        category: new.category,
        seo: new.seo,
        features: new.features,
        status: CourseStatus::Draft,
        details,
        reviews: Vec::new(),
        rating: Rating::default(),
        trending_score: 0.0,
        last_trending_update: None,
        deleted_at: None,
        schema_version: SCHEMA_VERSION,
        version: 1,
        created_at: now,
        updated_at: now,
    };
    let variant = course.variant();
    fill_seo_defaults(&mut course.seo, &course.core.name, &course.core.description, variant);
    Ok(course)
}

/// The trimmed name, if it is 3 to 100 characters long.
fn checked_name(raw: &str) -> Result<&str, CatalogError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(CatalogError::Validation(format!(
            "name must be {}-{} characters, got {}",
            NAME_MIN_CHARS, NAME_MAX_CHARS, len
        )));
    }
    Ok(name)
}

/// Shape checks that need no stored state.
pub fn validate_update(update: &SectionUpdate) -> Result<(), CatalogError> {
    match update {
        SectionUpdate::CoreDetails(u) => {
            u.validate()?;
            if let Some(name) = &u.name {
                checked_name(name)?;
            }
        }
        SectionUpdate::Pricing(u) => {
            u.validate()?;
            if u.offer_id.is_some() && u.remove_offer {
                return Err(CatalogError::Validation(
                    "offer_id and remove_offer are mutually exclusive".to_string(),
                ));
            }
        }
        SectionUpdate::Seo(u) => u.validate()?,
        SectionUpdate::Category(u) => u.validate()?,
        SectionUpdate::AdditionalFeatures(u) => {
            let zero = [u.duration_hours, u.validity_months, u.duration_days, u.daily_class_minutes]
                .iter()
                .any(|v| *v == Some(0));
            if zero {
                return Err(CatalogError::Validation("durations must be positive".to_string()));
            }
        }
    }
    Ok(())
}

/// Apply `update` to `course` in place.
///
/// The slug is regenerated only when the name changes; absent SEO fields are
/// filled afterwards, explicit ones are left alone.
pub fn apply_section(course: &mut Course, update: &SectionUpdate) -> Result<(), CatalogError> {
    match update {
        SectionUpdate::CoreDetails(u) => {
            if let Some(name) = &u.name {
                let name = checked_name(name)?;
                if name != course.core.name {
                    course.core.slug = slug_for(name)?;
                    course.core.name = name.to_string();
                }
            }
            if let Some(description) = &u.description {
                course.core.description = description.trim().to_string();
            }
            if let Some(level) = u.level {
                course.core.level = level;
            }
            if let Some(language) = &u.language {
                course.core.language = language.trim().to_lowercase();
            }
            if let Some(instructors) = &u.instructors {
                course.core.instructors = dedup(instructors.clone());
            }
            if let Some(outline) = &u.outline {
                course.core.outline = outline.clone();
            }
        }
        SectionUpdate::Pricing(u) => {
            let pricing = course.details.pricing_mut().ok_or_else(|| {
                CatalogError::Validation("free courses have no pricing".to_string())
            })?;
            if let Some(price) = u.price {
                pricing.price = price;
            }
            if let Some(currency) = &u.currency {
                pricing.currency = currency.to_uppercase();
            }
            if let Some(offer_id) = u.offer_id {
                pricing.offer_id = Some(offer_id);
            }
            if u.remove_offer {
                pricing.offer_id = None;
            }
        }
        SectionUpdate::Seo(u) => {
            if let Some(title) = &u.title {
                course.seo.title = non_blank(title);
            }
            if let Some(description) = &u.description {
                course.seo.description = non_blank(description);
            }
            if let Some(keywords) = &u.keywords {
                course.seo.keywords = keywords.clone();
            }
        }
        SectionUpdate::Category(u) => {
            if let Some(category) = &u.category {
                course.category.category = category.trim().to_string();
            }
            if let Some(subcategory) = &u.subcategory {
                course.category.subcategory = non_blank(subcategory);
            }
            if let Some(tags) = &u.tags {
                course.category.tags = tags.clone();
            }
        }
        SectionUpdate::AdditionalFeatures(u) => apply_features(course, u)?,
    }

    let variant = course.variant();
    fill_seo_defaults(&mut course.seo, &course.core.name, &course.core.description, variant);
    Ok(())
}

fn apply_features(course: &mut Course, u: &FeaturesUpdate) -> Result<(), CatalogError> {
    if let Some(certificate) = u.certificate {
        course.features.certificate = certificate;
    }
    if let Some(prerequisites) = &u.prerequisites {
        course.features.prerequisites = prerequisites.clone();
    }
    if let Some(outcomes) = &u.learning_outcomes {
        course.features.learning_outcomes = outcomes.clone();
    }

    let variant = course.variant();
    let mismatch = |field: &str| {
        CatalogError::Validation(format!("{} does not apply to {} courses", field, variant))
    };

    match &mut course.details {
        VariantDetails::Online(d) => {
            if u.duration_days.is_some() || u.daily_class_minutes.is_some() {
                return Err(mismatch("duration_days/daily_class_minutes"));
            }
            if u.refund_policy.is_some() || u.materials.is_some() || u.equipment.is_some() {
                return Err(mismatch("refund_policy/materials/equipment"));
            }
            if let Some(hours) = u.duration_hours {
                d.duration_hours = hours;
            }
            if let Some(months) = u.validity_months {
                d.validity_months = months;
            }
            if let Some(faqs) = &u.faqs {
                d.faqs = faqs.clone();
            }
            if let Some(groups) = &u.discussion_groups {
                d.discussion_groups = groups.clone();
            }
        }
        VariantDetails::Offline(d) => {
            if u.duration_hours.is_some() || u.validity_months.is_some() {
                return Err(mismatch("duration_hours/validity_months"));
            }
            if u.faqs.is_some() || u.discussion_groups.is_some() {
                return Err(mismatch("faqs/discussion_groups"));
            }
            if let Some(days) = u.duration_days {
                d.duration_days = days;
            }
            if let Some(minutes) = u.daily_class_minutes {
                d.daily_class_minutes = minutes;
            }
            if let Some(policy) = &u.refund_policy {
                d.refund_policy = non_blank(policy);
            }
            if let Some(materials) = &u.materials {
                d.materials = materials.clone();
            }
            if let Some(equipment) = &u.equipment {
                d.equipment = equipment.clone();
            }
        }
        VariantDetails::Free(d) => {
            if u.validity_months.is_some()
                || u.duration_days.is_some()
                || u.daily_class_minutes.is_some()
                || u.faqs.is_some()
                || u.discussion_groups.is_some()
                || u.refund_policy.is_some()
                || u.materials.is_some()
                || u.equipment.is_some()
            {
                return Err(mismatch("only duration_hours"));
            }
            if let Some(hours) = u.duration_hours {
                d.duration_hours = hours;
            }
        }
    }
    Ok(())
}

fn validate_details(details: &VariantDetails) -> Result<(), CatalogError> {
    match details {
        VariantDetails::Online(d) => {
            d.pricing.validate()?;
            if d.duration_hours == 0 || d.validity_months == 0 {
                return Err(CatalogError::Validation(
                    "duration_hours and validity_months must be positive".to_string(),
                ));
            }
        }
        VariantDetails::Offline(d) => {
            d.pricing.validate()?;
            if d.duration_days == 0 || d.daily_class_minutes == 0 {
                return Err(CatalogError::Validation(
                    "duration_days and daily_class_minutes must be positive".to_string(),
                ));
            }
        }
        VariantDetails::Free(d) => {
            if d.duration_hours == 0 {
                return Err(CatalogError::Validation(
                    "duration_hours must be positive".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn slug_for(name: &str) -> Result<String, CatalogError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(CatalogError::Validation(
            "name must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() { None } else { Some(value.to_string()) }
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
