use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{delete, post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CatalogError;
use crate::models::*;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    q: Option<String>,
    status: Option<CourseStatus>,
    level: Option<CourseLevel>,
    category: Option<String>,
    subcategory: Option<String>,
    language: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    name: Option<String>,
    sort: Option<SortOrder>,
    #[serde(default)]
    visibility: Visibility,
    limit: Option<u32>,
    skip: Option<u32>,
}

impl ListParams {
    fn page(&self) -> Page {
        page_of(self.limit, self.skip)
    }

    fn filter(&self) -> CatalogFilter {
        CatalogFilter {
            status: self.status,
            level: self.level,
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            language: self.language.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            name_contains: self.name.clone(),
            visibility: self.visibility,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    limit: Option<u32>,
    skip: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct GetParams {
    #[serde(default)]
    include_deleted: bool,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: CourseStatus,
}

#[derive(Debug, Deserialize)]
struct EnrollRequest {
    learner_id: Uuid,
    batch_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct ModuleOrderRequest {
    module_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
struct TrendingResponse {
    score: f64,
}

#[derive(Debug, Serialize)]
struct PriceResponse {
    price: f64,
}

#[derive(Debug, Serialize)]
struct EnrollmentStatusResponse {
    enrollment_status: EnrollmentStatus,
}

fn page_of(limit: Option<u32>, skip: Option<u32>) -> Page {
    Page::new(limit.unwrap_or(DEFAULT_PAGE_LIMIT), skip.unwrap_or(0))
}

fn require_variant(variant: CourseVariant, expected: CourseVariant) -> Result<(), CatalogError> {
    if variant != expected {
        return Err(CatalogError::Validation(format!(
            "only {} courses support this operation",
            expected
        )));
    }
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", post(create_course))
        .route("/offers", post(create_offer))
        .route("/courses/{variant}", get(list_courses))
        .route("/courses/{variant}/popular", get(popular_courses))
        .route("/courses/{variant}/slug/{slug}", get(get_course_by_slug))
        .route("/courses/{variant}/{id}", get(get_course).delete(delete_course))
        .route("/courses/{variant}/{id}/sections", put(update_section))
        .route("/courses/{variant}/{id}/status", put(change_status))
        .route("/courses/{variant}/{id}/trending", post(recompute_trending))
        .route("/courses/{variant}/{id}/price", get(effective_price))
        .route(
            "/courses/{variant}/{id}/enrollments",
            get(list_enrollments).post(enroll_student),
        )
        .route(
            "/courses/{variant}/{id}/enrollment-status",
            post(update_enrollment_status),
        )
        .route("/courses/{variant}/{id}/reviews", get(list_reviews).post(add_review))
        .route("/courses/{variant}/{id}/reviews/{review_id}", delete(remove_review))
        .route("/courses/{variant}/{id}/batches", get(list_batches).post(create_batch))
        .route(
            "/courses/{variant}/{id}/batches/{batch_id}",
            put(add_batch).delete(remove_batch),
        )
        .route("/courses/{variant}/{id}/modules", get(list_modules).post(add_module))
        .route("/courses/{variant}/{id}/modules/order", put(reorder_modules))
        .route("/courses/{variant}/{id}/modules/{module_id}", delete(remove_module))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, CatalogError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<NewCourse>,
) -> Result<(StatusCode, Json<Course>), CatalogError> {
    let course = state.catalog.courses.create(req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn list_courses(
    State(state): State<AppState>,
    Path(variant): Path<CourseVariant>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Course>>, CatalogError> {
    let filter = params.filter();
    let courses = match params.sort {
        Some(sort) if params.q.is_none() => {
            state.catalog.courses.list(variant, &filter, sort, params.page()).await?
        }
        _ => {
            state
                .catalog
                .courses
                .search(variant, params.q.as_deref(), &filter, params.page())
                .await?
        }
    };
    Ok(Json(courses))
}

async fn popular_courses(
    State(state): State<AppState>,
    Path(variant): Path<CourseVariant>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<Course>>, CatalogError> {
    let page = page_of(params.limit, params.skip);
    let courses = state.catalog.courses.find_popular(variant, page).await?;
    Ok(Json(courses))
}

async fn get_course_by_slug(
    State(state): State<AppState>,
    Path((variant, slug)): Path<(CourseVariant, String)>,
) -> Result<Json<Course>, CatalogError> {
    let course = state.catalog.courses.get_by_slug(variant, &slug).await?;
    Ok(Json(course))
}

async fn get_course(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
    Query(params): Query<GetParams>,
) -> Result<Json<Course>, CatalogError> {
    let course = if params.include_deleted {
        state.catalog.courses.get_including_deleted(variant, id).await?
    } else {
        state.catalog.courses.get(variant, id).await?
    };
    Ok(Json(course))
}

async fn delete_course(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
) -> Result<Json<Course>, CatalogError> {
    let course = state.catalog.courses.soft_delete(variant, id).await?;
    Ok(Json(course))
}

async fn update_section(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
    Json(req): Json<SectionUpdate>,
) -> Result<Json<Course>, CatalogError> {
    let course = state.catalog.courses.update_section(variant, id, req).await?;
    Ok(Json(course))
}

async fn change_status(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Course>, CatalogError> {
    let course = state.catalog.courses.change_status(variant, id, req.status).await?;
    Ok(Json(course))
}

async fn recompute_trending(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
) -> Result<Json<TrendingResponse>, CatalogError> {
    let score = state.catalog.trending.recompute(variant, id).await?;
    Ok(Json(TrendingResponse { score }))
}

async fn effective_price(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
) -> Result<Json<PriceResponse>, CatalogError> {
    let price = state.catalog.courses.effective_price(variant, id).await?;
    Ok(Json(PriceResponse { price }))
}

async fn enroll_student(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
    Json(req): Json<EnrollRequest>,
) -> Result<Json<Course>, CatalogError> {
    let course = state
        .catalog
        .enrollments
        .enroll_student(variant, id, req.learner_id, req.batch_id)
        .await?;
    Ok(Json(course))
}

async fn list_enrollments(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
) -> Result<Json<Vec<Enrollment>>, CatalogError> {
    let enrollments = state.catalog.enrollments.enrollments(variant, id).await?;
    Ok(Json(enrollments))
}

async fn update_enrollment_status(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
) -> Result<Json<EnrollmentStatusResponse>, CatalogError> {
    require_variant(variant, CourseVariant::Offline)?;
    let enrollment_status = state.catalog.enrollments.update_enrollment_status(id).await?;
    Ok(Json(EnrollmentStatusResponse { enrollment_status }))
}

async fn list_reviews(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
) -> Result<Json<Vec<Review>>, CatalogError> {
    let reviews = state.catalog.reviews.reviews(variant, id).await?;
    Ok(Json(reviews))
}

async fn add_review(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
    Json(req): Json<NewReview>,
) -> Result<(StatusCode, Json<Course>), CatalogError> {
    let course = state.catalog.reviews.add_review(variant, id, req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn remove_review(
    State(state): State<AppState>,
    Path((variant, id, review_id)): Path<(CourseVariant, Uuid, Uuid)>,
) -> Result<Json<Course>, CatalogError> {
    let course = state.catalog.reviews.remove_review(variant, id, review_id).await?;
    Ok(Json(course))
}

async fn list_batches(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
) -> Result<Json<Vec<Batch>>, CatalogError> {
    require_variant(variant, CourseVariant::Offline)?;
    let batches = state.catalog.enrollments.batches(id).await?;
    Ok(Json(batches))
}

async fn create_batch(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
    Json(req): Json<NewBatch>,
) -> Result<(StatusCode, Json<Batch>), CatalogError> {
    require_variant(variant, CourseVariant::Offline)?;
    let batch = state.catalog.enrollments.create_batch(id, req).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

async fn add_batch(
    State(state): State<AppState>,
    Path((variant, id, batch_id)): Path<(CourseVariant, Uuid, Uuid)>,
) -> Result<Json<Course>, CatalogError> {
    require_variant(variant, CourseVariant::Offline)?;
    let course = state.catalog.enrollments.add_batch(id, batch_id).await?;
    Ok(Json(course))
}

async fn remove_batch(
    State(state): State<AppState>,
    Path((variant, id, batch_id)): Path<(CourseVariant, Uuid, Uuid)>,
) -> Result<Json<Course>, CatalogError> {
    require_variant(variant, CourseVariant::Offline)?;
    let course = state.catalog.enrollments.remove_batch(id, batch_id).await?;
    Ok(Json(course))
}

async fn list_modules(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
) -> Result<Json<Vec<CourseModule>>, CatalogError> {
    require_variant(variant, CourseVariant::Free)?;
    let modules = state.catalog.courses.modules(id).await?;
    Ok(Json(modules))
}

async fn add_module(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
    Json(req): Json<NewModule>,
) -> Result<(StatusCode, Json<CourseModule>), CatalogError> {
    require_variant(variant, CourseVariant::Free)?;
    let module = state.catalog.courses.add_module(id, req).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

async fn reorder_modules(
    State(state): State<AppState>,
    Path((variant, id)): Path<(CourseVariant, Uuid)>,
    Json(req): Json<ModuleOrderRequest>,
) -> Result<Json<Course>, CatalogError> {
    require_variant(variant, CourseVariant::Free)?;
    let course = state.catalog.courses.reorder_modules(id, req.module_ids).await?;
    Ok(Json(course))
}

async fn remove_module(
    State(state): State<AppState>,
    Path((variant, id, module_id)): Path<(CourseVariant, Uuid, Uuid)>,
) -> Result<Json<Course>, CatalogError> {
    require_variant(variant, CourseVariant::Free)?;
    let course = state.catalog.courses.remove_module(id, module_id).await?;
    Ok(Json(course))
}

async fn create_offer(
    State(state): State<AppState>,
    Json(req): Json<NewOffer>,
) -> Result<(StatusCode, Json<Offer>), CatalogError> {
    let offer = state.catalog.courses.create_offer(req).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}
