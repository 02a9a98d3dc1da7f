use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{filter, from_json, parse_enum, parse_id, search_index, to_json};
use crate::models::{
    AdditionalFeatures, CatalogFilter, CategoryDetails, CoreDetails, Course, CourseVariant, Page,
    Rating, SeoDetails, SortOrder, VariantDetails, Visibility,
};

pub(crate) const COURSE_COLUMNS: &str = "c.id, c.name, c.slug, c.status, c.level, c.language, \
    c.category, c.subcategory, c.rating_average, c.rating_count, c.rating_updated_at, \
    c.trending_score, c.last_trending_update, c.deleted_at, c.schema_version, c.version, \
    c.created_at, c.updated_at, c.document";

/// Nested sections stored in the `document` column.
#[derive(Debug, Serialize, Deserialize)]
struct CourseDocument {
    description: String,
    instructors: Vec<Uuid>,
    outline: Vec<String>,
    tags: Vec<String>,
    seo: SeoDetails,
    features: AdditionalFeatures,
    reviews: Vec<Uuid>,
    details: VariantDetails,
}

#[derive(Debug, FromRow)]
pub(crate) struct CourseRow {
    id: String,
    name: String,
    slug: String,
    status: String,
    level: String,
    language: String,
    category: String,
    subcategory: Option<String>,
    rating_average: f64,
    rating_count: i64,
    rating_updated_at: Option<DateTime<Utc>>,
    trending_score: f64,
    last_trending_update: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    schema_version: i32,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    document: String,
}

impl TryFrom<CourseRow> for Course {
    type Error = sqlx::Error;

    fn try_from(row: CourseRow) -> Result<Self, Self::Error> {
        let doc: CourseDocument = from_json(&row.document)?;
        Ok(Course {
            id: parse_id(&row.id)?,
            core: CoreDetails {
                name: row.name,
                slug: row.slug,
                description: doc.description,
                level: parse_enum(&row.level)?,
                language: row.language,
                instructors: doc.instructors,
                outline: doc.outline,
            },
            category: CategoryDetails {
                category: row.category,
                subcategory: row.subcategory,
                tags: doc.tags,
            },
            seo: doc.seo,
            features: doc.features,
            status: parse_enum(&row.status)?,
            details: doc.details,
            reviews: doc.reviews,
            rating: Rating {
                average: row.rating_average,
                count: row.rating_count,
                last_updated: row.rating_updated_at,
            },
            trending_score: row.trending_score,
            last_trending_update: row.last_trending_update,
            deleted_at: row.deleted_at,
            schema_version: row.schema_version,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn document_of(course: &Course) -> Result<String, sqlx::Error> {
    to_json(&CourseDocument {
        description: course.core.description.clone(),
        instructors: course.core.instructors.clone(),
        outline: course.core.outline.clone(),
        tags: course.category.tags.clone(),
        seo: course.seo.clone(),
        features: course.features.clone(),
        reviews: course.reviews.clone(),
        details: course.details.clone(),
    })
}

fn into_courses(rows: Vec<CourseRow>) -> Result<Vec<Course>, sqlx::Error> {
    rows.into_iter().map(Course::try_from).collect()
}

/// Insert a new course and its search entry in one transaction.
pub async fn insert(db: &SqlitePool, course: &Course) -> Result<(), sqlx::Error> {
    let variant = course.variant();
    let document = document_of(course)?;
    let mut tx = db.begin().await?;

    sqlx::query(&format!(
        r#"
        INSERT INTO {}
            (id, name, slug, status, level, language, category, subcategory, price,
            rating_average, rating_count, rating_updated_at, trending_score,
            last_trending_update, deleted_at, schema_version, version,
            created_at, updated_at, document)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        variant.table()
    ))
    .bind(course.id.to_string())
    .bind(&course.core.name)
    .bind(&course.core.slug)
    .bind(course.status.as_str())
    .bind(course.core.level.as_str())
    .bind(&course.core.language)
    .bind(&course.category.category)
    .bind(&course.category.subcategory)
    .bind(course.price())
    .bind(course.rating.average)
    .bind(course.rating.count)
    .bind(course.rating.last_updated)
    .bind(course.trending_score)
    .bind(course.last_trending_update)
    .bind(course.deleted_at)
    .bind(course.schema_version)
    .bind(course.version)
    .bind(course.created_at)
    .bind(course.updated_at)
    .bind(document)
    .execute(&mut *tx)
    .await?;

    search_index::reindex(&mut *tx, course).await?;
    tx.commit().await?;
    Ok(())
}

/// Compare-and-swap write of a live course's sections.
///
/// Succeeds only if the stored row still has `expected_version`; returns
/// `false` otherwise and leaves the row untouched. The search entry is
/// rewritten in the same transaction.
pub async fn save(db: &SqlitePool, course: &Course, expected_version: i64) -> Result<bool, sqlx::Error> {
    let variant = course.variant();
    let document = document_of(course)?;
    let mut tx = db.begin().await?;

    let updated = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET name = ?, slug = ?, status = ?, level = ?, language = ?,
            category = ?, subcategory = ?, price = ?, document = ?,
            updated_at = ?, version = ?
        WHERE id = ? AND version = ? AND deleted_at IS NULL
        "#,
        variant.table()
    ))
    .bind(&course.core.name)
    .bind(&course.core.slug)
    .bind(course.status.as_str())
    .bind(course.core.level.as_str())
    .bind(&course.core.language)
    .bind(&course.category.category)
    .bind(&course.category.subcategory)
    .bind(course.price())
    .bind(document)
    .bind(course.updated_at)
    .bind(course.version)
    .bind(course.id.to_string())
    .bind(expected_version)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    search_index::reindex(&mut *tx, course).await?;
    tx.commit().await?;
    Ok(true)
}

pub async fn find_by_id(
    db: &SqlitePool,
    variant: CourseVariant,
    id: Uuid,
    visibility: Visibility,
) -> Result<Option<Course>, sqlx::Error> {
    let mut conn = db.acquire().await?;
    find_by_id_on(&mut conn, variant, id, visibility).await
}

/// Same as [`find_by_id`], on a caller-held connection or transaction.
pub async fn find_by_id_on(
    conn: &mut SqliteConnection,
    variant: CourseVariant,
    id: Uuid,
    visibility: Visibility,
) -> Result<Option<Course>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM {} c WHERE c.id = ",
        COURSE_COLUMNS,
        variant.table()
    ));
    qb.push_bind(id.to_string());
    if let Some(clause) = filter::visibility_clause(visibility, "c") {
        qb.push(" AND ").push(clause);
    }

    qb.build_query_as::<CourseRow>()
        .fetch_optional(&mut *conn)
        .await?
        .map(Course::try_from)
        .transpose()
}

pub async fn find_by_slug(
    db: &SqlitePool,
    variant: CourseVariant,
    slug: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, CourseRow>(&format!(
        "SELECT {} FROM {} c WHERE c.slug = ? AND c.deleted_at IS NULL",
        COURSE_COLUMNS,
        variant.table()
    ))
    .bind(slug)
    .fetch_optional(db)
    .await?
    .map(Course::try_from)
    .transpose()
}

/// Filtered, sorted, paginated listing.
pub async fn find(
    db: &SqlitePool,
    variant: CourseVariant,
    catalog_filter: &CatalogFilter,
    sort: SortOrder,
    page: Page,
) -> Result<Vec<Course>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM {} c WHERE 1 = 1",
        COURSE_COLUMNS,
        variant.table()
    ));
    filter::push_filters(&mut qb, catalog_filter, "c");
    qb.push(filter::order_clause(sort, "c"));
    qb.push(" LIMIT ").push_bind(i64::from(page.limit));
    qb.push(" OFFSET ").push_bind(i64::from(page.skip));

    let rows = qb.build_query_as::<CourseRow>().fetch_all(db).await?;
    into_courses(rows)
}

pub async fn list_ids(
    db: &SqlitePool,
    variant: CourseVariant,
    visibility: Visibility,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let mut sql = format!("SELECT c.id FROM {} c", variant.table());
    if let Some(clause) = filter::visibility_clause(visibility, "c") {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
    let ids: Vec<String> = sqlx::query_scalar(&sql).fetch_all(db).await?;
    ids.iter().map(|id| parse_id(id)).collect()
}

/// Store a recomputed trending score unless another writer refreshed it after
/// `stale_before`. Returns whether this write won.
pub async fn set_trending_score(
    db: &SqlitePool,
    variant: CourseVariant,
    id: Uuid,
    score: f64,
    computed_at: DateTime<Utc>,
    stale_before: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET trending_score = ?, last_trending_update = ?
        WHERE id = ?
          AND deleted_at IS NULL
          AND (last_trending_update IS NULL OR last_trending_update <= ?)
        "#,
        variant.table()
    ))
    .bind(score)
    .bind(computed_at)
    .bind(id.to_string())
    .bind(stale_before)
    .execute(db)
    .await?
    .rows_affected();

    Ok(updated > 0)
}

/// Store a re-aggregated rating if the course still has `expected_version`.
///
/// The version is left as is: a rating write changes no section. Every change
/// to the review list bumps the version, so a rating computed from an older
/// list never lands.
pub async fn set_rating(
    db: &SqlitePool,
    variant: CourseVariant,
    id: Uuid,
    rating: &Rating,
    expected_version: i64,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET rating_average = ?, rating_count = ?, rating_updated_at = ?
        WHERE id = ? AND version = ? AND deleted_at IS NULL
        "#,
        variant.table()
    ))
    .bind(rating.average)
    .bind(rating.count)
    .bind(rating.last_updated)
    .bind(id.to_string())
    .bind(expected_version)
    .execute(db)
    .await?
    .rows_affected();

    Ok(updated > 0)
}

/// Write the review list and the rating of a live course in the caller's
/// transaction, guarded by `expected_version`. Reviews are not indexed, so the
/// search entry is left alone.
pub async fn save_reviews(
    conn: &mut SqliteConnection,
    course: &Course,
    expected_version: i64,
) -> Result<bool, sqlx::Error> {
    let document = document_of(course)?;
    let updated = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET document = ?, rating_average = ?, rating_count = ?, rating_updated_at = ?,
            updated_at = ?, version = ?
        WHERE id = ? AND version = ? AND deleted_at IS NULL
        "#,
        course.variant().table()
    ))
    .bind(document)
    .bind(course.rating.average)
    .bind(course.rating.count)
    .bind(course.rating.last_updated)
    .bind(course.updated_at)
    .bind(course.version)
    .bind(course.id.to_string())
    .bind(expected_version)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(updated > 0)
}

/// Mark a live course deleted. Returns `false` if it is missing or already deleted.
pub async fn soft_delete(
    db: &SqlitePool,
    variant: CourseVariant,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET deleted_at = ?, updated_at = ?, version = version + 1
        WHERE id = ? AND deleted_at IS NULL
        "#,
        variant.table()
    ))
    .bind(now)
    .bind(now)
    .bind(id.to_string())
    .execute(db)
    .await?
    .rows_affected();

    Ok(updated > 0)
}
