//! Weighted full-text index, one FTS5 table per course variant.
//!
//! Entries are rewritten by the store inside the same transaction as each
//! course write; nothing is computed at query time.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::courses::{COURSE_COLUMNS, CourseRow};
use super::filter;
use crate::models::{CatalogFilter, Course, CourseVariant, Page, VariantDetails};

pub const NAME_WEIGHT: f64 = 10.0;
pub const KEYWORDS_WEIGHT: f64 = 5.0;
pub const DESCRIPTION_WEIGHT: f64 = 3.0;
pub const OUTLINE_WEIGHT: f64 = 2.0;

/// Text columns of one index entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDocument {
    pub name: String,
    pub keywords: String,
    pub description: String,
    pub outline: String,
}

impl SearchDocument {
    pub fn from_course(course: &Course) -> Self {
        let mut keywords: Vec<&str> = Vec::new();
        keywords.extend(course.category.tags.iter().map(String::as_str));
        keywords.extend(course.seo.keywords.iter().map(String::as_str));
        keywords.push(course.category.category.as_str());
        if let Some(sub) = &course.category.subcategory {
            keywords.push(sub.as_str());
        }

        let mut outline: Vec<&str> = course.core.outline.iter().map(String::as_str).collect();
        if let VariantDetails::Online(d) = &course.details {
            outline.extend(d.faqs.iter().map(|f| f.question.as_str()));
        }

        Self {
            name: course.core.name.clone(),
            keywords: keywords.join(" "),
            description: course.core.description.clone(),
            outline: outline.join("\n"),
        }
    }
}

/// Turn free text into an FTS5 MATCH expression: every word quoted, OR-ed.
///
/// Returns `None` when the text has no searchable words.
pub fn match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

pub async fn reindex(conn: &mut SqliteConnection, course: &Course) -> Result<(), sqlx::Error> {
    let table = course.variant().search_table();
    let doc = SearchDocument::from_course(course);
    let course_id = course.id.to_string();

    sqlx::query(&format!("DELETE FROM {} WHERE course_id = ?", table))
        .bind(&course_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(&format!(
        "INSERT INTO {} (course_id, name, keywords, description, outline) VALUES (?, ?, ?, ?, ?)",
        table
    ))
    .bind(&course_id)
    .bind(doc.name)
    .bind(doc.keywords)
    .bind(doc.description)
    .bind(doc.outline)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Ranked search for a MATCH `expression` (see [`match_expression`])
/// combined with catalog filters.
pub async fn search(
    db: &SqlitePool,
    variant: CourseVariant,
    expression: &str,
    catalog_filter: &CatalogFilter,
    page: Page,
) -> Result<Vec<Course>, sqlx::Error> {
    let fts = variant.search_table();

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {cols} FROM {fts} JOIN {table} c ON c.id = {fts}.course_id WHERE {fts} MATCH ",
        cols = COURSE_COLUMNS,
        fts = fts,
        table = variant.table(),
    ));
    qb.push_bind(expression.to_string());
    filter::push_filters(&mut qb, catalog_filter, "c");
    // bm25 takes one weight per column, course_id included
    qb.push(format!(
        " ORDER BY bm25({}, 0.0, {:.1}, {:.1}, {:.1}, {:.1}), c.trending_score DESC",
        fts, NAME_WEIGHT, KEYWORDS_WEIGHT, DESCRIPTION_WEIGHT, OUTLINE_WEIGHT
    ));
    qb.push(" LIMIT ").push_bind(i64::from(page.limit));
    qb.push(" OFFSET ").push_bind(i64::from(page.skip));

    let rows = qb.build_query_as::<CourseRow>().fetch_all(db).await?;
    rows.into_iter().map(Course::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, courses};
    use crate::domain::test_support::sample_course;
    use crate::models::Visibility;

    #[test]
    fn match_expression_quotes_terms() {
        assert_eq!(
            match_expression("Rust: async, tokio!").as_deref(),
            Some("\"rust\" OR \"async\" OR \"tokio\"")
        );
        assert_eq!(match_expression("  ?? "), None);
    }

    #[tokio::test]
    async fn test_name_outranks_description() {
        let pool = connect_in_memory().await.expect("Failed to create test db");

        let mut by_name = sample_course(CourseVariant::Online);
        by_name.core.name = "Kubernetes Essentials".to_string();
        by_name.core.slug = "kubernetes-essentials".to_string();
        by_name.core.description = "Containers at scale.".to_string();
        courses::insert(&pool, &by_name).await.unwrap();

        let mut by_description = sample_course(CourseVariant::Online);
        by_description.core.name = "Cloud Operations".to_string();
        by_description.core.slug = "cloud-operations".to_string();
        by_description.core.description = "Covers kubernetes among other tools.".to_string();
        courses::insert(&pool, &by_description).await.unwrap();

        let results = search(
            &pool,
            CourseVariant::Online,
            "kubernetes",
            &CatalogFilter::default(),
            Page::default(),
        )
        .await
        .unwrap();
        let ids: Vec<_> = results.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![by_name.id, by_description.id]);
    }

    #[tokio::test]
    async fn test_search_hides_deleted_unless_requested() {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let course = sample_course(CourseVariant::Free);
        courses::insert(&pool, &course).await.unwrap();
        courses::soft_delete(&pool, CourseVariant::Free, course.id, chrono::Utc::now())
            .await
            .unwrap();

        let live = search(&pool, CourseVariant::Free, "rust", &CatalogFilter::default(), Page::default())
            .await
            .unwrap();
        assert!(live.is_empty());

        let all = CatalogFilter {
            visibility: Visibility::IncludeDeleted,
            ..Default::default()
        };
        let any = search(&pool, CourseVariant::Free, "rust", &all, Page::default())
            .await
            .unwrap();
        assert_eq!(any.len(), 1);
    }
}
