//! Soft-delete visibility and catalog filters for dynamic course queries.
//!
//! Every course read builds its WHERE clause through [`push_filters`], so the
//! `deleted_at IS NULL` restriction is applied unless a caller asks otherwise.

use sqlx::{QueryBuilder, Sqlite};

use crate::models::{CatalogFilter, SortOrder, Visibility};

pub fn visibility_clause(visibility: Visibility, alias: &str) -> Option<String> {
    match visibility {
        Visibility::Live => Some(format!("{}.deleted_at IS NULL", alias)),
        Visibility::DeletedOnly => Some(format!("{}.deleted_at IS NOT NULL", alias)),
        Visibility::IncludeDeleted => None,
    }
}

/// Append ` AND ...` conditions for `filter`. The builder must already hold a
/// `WHERE` with at least one condition.
pub fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a CatalogFilter, alias: &str) {
    if let Some(clause) = visibility_clause(filter.visibility, alias) {
        qb.push(" AND ").push(clause);
    }
    if let Some(status) = filter.status {
        qb.push(format!(" AND {}.status = ", alias)).push_bind(status.as_str());
    }
    if let Some(level) = filter.level {
        qb.push(format!(" AND {}.level = ", alias)).push_bind(level.as_str());
    }
    if let Some(category) = &filter.category {
        qb.push(format!(" AND {}.category = ", alias)).push_bind(category.as_str());
    }
    if let Some(subcategory) = &filter.subcategory {
        qb.push(format!(" AND {}.subcategory = ", alias)).push_bind(subcategory.as_str());
    }
    if let Some(language) = &filter.language {
        qb.push(format!(" AND {}.language = ", alias)).push_bind(language.to_lowercase());
    }
    if let Some(min) = filter.min_price {
        qb.push(format!(" AND {}.price >= ", alias)).push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(format!(" AND {}.price <= ", alias)).push_bind(max);
    }
    if let Some(needle) = &filter.name_contains {
        qb.push(format!(" AND {}.name LIKE ", alias))
            .push_bind(format!("%{}%", escape_like(needle)))
            .push(" ESCAPE '\\'");
    }
}

pub fn order_clause(sort: SortOrder, alias: &str) -> String {
    match sort {
        SortOrder::TrendingDesc => format!(" ORDER BY {a}.trending_score DESC, {a}.created_at DESC", a = alias),
        SortOrder::NewestFirst => format!(" ORDER BY {}.created_at DESC", alias),
        SortOrder::PriceAsc => format!(" ORDER BY {a}.price ASC, {a}.name ASC", a = alias),
        SortOrder::NameAsc => format!(" ORDER BY {}.name ASC", alias),
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
