use serde::{Deserialize, Serialize};

use super::{CourseLevel, CourseStatus};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Which rows a read may see with respect to soft deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Live,
    IncludeDeleted,
    DeletedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub skip: u32,
}

impl Page {
    pub fn new(limit: u32, skip: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            skip,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LIMIT, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    TrendingDesc,
    NewestFirst,
    PriceAsc,
    NameAsc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub status: Option<CourseStatus>,
    pub level: Option<CourseLevel>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub language: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Case-insensitive substring match on the course name.
    pub name_contains: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
}
