use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Version of the persisted document layout.
pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseVariant {
    Online,
    Offline,
    Free,
}

impl CourseVariant {
    pub const ALL: [CourseVariant; 3] =
        [CourseVariant::Online, CourseVariant::Offline, CourseVariant::Free];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourseVariant::Online => "online",
            CourseVariant::Offline => "offline",
            CourseVariant::Free => "free",
        }
    }

    /// Human label used in default SEO titles.
    pub fn label(&self) -> &'static str {
        match self {
            CourseVariant::Online => "Online",
            CourseVariant::Offline => "Offline",
            CourseVariant::Free => "Free",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            CourseVariant::Online => "online_courses",
            CourseVariant::Offline => "offline_courses",
            CourseVariant::Free => "free_courses",
        }
    }

    pub fn search_table(&self) -> &'static str {
        match self {
            CourseVariant::Online => "online_courses_fts",
            CourseVariant::Offline => "offline_courses_fts",
            CourseVariant::Free => "free_courses_fts",
        }
    }
}

impl FromStr for CourseVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(CourseVariant::Online),
            "offline" => Ok(CourseVariant::Offline),
            "free" => Ok(CourseVariant::Free),
            _ => Err(format!("Unknown course variant: {}", s)),
        }
    }
}

impl fmt::Display for CourseVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    #[default]
    Draft,
    Available,
    Unavailable,
    Archived,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Available => "available",
            CourseStatus::Unavailable => "unavailable",
            CourseStatus::Archived => "archived",
        }
    }
}

impl FromStr for CourseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(CourseStatus::Draft),
            "available" => Ok(CourseStatus::Available),
            "unavailable" => Ok(CourseStatus::Unavailable),
            "archived" => Ok(CourseStatus::Archived),
            _ => Err(format!("Unknown course status: {}", s)),
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Academic,
}

impl CourseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseLevel::Beginner => "beginner",
            CourseLevel::Intermediate => "intermediate",
            CourseLevel::Advanced => "advanced",
            CourseLevel::Academic => "academic",
        }
    }
}

impl FromStr for CourseLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(CourseLevel::Beginner),
            "intermediate" => Ok(CourseLevel::Intermediate),
            "advanced" => Ok(CourseLevel::Advanced),
            "academic" => Ok(CourseLevel::Academic),
            _ => Err(format!("Unknown course level: {}", s)),
        }
    }
}

/// Derived enrollment state of an offline course.
///
/// Ordered: a course only ever moves forward (`Open` -> `InProgress` -> `Closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    #[default]
    Open,
    InProgress,
    Closed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Open => "open",
            EnrollmentStatus::InProgress => "in_progress",
            EnrollmentStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreDetails {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub level: CourseLevel,
    pub language: String,
    pub instructors: Vec<Uuid>,
    /// Curriculum headings, in teaching order.
    pub outline: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryDetails {
    pub category: String,
    pub subcategory: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeoDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdditionalFeatures {
    #[serde(default)]
    pub certificate: bool,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rating {
    pub average: f64,
    pub count: i64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Pricing {
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[serde(default)]
    pub offer_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionGroup {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineDetails {
    pub duration_hours: u32,
    pub validity_months: u32,
    pub pricing: Pricing,
    #[serde(default)]
    pub faqs: Vec<Faq>,
    #[serde(default)]
    pub discussion_groups: Vec<DiscussionGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineDetails {
    pub duration_days: u32,
    pub daily_class_minutes: u32,
    pub pricing: Pricing,
    #[serde(default)]
    pub batches: Vec<Uuid>,
    #[serde(default)]
    pub enrollment_status: EnrollmentStatus,
    #[serde(default)]
    pub refund_policy: Option<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeDetails {
    pub duration_hours: u32,
    /// Ordered module references.
    #[serde(default)]
    pub modules: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "lowercase")]
pub enum VariantDetails {
    Online(OnlineDetails),
    Offline(OfflineDetails),
    Free(FreeDetails),
}

impl VariantDetails {
    pub fn variant(&self) -> CourseVariant {
        match self {
            VariantDetails::Online(_) => CourseVariant::Online,
            VariantDetails::Offline(_) => CourseVariant::Offline,
            VariantDetails::Free(_) => CourseVariant::Free,
        }
    }

    pub fn pricing(&self) -> Option<&Pricing> {
        match self {
            VariantDetails::Online(d) => Some(&d.pricing),
            VariantDetails::Offline(d) => Some(&d.pricing),
            VariantDetails::Free(_) => None,
        }
    }

    /// True when no batches or modules are attached yet.
    pub fn variant_is_empty(&self) -> bool {
        match self {
            VariantDetails::Offline(d) => d.batches.is_empty(),
            VariantDetails::Free(d) => d.modules.is_empty(),
            VariantDetails::Online(_) => true,
        }
    }

    pub fn pricing_mut(&mut self) -> Option<&mut Pricing> {
        match self {
            VariantDetails::Online(d) => Some(&mut d.pricing),
            VariantDetails::Offline(d) => Some(&mut d.pricing),
            VariantDetails::Free(_) => None,
        }
    }
}

/// A catalog course: shared sections plus the variant-specific part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub core: CoreDetails,
    pub category: CategoryDetails,
    pub seo: SeoDetails,
    pub features: AdditionalFeatures,
    pub status: CourseStatus,
    pub details: VariantDetails,
    /// Attached review references. May contain ids whose review is gone.
    pub reviews: Vec<Uuid>,
    pub rating: Rating,
    pub trending_score: f64,
    pub last_trending_update: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub schema_version: i32,
    /// Optimistic concurrency token, bumped on every section write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn variant(&self) -> CourseVariant {
        self.details.variant()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn price(&self) -> Option<f64> {
        self.details.pricing().map(|p| p.price)
    }

    pub fn batches(&self) -> &[Uuid] {
        match &self.details {
            VariantDetails::Offline(d) => &d.batches,
            _ => &[],
        }
    }

    pub fn modules(&self) -> &[Uuid] {
        match &self.details {
            VariantDetails::Free(d) => &d.modules,
            _ => &[],
        }
    }

    pub fn enrollment_status(&self) -> Option<EnrollmentStatus> {
        match &self.details {
            VariantDetails::Offline(d) => Some(d.enrollment_status),
            _ => None,
        }
    }
}

/// Draft input for `CourseService::create`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCourse {
    #[validate(length(min = 3, max = 100))]
    pub name: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub level: CourseLevel,
    #[validate(length(min = 2, max = 32))]
    pub language: String,
    #[serde(default)]
    pub instructors: Vec<Uuid>,
    #[serde(default)]
    pub outline: Vec<String>,
    pub category: CategoryDetails,
    #[serde(default)]
    pub seo: SeoDetails,
    #[serde(default)]
    pub features: AdditionalFeatures,
    pub details: VariantDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CoreDetailsUpdate {
    /// Length is checked after trimming, in `validate_update`.
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub level: Option<CourseLevel>,
    #[validate(length(min = 2, max = 32))]
    pub language: Option<String>,
    pub instructors: Option<Vec<Uuid>>,
    pub outline: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PricingUpdate {
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub offer_id: Option<Uuid>,
    #[serde(default)]
    pub remove_offer: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SeoUpdate {
    #[validate(length(max = 70))]
    pub title: Option<String>,
    #[validate(length(max = 320))]
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CategoryUpdate {
    #[validate(length(min = 1, max = 64))]
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesUpdate {
    pub certificate: Option<bool>,
    pub prerequisites: Option<Vec<String>>,
    pub learning_outcomes: Option<Vec<String>>,
    pub duration_hours: Option<u32>,
    pub validity_months: Option<u32>,
    pub duration_days: Option<u32>,
    pub daily_class_minutes: Option<u32>,
    pub faqs: Option<Vec<Faq>>,
    pub discussion_groups: Option<Vec<DiscussionGroup>>,
    pub refund_policy: Option<String>,
    pub materials: Option<Vec<String>>,
    pub equipment: Option<Vec<String>>,
}

/// A partial update scoped to one section of the course document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "section", content = "update", rename_all = "snake_case")]
pub enum SectionUpdate {
    CoreDetails(CoreDetailsUpdate),
    Pricing(PricingUpdate),
    Seo(SeoUpdate),
    Category(CategoryUpdate),
    AdditionalFeatures(FeaturesUpdate),
}

impl SectionUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            SectionUpdate::CoreDetails(_) => "core_details",
            SectionUpdate::Pricing(_) => "pricing",
            SectionUpdate::Seo(_) => "seo",
            SectionUpdate::Category(_) => "category",
            SectionUpdate::AdditionalFeatures(_) => "additional_features",
        }
    }
}
