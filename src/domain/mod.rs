//! Pure catalog rules. Nothing here touches the store.

pub mod enrollment_status;
pub mod lifecycle;
pub mod rating;
pub mod sections;
pub mod slug;
pub mod trending;

pub use enrollment_status::derive_status;
pub use lifecycle::{check_publish_ready, check_transition};
pub use rating::aggregate;
pub use sections::{apply_section, build_course, validate_update};
pub use slug::{fill_seo_defaults, slugify};
pub use trending::{TrendingInputs, is_fresh, trending_score};
