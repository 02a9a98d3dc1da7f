pub mod batch;
pub mod course;
pub mod enrollment;
pub mod module;
pub mod offer;
pub mod query;
pub mod review;

pub use batch::{Address, Batch, NewBatch};
pub use course::*;
pub use enrollment::{EnrollOutcome, Enrollment};
pub use module::{CourseModule, NewModule};
pub use offer::{NewOffer, Offer};
pub use query::{CatalogFilter, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, Page, SortOrder, Visibility};
pub use review::{NewReview, Review};
