use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub course_id: Uuid,
    pub learner_id: Uuid,
    pub score: f64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewReview {
    pub learner_id: Uuid,
    #[validate(range(min = 0.0, max = 5.0))]
    pub score: f64,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub comment: String,
}
