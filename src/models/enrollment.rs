use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CourseVariant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub variant: CourseVariant,
    pub learner_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub enrolled_at: DateTime<Utc>,
}

/// Result of the store-level enrollment write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled,
    AlreadyEnrolled,
    BatchFull,
}
