use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub country: String,
}

/// A scheduled cohort of an offline course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub instructors: Vec<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub enrollment_start: DateTime<Utc>,
    pub enrollment_end: DateTime<Utc>,
    pub max_student_count: u32,
    pub enrolled_count: u32,
    /// True iff `enrolled_count >= max_student_count`; maintained by the store.
    pub is_full: bool,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn seats_left(&self) -> u32 {
        self.max_student_count.saturating_sub(self.enrolled_count)
    }

    pub fn enrollment_not_yet_open(&self, now: DateTime<Utc>) -> bool {
        now < self.enrollment_start
    }

    pub fn enrollment_deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now > self.enrollment_end
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.end_date
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewBatch {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub instructors: Vec<Uuid>,
    pub start_date: DateTime<Utc>,
    pub enrollment_start: DateTime<Utc>,
    pub enrollment_end: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub max_student_count: u32,
    pub address: Address,
}
