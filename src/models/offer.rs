use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: f64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    /// Price after discount, rounded to cents.
    pub fn apply(&self, price: f64) -> f64 {
        let discounted = price * (1.0 - self.discount_percent / 100.0);
        (discounted.max(0.0) * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOffer {
    #[validate(length(min = 3, max = 32))]
    pub code: String,
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub discount_percent: f64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}
