use chrono::{DateTime, TimeDelta, Utc};

pub const ENROLLMENT_WEIGHT: f64 = 0.4;
pub const RATING_WEIGHT: f64 = 0.4;
pub const RECENT_ACTIVITY_WEIGHT: f64 = 0.2;

/// Minimum age of a trending score before it is recomputed.
pub const DEFAULT_STALENESS_HOURS: i64 = 6;
/// Window counted as "recent" enrollments.
pub const RECENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrendingInputs {
    pub enrollment_count: i64,
    pub rating_average: f64,
    pub rating_count: i64,
    pub recent_enrollments: i64,
}

/// Composite popularity score, rounded to two decimals.
pub fn trending_score(inputs: &TrendingInputs) -> f64 {
    let score = inputs.enrollment_count as f64 * ENROLLMENT_WEIGHT
        + inputs.rating_average * inputs.rating_count as f64 * RATING_WEIGHT
        + inputs.recent_enrollments as f64 * RECENT_ACTIVITY_WEIGHT;
    (score * 100.0).round() / 100.0
}

/// Whether a score computed at `last_update` may still be served at `now`.
pub fn is_fresh(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>, window: TimeDelta) -> bool {
    match last_update {
        Some(last) => now - last < window,
        None => false,
    }
}

pub fn recent_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - TimeDelta::days(RECENT_WINDOW_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_inputs() {
        let inputs = TrendingInputs {
            enrollment_count: 10,
            rating_average: 4.5,
            rating_count: 4,
            recent_enrollments: 3,
        };
        // 10*0.4 + 4.5*4*0.4 + 3*0.2 = 4 + 7.2 + 0.6
        assert_eq!(trending_score(&inputs), 11.8);
    }

    #[test]
    fn zero_inputs_score_zero() {
        assert_eq!(trending_score(&TrendingInputs::default()), 0.0);
    }

    #[test]
    fn freshness_window() {
        let now = Utc::now();
        let window = TimeDelta::hours(DEFAULT_STALENESS_HOURS);
        assert!(!is_fresh(None, now, window));
        assert!(is_fresh(Some(now - TimeDelta::hours(5)), now, window));
        assert!(!is_fresh(Some(now - TimeDelta::hours(6)), now, window));
    }
}
