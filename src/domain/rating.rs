use chrono::{DateTime, Utc};

use crate::models::Rating;

/// Aggregate review scores into a course rating.
///
/// The average is the arithmetic mean rounded to one decimal and is always
/// within `[0, 5]`. No scores gives `average == 0`, `count == 0`.
pub fn aggregate<I>(scores: I, now: DateTime<Utc>) -> Rating
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0;
    let mut count: i64 = 0;
    for score in scores {
        sum += score.clamp(0.0, 5.0);
        count += 1;
    }

    let average = if count == 0 {
        0.0
    } else {
        ((sum / count as f64) * 10.0).round() / 10.0
    };

    Rating {
        average: average.clamp(0.0, 5.0),
        count,
        last_updated: Some(now),
    }
}
