use chrono::{DateTime, Utc};

use crate::models::{Batch, EnrollmentStatus};

/// Derive an offline course's enrollment status from its batches.
///
/// `Closed` once any batch is full, past its enrollment deadline, or past its
/// end date. `InProgress` once the earliest batch has started. The result is
/// never behind `current`, so `Closed` is terminal.
pub fn derive_status(
    current: EnrollmentStatus,
    batches: &[Batch],
    now: DateTime<Utc>,
) -> EnrollmentStatus {
    let closed = batches
        .iter()
        .any(|b| b.is_full || b.enrollment_deadline_passed(now) || b.has_ended(now));

    let derived = if closed {
        EnrollmentStatus::Closed
    } else {
        match batches.iter().map(|b| b.start_date).min() {
            Some(earliest) if now >= earliest => EnrollmentStatus::InProgress,
            _ => EnrollmentStatus::Open,
        }
    };

    derived.max(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use chrono::TimeDelta;
    use uuid::Uuid;

    fn batch(now: DateTime<Utc>, starts_in_days: i64, max: u32, enrolled: u32) -> Batch {
        let start = now + TimeDelta::days(starts_in_days);
        Batch {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            name: "Morning".to_string(),
            instructors: vec![],
            start_date: start,
            end_date: start + TimeDelta::days(30),
            enrollment_start: now - TimeDelta::days(10),
            enrollment_end: start + TimeDelta::days(3),
            max_student_count: max,
            enrolled_count: enrolled,
            is_full: enrolled >= max,
            address: Address::default(),
            created_at: now,
        }
    }

    #[test]
    fn open_before_any_batch_starts() {
        let now = Utc::now();
        let batches = vec![batch(now, 5, 10, 0), batch(now, 9, 10, 0)];
        assert_eq!(derive_status(EnrollmentStatus::Open, &batches, now), EnrollmentStatus::Open);
    }

    #[test]
    fn no_batches_stays_open() {
        assert_eq!(
            derive_status(EnrollmentStatus::Open, &[], Utc::now()),
            EnrollmentStatus::Open
        );
    }

    #[test]
    fn in_progress_after_earliest_start() {
        let now = Utc::now();
        let batches = vec![batch(now, -1, 10, 0), batch(now, 9, 10, 0)];
        assert_eq!(
            derive_status(EnrollmentStatus::Open, &batches, now),
            EnrollmentStatus::InProgress
        );
    }

    #[test]
    fn full_batch_closes() {
        let now = Utc::now();
        let batches = vec![batch(now, 5, 2, 2)];
        assert_eq!(derive_status(EnrollmentStatus::Open, &batches, now), EnrollmentStatus::Closed);
    }

    #[test]
    fn passed_deadline_closes() {
        let now = Utc::now();
        let batches = vec![batch(now, -5, 10, 1)];
        assert_eq!(derive_status(EnrollmentStatus::Open, &batches, now), EnrollmentStatus::Closed);
    }

    #[test]
    fn closed_is_terminal() {
        let now = Utc::now();
        let batches = vec![batch(now, 5, 10, 0)];
        assert_eq!(
            derive_status(EnrollmentStatus::Closed, &batches, now),
            EnrollmentStatus::Closed
        );
    }
}
