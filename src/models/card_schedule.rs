//! Scheduling state carried by every card.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The ease factor never drops below this floor.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Ease factor assigned to freshly authored cards.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// When a card is next due and how quickly its intervals grow.
///
/// Only [`crate::models::sm2::calculate_next_review`] produces new values; a stored
/// schedule is replaced as a whole after each rating.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardSchedule {
    pub interval_days: u32,
    /// Kept at full precision between reviews. Rounding it would drift the schedule.
    pub ease_factor: f64,
    /// Consecutive successful ratings since creation or the last failure.
    pub repetition_count: u32,
    pub next_review_at: DateTime<Utc>,
}

impl CardSchedule {
    /// Schedule of a card authored at `now`: due immediately.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_ease(now, INITIAL_EASE_FACTOR)
    }

    pub fn with_ease(now: DateTime<Utc>, ease_factor: f64) -> Self {
        Self {
            interval_days: 0,
            ease_factor: ease_factor.max(MIN_EASE_FACTOR),
            repetition_count: 0,
            next_review_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_new_schedule_is_due_immediately() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let schedule = CardSchedule::new(now);

        assert_eq!(schedule.interval_days, 0);
        assert_eq!(schedule.ease_factor, INITIAL_EASE_FACTOR);
        assert_eq!(schedule.repetition_count, 0);
        assert!(schedule.is_due(now));
        assert!(!schedule.is_due(now - Duration::seconds(1)));
    }

    #[test]
    fn test_initial_ease_respects_floor() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(CardSchedule::with_ease(now, 0.9).ease_factor, MIN_EASE_FACTOR);
    }
}
