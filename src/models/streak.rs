//! Daily review streak bookkeeping.
//!
//! Days are calendar dates in the user's local day boundary, so two reviews twenty hours
//! apart on either side of midnight count as consecutive days.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStreak {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_reviews: u64,
    pub last_review_date: Option<NaiveDate>,
}

impl UserStreak {
    /// Whether the streak is still alive on `today`, i.e. it will continue with a review today.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        match self.last_review_date {
            Some(last) => last == today || Some(last) == today.pred_opt(),
            None => false,
        }
    }
}

/// Applies one completed rating made on `today` to `previous`.
///
/// A second review on the same day leaves the streak alone, a review the day after the
/// last one extends it, and anything else (a gap, a first review, or a last date that is
/// not in the past) starts over at 1.
pub fn record_review(previous: &UserStreak, today: NaiveDate) -> UserStreak {
    let current_streak = match previous.last_review_date {
        Some(last) if last == today => previous.current_streak,
        Some(last) if Some(last) == today.pred_opt() => previous.current_streak.saturating_add(1),
        _ => 1,
    };

    UserStreak {
        current_streak,
        longest_streak: previous.longest_streak.max(current_streak),
        total_reviews: previous.total_reviews.saturating_add(1),
        last_review_date: Some(today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    #[test]
    fn test_first_review_starts_streak() {
        let next = record_review(&UserStreak::default(), day(10));
        assert_eq!(next.current_streak, 1);
        assert_eq!(next.longest_streak, 1);
        assert_eq!(next.total_reviews, 1);
        assert_eq!(next.last_review_date, Some(day(10)));
    }

    #[test]
    fn test_same_day_does_not_double_count() {
        let first = record_review(&UserStreak::default(), day(10));
        let second = record_review(&first, day(10));
        assert_eq!(second.current_streak, 1);
        assert_eq!(second.total_reviews, 2);
    }

    #[test]
    fn test_consecutive_days_extend_streak() {
        let mut streak = UserStreak::default();
        for d in 10..15 {
            streak = record_review(&streak, day(d));
        }
        assert_eq!(streak.current_streak, 5);
        assert_eq!(streak.longest_streak, 5);
    }

    #[test]
    fn test_gap_resets_streak_but_keeps_longest() {
        let previous = UserStreak {
            current_streak: 12,
            longest_streak: 20,
            total_reviews: 300,
            last_review_date: Some(day(10)),
        };
        let next = record_review(&previous, day(12));
        assert_eq!(next.current_streak, 1);
        assert_eq!(next.longest_streak, 20);
        assert_eq!(next.total_reviews, 301);
    }

    #[test]
    fn test_month_boundary_is_consecutive() {
        let previous = UserStreak {
            current_streak: 3,
            longest_streak: 3,
            total_reviews: 3,
            last_review_date: NaiveDate::from_ymd_opt(2024, 2, 29),
        };
        let next = record_review(&previous, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(next.current_streak, 4);
        assert_eq!(next.longest_streak, 4);
    }

    #[test]
    fn test_is_active() {
        let streak = record_review(&UserStreak::default(), day(10));
        assert!(streak.is_active(day(10)));
        assert!(streak.is_active(day(11)));
        assert!(!streak.is_active(day(12)));
    }
}
