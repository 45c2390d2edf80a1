//! Streak, daily goal and achievement status for one user.
use crate::clock::Clock;
use crate::database::{CardStore, StoreError, StreakStore};
use crate::models::achievements::{ACHIEVEMENT_LOOKBACK_DAYS, evaluate_achievements};
use crate::models::{AchievementStatus, DailyProgress, UserStreak};
use chrono::Duration;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StreakReport {
    pub streak: UserStreak,
    /// False when the last review was before yesterday, i.e. the streak is already broken.
    pub streak_active: bool,
    pub progress: DailyProgress,
    pub achievements: Vec<AchievementStatus>,
}

pub fn streak_report<S, C>(
    store: &S,
    clock: &C,
    user_id: &str,
    daily_goal: u32,
) -> Result<StreakReport, StoreError>
where
    S: CardStore + StreakStore + ?Sized,
    C: Clock + ?Sized,
{
    let streak = store.read_streak(user_id)?;
    let reviewed_today = store.reviews_since(user_id, clock.start_of_today())?.len();
    let recent = store.reviews_since(user_id, clock.now() - Duration::days(ACHIEVEMENT_LOOKBACK_DAYS))?;
    let cards_created = store.count_cards(user_id)?;

    Ok(StreakReport {
        streak_active: streak.is_active(clock.today()),
        progress: DailyProgress::new(u32::try_from(reviewed_today).unwrap_or(u32::MAX), daily_goal),
        achievements: evaluate_achievements(&streak, cards_created, &recent),
        streak,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::MemoryStore;
    use crate::models::streak::record_review;
    use crate::models::{Achievement, Rating, ReviewEvent};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_report_counts_only_today() {
        let now = Utc.with_ymd_and_hms(2024, 11, 5, 15, 0, 0).unwrap();
        let clock = ManualClock::new(now);
        let store = MemoryStore::new();
        store.add_card("u1", "t", None, "c", now).unwrap();

        for (offset_hours, rating) in [(-30, Rating::GOOD), (-2, Rating::EASY), (-1, Rating::FAIR)] {
            let event = ReviewEvent {
                card_id: 1,
                rating,
                duration: std::time::Duration::from_secs(3),
                reviewed_at: now + Duration::hours(offset_hours),
            };
            store.append_review_log("u1", &event).unwrap();
        }
        let streak = record_review(&UserStreak::default(), clock.today());
        store.write_streak("u1", &streak).unwrap();

        let report = streak_report(&store, &clock, "u1", 4).unwrap();
        assert_eq!(report.progress.reviewed_today, 2);
        assert_eq!(report.progress.completion_rate, 50);
        assert!(report.streak_active);
        let unlocked: Vec<Achievement> = report
            .achievements
            .iter()
            .filter(|a| a.unlocked)
            .map(|a| a.achievement)
            .collect();
        assert_eq!(unlocked, vec![Achievement::FirstCard, Achievement::FirstReview]);
    }
}
