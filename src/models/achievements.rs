//! Achievements and daily goal progress derived from the streak and the review log.
use super::{Rating, ReviewEvent, UserStreak};
use serde::{Deserialize, Serialize};

/// Streak length required for the week-long achievements.
pub const WEEK_STREAK_DAYS: u32 = 7;

/// How far back the review log is consulted, in days.
pub const ACHIEVEMENT_LOOKBACK_DAYS: i64 = 30;

pub const DEFAULT_DAILY_GOAL: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstCard,
    FirstReview,
    WeekStreak,
    PerfectWeek,
}

impl Achievement {
    pub const ALL: [Achievement; 4] = [
        Achievement::FirstCard,
        Achievement::FirstReview,
        Achievement::WeekStreak,
        Achievement::PerfectWeek,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Achievement::FirstCard => "First Step",
            Achievement::FirstReview => "Beginner",
            Achievement::WeekStreak => "Persistence",
            Achievement::PerfectWeek => "Perfect Week",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Achievement::FirstCard => "Create your first knowledge card",
            Achievement::FirstReview => "Complete your first review",
            Achievement::WeekStreak => "Review on 7 consecutive days",
            Achievement::PerfectWeek => "Keep a 7 day streak with a perfect recall along the way",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementStatus {
    pub achievement: Achievement,
    pub unlocked: bool,
}

/// Evaluates every achievement. `recent_reviews` should cover the lookback window.
pub fn evaluate_achievements(
    streak: &UserStreak,
    cards_created: u64,
    recent_reviews: &[ReviewEvent],
) -> Vec<AchievementStatus> {
    Achievement::ALL
        .iter()
        .map(|&achievement| {
            let unlocked = match achievement {
                Achievement::FirstCard => cards_created >= 1,
                Achievement::FirstReview => streak.total_reviews >= 1,
                Achievement::WeekStreak => streak.current_streak >= WEEK_STREAK_DAYS,
                Achievement::PerfectWeek => {
                    streak.current_streak >= WEEK_STREAK_DAYS
                        && recent_reviews.iter().any(|r| r.rating == Rating::EASY)
                }
            };
            AchievementStatus {
                achievement,
                unlocked,
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub reviewed_today: u32,
    pub daily_goal: u32,
    /// Percentage of the goal reached, capped at 100.
    pub completion_rate: u32,
}

impl DailyProgress {
    pub fn new(reviewed_today: u32, daily_goal: u32) -> Self {
        let completion_rate = if daily_goal == 0 {
            100
        } else {
            ((reviewed_today as f64 / daily_goal as f64) * 100.0).round().min(100.0) as u32
        };
        Self {
            reviewed_today,
            daily_goal,
            completion_rate,
        }
    }

    pub fn today_reviewed(&self) -> bool {
        self.reviewed_today > 0
    }
}
