//! SM-2 (SuperMemo 2) derived scheduling.
//!
//! Computes a card's next schedule from its current one and a recall rating:
//! - Ratings 3-5 succeed: the interval climbs 1 day → 6 days → previous interval × EF × modifier
//! - Ratings 0-2 fail: the interval resets to 1 day and the repetition ladder restarts
//! - EF moves by `0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)` on success and never falls below 1.3
//! - Intervals are clamped to the configured bounds and optionally fuzzed by ±5%
//!
//! The function is pure: "now" and the random source are passed in, and with fuzzing
//! disabled the random source is never touched.

use super::card_schedule::{INITIAL_EASE_FACTOR, MIN_EASE_FACTOR};
use super::{CardSchedule, Rating};
use crate::config::ConfigError;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Ease factor subtracted on a failed rating under [`FailurePolicy::PenalizeEase`].
pub const FAILURE_EASE_PENALTY: f64 = 0.2;

/// Fuzzing only applies to intervals longer than this many days.
pub const FUZZ_MIN_INTERVAL: u32 = 4;

/// Maximum relative jitter applied by fuzzing.
pub const FUZZ_RATIO: f64 = 0.05;

/// What happens to the ease factor when a rating fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Classic SM-2: a failure resets the interval but leaves EF untouched.
    KeepEase,
    /// EF drops by [`FAILURE_EASE_PENALTY`] (floored at 1.3), so repeatedly failed
    /// cards grow more slowly once relearned.
    PenalizeEase,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub min_interval: u32,
    pub max_interval: u32,
    pub initial_ease_factor: f64,
    pub interval_modifier: f64,
    pub fuzzing: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval: 1,
            max_interval: 365,
            initial_ease_factor: INITIAL_EASE_FACTOR,
            interval_modifier: 1.0,
            fuzzing: true,
            failure_policy: FailurePolicy::PenalizeEase,
        }
    }
}

impl SchedulerConfig {
    /// Default configuration without fuzzing, for reproducible schedules.
    pub fn deterministic() -> Self {
        Self {
            fuzzing: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_interval > self.max_interval {
            return Err(ConfigError::Invalid(format!(
                "min_interval {} exceeds max_interval {}",
                self.min_interval, self.max_interval
            )));
        }
        if !(self.interval_modifier.is_finite() && self.interval_modifier > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "interval_modifier must be positive, got {}",
                self.interval_modifier
            )));
        }
        if !(self.initial_ease_factor.is_finite() && self.initial_ease_factor >= MIN_EASE_FACTOR) {
            return Err(ConfigError::Invalid(format!(
                "initial_ease_factor must be at least {MIN_EASE_FACTOR}, got {}",
                self.initial_ease_factor
            )));
        }
        Ok(())
    }

    fn clamp_interval(&self, days: f64) -> u32 {
        days.max(self.min_interval as f64).min(self.max_interval as f64) as u32
    }
}

fn ease_delta(rating: Rating) -> f64 {
    let miss = 5.0 - rating.value() as f64;
    0.1 - miss * (0.08 + miss * 0.02)
}

/// Calculates the schedule that follows `schedule` after it was rated `rating` at `now`.
pub fn calculate_next_review<R: Rng + ?Sized>(
    schedule: &CardSchedule,
    rating: Rating,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
    rng: &mut R,
) -> CardSchedule {
    let (raw_interval, ease_factor, repetition_count) = if rating.is_success() {
        let interval = match schedule.repetition_count {
            0 => 1.0,
            1 => 6.0,
            _ => (schedule.interval_days as f64 * schedule.ease_factor * config.interval_modifier)
                .round(),
        };
        (
            interval,
            schedule.ease_factor + ease_delta(rating),
            schedule.repetition_count.saturating_add(1),
        )
    } else {
        let ease = match config.failure_policy {
            FailurePolicy::KeepEase => schedule.ease_factor,
            FailurePolicy::PenalizeEase => schedule.ease_factor - FAILURE_EASE_PENALTY,
        };
        (1.0, ease, 0)
    };

    let ease_factor = ease_factor.max(MIN_EASE_FACTOR);
    let mut interval_days = config.clamp_interval(raw_interval);

    if config.fuzzing && interval_days > FUZZ_MIN_INTERVAL {
        let fuzz = rng.gen_range(-FUZZ_RATIO..=FUZZ_RATIO);
        interval_days = config.clamp_interval((interval_days as f64 * (1.0 + fuzz)).round());
    }

    tracing::debug!(
        rating = rating.value(),
        interval_days,
        ease_factor,
        repetition_count,
        "computed next review"
    );

    CardSchedule {
        interval_days,
        ease_factor,
        repetition_count,
        next_review_at: now + Duration::days(interval_days as i64),
    }
}
