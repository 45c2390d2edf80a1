use crate::models::{FailurePolicy, SchedulerConfig, SessionConfig};
use chrono::FixedOffset;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub user_id: String,
    pub log_level: String,
    /// Fixed offset of the user's day boundary; `None` uses the machine's local offset.
    pub utc_offset: Option<FixedOffset>,
    pub session: SessionConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("cards.sqlite3"),
            user_id: "local".to_string(),
            log_level: "info".to_string(),
            utc_offset: None,
            session: SessionConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse::<T>().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_policy(value: &str) -> Option<FailurePolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "keep" | "keep_ease" => Some(FailurePolicy::KeepEase),
        "penalize" | "penalize_ease" => Some(FailurePolicy::PenalizeEase),
        _ => None,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Missing or unparseable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let session_defaults = defaults.session.clone();
        let scheduler_defaults = defaults.scheduler.clone();

        let mut session = SessionConfig {
            limit: parse(&lookup, "REVIEW_SESSION_LIMIT").unwrap_or(session_defaults.limit),
            hint_difficulty: parse(&lookup, "REVIEW_HINT_DIFFICULTY")
                .unwrap_or(session_defaults.hint_difficulty),
            daily_goal: parse(&lookup, "REVIEW_DAILY_GOAL").unwrap_or(session_defaults.daily_goal),
        };
        if let Err(err) = session.validate() {
            tracing::warn!(?session, %err, "invalid session settings, using defaults");
            session = session_defaults;
        }

        let mut scheduler = SchedulerConfig {
            min_interval: parse(&lookup, "SRS_MIN_INTERVAL").unwrap_or(scheduler_defaults.min_interval),
            max_interval: parse(&lookup, "SRS_MAX_INTERVAL").unwrap_or(scheduler_defaults.max_interval),
            initial_ease_factor: parse(&lookup, "SRS_INITIAL_EASE")
                .unwrap_or(scheduler_defaults.initial_ease_factor),
            interval_modifier: parse(&lookup, "SRS_INTERVAL_MODIFIER")
                .unwrap_or(scheduler_defaults.interval_modifier),
            fuzzing: lookup("SRS_FUZZING")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(scheduler_defaults.fuzzing),
            failure_policy: lookup("SRS_FAILURE_POLICY")
                .and_then(|v| parse_policy(&v))
                .unwrap_or(scheduler_defaults.failure_policy),
        };
        if let Err(err) = scheduler.validate() {
            tracing::warn!(?scheduler, %err, "invalid scheduler settings, using defaults");
            scheduler = scheduler_defaults;
        }

        let utc_offset = parse::<i32>(&lookup, "REVIEW_UTC_OFFSET_MINUTES")
            .and_then(|minutes| minutes.checked_mul(60))
            .and_then(FixedOffset::east_opt);

        Self {
            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            user_id: lookup("REVIEW_USER_ID").unwrap_or(defaults.user_id),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            utc_offset,
            session,
            scheduler,
        }
    }
}
