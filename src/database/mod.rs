//! Persistence boundary of the scheduling core.
//!
//! The core only talks to storage through [`CardStore`] and [`StreakStore`]. Schedule
//! writes are last-write-wins per card; streak updates must be an atomic
//! read-modify-write per user, which implementors provide through
//! [`StreakStore::record_review`].

pub mod db;
pub mod memory;

pub use db::{RepairReport, SqliteStore};
pub use memory::MemoryStore;

use crate::models::streak;
use crate::models::{Card, CardSchedule, ReviewEvent, UserStreak};
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("card {0} not found")]
    CardNotFound(i64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("timestamp {0} is outside the storable range")]
    TimestampOutOfRange(DateTime<Utc>),
}

pub trait CardStore {
    /// Due cards for `user_id`, oldest due first, at most `limit`.
    fn fetch_due(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Card>, StoreError>;

    fn fetch_all(&self, user_id: &str) -> Result<Vec<Card>, StoreError>;

    fn write_schedule(&self, card_id: i64, schedule: &CardSchedule) -> Result<(), StoreError>;

    /// Stores a copy of `card` under a fresh id, schedule included. Returns the new id.
    fn import_card(&self, user_id: &str, card: &Card) -> Result<i64, StoreError>;

    fn count_cards(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self.fetch_all(user_id)?.len() as u64)
    }
}

pub trait StreakStore {
    /// The user's streak, or an empty one if they never reviewed.
    fn read_streak(&self, user_id: &str) -> Result<UserStreak, StoreError>;

    /// Upserts the user's streak.
    fn write_streak(&self, user_id: &str, streak: &UserStreak) -> Result<(), StoreError>;

    fn append_review_log(&self, user_id: &str, event: &ReviewEvent) -> Result<(), StoreError>;

    fn reviews_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReviewEvent>, StoreError>;

    /// Logs `event` and folds it into the user's streak for `today`.
    ///
    /// The default is not atomic; stores shared between writers override it so that two
    /// ratings landing together cannot lose an increment.
    fn record_review(
        &self,
        user_id: &str,
        event: &ReviewEvent,
        today: NaiveDate,
    ) -> Result<UserStreak, StoreError> {
        self.append_review_log(user_id, event)?;
        let updated = streak::record_review(&self.read_streak(user_id)?, today);
        self.write_streak(user_id, &updated)?;
        Ok(updated)
    }
}
