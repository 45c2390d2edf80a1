//! SQLite storage for cards, streaks and the review log
//!
//! Schedules are stored column by column: `ease_factor` as REAL so the f64 survives
//! unchanged, timestamps as epoch nanoseconds so a schedule reads back exactly as written.
//! Cards written before scheduling existed have NULL schedule columns and are treated as due.

use super::{CardStore, StoreError, StreakStore};
use crate::models::card_schedule::{INITIAL_EASE_FACTOR, MIN_EASE_FACTOR};
use crate::models::streak;
use crate::models::{Card, CardSchedule, Rating, ReviewEvent, UserStreak};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const DATE_FORMAT: &str = "%Y-%m-%d";

const UNSCHEDULED: &str = "(interval_days IS NULL OR ease_factor IS NULL \
     OR repetition_count IS NULL OR next_review_at IS NULL)";

const CARD_COLUMNS: &str = "id, title, summary, content, created_at, \
     interval_days, ease_factor, repetition_count, next_review_at";

/// Counts reported by [`SqliteStore::repair_schedules`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub total_cards: u64,
    pub invalid_cards: u64,
    pub fixed_cards: u64,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Raw `cards` row before validation.
struct CardRow {
    id: i64,
    title: String,
    summary: Option<String>,
    content: String,
    created_at: i64,
    interval_days: Option<i64>,
    ease_factor: Option<f64>,
    repetition_count: Option<i64>,
    next_review_at: Option<i64>,
}

impl CardRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            summary: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
            interval_days: row.get(5)?,
            ease_factor: row.get(6)?,
            repetition_count: row.get(7)?,
            next_review_at: row.get(8)?,
        })
    }

    fn into_card(self) -> Result<Card, StoreError> {
        let schedule = match (
            self.interval_days,
            self.ease_factor,
            self.repetition_count,
            self.next_review_at,
        ) {
            (Some(interval), Some(ease_factor), Some(repetitions), Some(next_review_at)) => {
                Some(CardSchedule {
                    interval_days: to_u32(interval, "interval_days")?,
                    ease_factor,
                    repetition_count: to_u32(repetitions, "repetition_count")?,
                    next_review_at: from_nanos(next_review_at),
                })
            }
            _ => None,
        };
        Ok(Card {
            id: self.id,
            title: self.title,
            summary: self.summary,
            content: self.content,
            created_at: from_nanos(self.created_at),
            schedule,
        })
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} = {value}")))
}

fn to_nanos(time: DateTime<Utc>) -> Result<i64, StoreError> {
    time.timestamp_nanos_opt()
        .ok_or(StoreError::TimestampOutOfRange(time))
}

/// Query bound; times past the storable range compare as the range end.
fn bound_nanos(time: DateTime<Utc>) -> i64 {
    time.timestamp_nanos_opt().unwrap_or(if time.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

fn now_nanos() -> i64 {
    bound_nanos(Utc::now())
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn read_streak_row(conn: &Connection, user_id: &str) -> Result<UserStreak, StoreError> {
    let row = conn
        .query_row(
            "SELECT current_streak, longest_streak, total_reviews, last_review_date
             FROM user_stats WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((current, longest, total, last_date)) = row else {
        return Ok(UserStreak::default());
    };
    let last_review_date = last_date
        .map(|d| {
            NaiveDate::parse_from_str(&d, DATE_FORMAT)
                .map_err(|_| StoreError::Corrupt(format!("last_review_date = {d}")))
        })
        .transpose()?;

    Ok(UserStreak {
        current_streak: to_u32(current, "current_streak")?,
        longest_streak: to_u32(longest, "longest_streak")?,
        total_reviews: u64::try_from(total)
            .map_err(|_| StoreError::Corrupt(format!("total_reviews = {total}")))?,
        last_review_date,
    })
}

fn upsert_streak(conn: &Connection, user_id: &str, streak: &UserStreak) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO user_stats
             (user_id, current_streak, longest_streak, total_reviews, last_review_date, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
             current_streak = excluded.current_streak,
             longest_streak = excluded.longest_streak,
             total_reviews = excluded.total_reviews,
             last_review_date = excluded.last_review_date,
             updated_at = excluded.updated_at",
        params![
            user_id,
            streak.current_streak,
            streak.longest_streak,
            i64::try_from(streak.total_reviews).unwrap_or(i64::MAX),
            streak
                .last_review_date
                .map(|d| d.format(DATE_FORMAT).to_string()),
            now_nanos(),
        ],
    )?;
    Ok(())
}

fn insert_review_log(conn: &Connection, user_id: &str, event: &ReviewEvent) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO review_logs (user_id, card_id, rating, time_spent_ms, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            event.card_id,
            event.rating.value(),
            i64::try_from(event.duration.as_millis()).unwrap_or(i64::MAX),
            to_nanos(event.reviewed_at)?,
        ],
    )?;
    Ok(())
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and makes sure the tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                interval_days INTEGER,
                ease_factor REAL,
                repetition_count INTEGER,
                next_review_at INTEGER,
                schedule_updated_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_cards_user_due ON cards (user_id, next_review_at);

            CREATE TABLE IF NOT EXISTS user_stats (
                user_id TEXT PRIMARY KEY,
                current_streak INTEGER NOT NULL DEFAULT 0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                total_reviews INTEGER NOT NULL DEFAULT 0,
                last_review_date TEXT,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS review_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                card_id INTEGER NOT NULL,
                rating INTEGER NOT NULL,
                time_spent_ms INTEGER NOT NULL,
                reviewed_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_review_logs_user ON review_logs (user_id, reviewed_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }

    /// Authors a card with the initial schedule, due at `now`. Returns its id.
    pub fn add_card(
        &self,
        user_id: &str,
        title: &str,
        summary: Option<&str>,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let card = Card {
            id: 0,
            title: title.to_string(),
            summary: summary.map(str::to_string),
            content: content.to_string(),
            created_at: now,
            schedule: Some(CardSchedule::new(now)),
        };
        self.insert_card(user_id, &card)
    }

    /// Inserts every column of `card` except its id.
    fn insert_card(&self, user_id: &str, card: &Card) -> Result<i64, StoreError> {
        let schedule = card.schedule.as_ref();
        let next_review_at = schedule.map(|s| to_nanos(s.next_review_at)).transpose()?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cards (user_id, title, summary, content, created_at,
                                interval_days, ease_factor, repetition_count, next_review_at,
                                schedule_updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user_id,
                card.title,
                card.summary,
                card.content,
                to_nanos(card.created_at)?,
                schedule.map(|s| s.interval_days),
                schedule.map(|s| s.ease_factor),
                schedule.map(|s| s.repetition_count),
                next_review_at,
                schedule.map(|_| now_nanos()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn card(&self, card_id: i64) -> Result<Card, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
                params![card_id],
                CardRow::from_row,
            )
            .optional()?;
        row.ok_or(StoreError::CardNotFound(card_id))?.into_card()
    }

    /// Fills missing schedule columns with the initial schedule (due at `now`) and lifts
    /// ease factors below the floor.
    pub fn repair_schedules(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RepairReport, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let total: i64 = tx.query_row(
            "SELECT COUNT(*) FROM cards WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        let count_invalid = format!(
            "SELECT COUNT(*) FROM cards WHERE user_id = ?1 AND ({UNSCHEDULED} OR ease_factor < ?2)"
        );
        let invalid: i64 =
            tx.query_row(&count_invalid, params![user_id, MIN_EASE_FACTOR], |row| row.get(0))?;
        let missing = tx.execute(
            &format!(
                "UPDATE cards SET
                     interval_days = COALESCE(interval_days, 0),
                     ease_factor = COALESCE(ease_factor, ?2),
                     repetition_count = COALESCE(repetition_count, 0),
                     next_review_at = COALESCE(next_review_at, ?3),
                     schedule_updated_at = ?4
                 WHERE user_id = ?1 AND {UNSCHEDULED}"
            ),
            params![user_id, INITIAL_EASE_FACTOR, to_nanos(now)?, now_nanos()],
        )?;
        let low_ease = tx.execute(
            "UPDATE cards SET ease_factor = ?2, schedule_updated_at = ?3
             WHERE user_id = ?1 AND ease_factor < ?2",
            params![user_id, MIN_EASE_FACTOR, now_nanos()],
        )?;
        let remaining: i64 =
            tx.query_row(&count_invalid, params![user_id, MIN_EASE_FACTOR], |row| row.get(0))?;
        tx.commit()?;

        let invalid = u64::try_from(invalid).unwrap_or_default();
        let fixed = invalid.saturating_sub(u64::try_from(remaining).unwrap_or_default());
        if invalid > 0 {
            tracing::warn!(user_id, missing, low_ease, fixed, "repaired card schedules");
        }
        Ok(RepairReport {
            total_cards: u64::try_from(total).unwrap_or_default(),
            invalid_cards: invalid,
            fixed_cards: fixed,
        })
    }
}

impl CardStore for SqliteStore {
    fn fetch_due(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Card>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM cards
             WHERE user_id = ?1 AND ({UNSCHEDULED} OR next_review_at <= ?2)
             ORDER BY CASE WHEN {UNSCHEDULED} THEN created_at ELSE next_review_at END ASC, id ASC
             LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(
                params![user_id, bound_nanos(now), sql_limit(limit)],
                CardRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(CardRow::into_card).collect()
    }

    fn fetch_all(&self, user_id: &str) -> Result<Vec<Card>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![user_id], CardRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(CardRow::into_card).collect()
    }

    /// Last write wins; the store stamps the write time itself.
    fn write_schedule(&self, card_id: i64, schedule: &CardSchedule) -> Result<(), StoreError> {
        let next_review_at = to_nanos(schedule.next_review_at)?;
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE cards
             SET interval_days = ?1, ease_factor = ?2, repetition_count = ?3, next_review_at = ?4,
                 schedule_updated_at = ?5
             WHERE id = ?6",
            params![
                schedule.interval_days,
                schedule.ease_factor,
                schedule.repetition_count,
                next_review_at,
                now_nanos(),
                card_id
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::CardNotFound(card_id));
        }
        Ok(())
    }

    fn import_card(&self, user_id: &str, card: &Card) -> Result<i64, StoreError> {
        self.insert_card(user_id, card)
    }

    fn count_cards(&self, user_id: &str) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cards WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl StreakStore for SqliteStore {
    fn read_streak(&self, user_id: &str) -> Result<UserStreak, StoreError> {
        let conn = self.lock()?;
        read_streak_row(&conn, user_id)
    }

    fn write_streak(&self, user_id: &str, streak: &UserStreak) -> Result<(), StoreError> {
        let conn = self.lock()?;
        upsert_streak(&conn, user_id, streak)
    }

    fn append_review_log(&self, user_id: &str, event: &ReviewEvent) -> Result<(), StoreError> {
        let conn = self.lock()?;
        insert_review_log(&conn, user_id, event)
    }

    fn reviews_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReviewEvent>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT card_id, rating, time_spent_ms, reviewed_at FROM review_logs
             WHERE user_id = ?1 AND reviewed_at >= ?2
             ORDER BY reviewed_at",
        )?;
        let rows = stmt
            .query_map(params![user_id, bound_nanos(since)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(card_id, rating, time_spent_ms, reviewed_at)| {
                let rating = u8::try_from(rating)
                    .ok()
                    .and_then(|r| Rating::new(r).ok())
                    .ok_or_else(|| StoreError::Corrupt(format!("rating = {rating}")))?;
                Ok(ReviewEvent {
                    card_id,
                    rating,
                    duration: Duration::from_millis(u64::try_from(time_spent_ms).unwrap_or(0)),
                    reviewed_at: from_nanos(reviewed_at),
                })
            })
            .collect()
    }

    /// Log insert and streak upsert in one IMMEDIATE transaction.
    fn record_review(
        &self,
        user_id: &str,
        event: &ReviewEvent,
        today: NaiveDate,
    ) -> Result<UserStreak, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let updated = streak::record_review(&read_streak_row(&tx, user_id)?, today);
        insert_review_log(&tx, user_id, event)?;
        upsert_streak(&tx, user_id, &updated)?;
        tx.commit()?;
        Ok(updated)
    }
}
