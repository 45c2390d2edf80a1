//! In-process store backed by a mutex-guarded map.
use super::{CardStore, StoreError, StreakStore};
use crate::models::due_cards::select_due;
use crate::models::streak;
use crate::models::{Card, CardSchedule, ReviewEvent, UserStreak};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    cards: BTreeMap<i64, (String, Card)>,
    streaks: HashMap<String, UserStreak>,
    review_logs: Vec<(String, ReviewEvent)>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Authors a new card with the initial schedule, due at `now`.
    pub fn add_card(
        &self,
        user_id: &str,
        title: &str,
        summary: Option<&str>,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let id = state.next_id;
        let card = Card {
            id,
            title: title.to_string(),
            summary: summary.map(str::to_string),
            content: content.to_string(),
            created_at: now,
            schedule: Some(CardSchedule::new(now)),
        };
        state.cards.insert(id, (user_id.to_string(), card));
        Ok(id)
    }

    /// Stores `card` as is, keeping its id. Lets callers seed cards without a schedule.
    pub fn insert_card(&self, user_id: &str, card: Card) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.next_id = state.next_id.max(card.id);
        state.cards.insert(card.id, (user_id.to_string(), card));
        Ok(())
    }

    pub fn card(&self, card_id: i64) -> Result<Card, StoreError> {
        self.lock()?
            .cards
            .get(&card_id)
            .map(|(_, card)| card.clone())
            .ok_or(StoreError::CardNotFound(card_id))
    }
}

impl CardStore for MemoryStore {
    fn fetch_due(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Card>, StoreError> {
        Ok(select_due(self.fetch_all(user_id)?, now, limit))
    }

    fn fetch_all(&self, user_id: &str) -> Result<Vec<Card>, StoreError> {
        Ok(self
            .lock()?
            .cards
            .values()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, card)| card.clone())
            .collect())
    }

    fn write_schedule(&self, card_id: i64, schedule: &CardSchedule) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let (_, card) = state
            .cards
            .get_mut(&card_id)
            .ok_or(StoreError::CardNotFound(card_id))?;
        card.schedule = Some(schedule.clone());
        Ok(())
    }

    fn import_card(&self, user_id: &str, card: &Card) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let id = state.next_id;
        let card = Card { id, ..card.clone() };
        state.cards.insert(id, (user_id.to_string(), card));
        Ok(id)
    }
}

impl StreakStore for MemoryStore {
    fn read_streak(&self, user_id: &str) -> Result<UserStreak, StoreError> {
        Ok(self
            .lock()?
            .streaks
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    fn write_streak(&self, user_id: &str, streak: &UserStreak) -> Result<(), StoreError> {
        self.lock()?
            .streaks
            .insert(user_id.to_string(), streak.clone());
        Ok(())
    }

    fn append_review_log(&self, user_id: &str, event: &ReviewEvent) -> Result<(), StoreError> {
        self.lock()?
            .review_logs
            .push((user_id.to_string(), event.clone()));
        Ok(())
    }

    fn reviews_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReviewEvent>, StoreError> {
        Ok(self
            .lock()?
            .review_logs
            .iter()
            .filter(|(owner, event)| owner == user_id && event.reviewed_at >= since)
            .map(|(_, event)| event.clone())
            .collect())
    }

    fn record_review(
        &self,
        user_id: &str,
        event: &ReviewEvent,
        today: NaiveDate,
    ) -> Result<UserStreak, StoreError> {
        let mut state = self.lock()?;
        let previous = state.streaks.get(user_id).cloned().unwrap_or_default();
        let updated = streak::record_review(&previous, today);
        state
            .review_logs
            .push((user_id.to_string(), event.clone()));
        state.streaks.insert(user_id.to_string(), updated.clone());
        Ok(updated)
    }
}
