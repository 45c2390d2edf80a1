//! Card is a knowledge card: a prompt (title and optional summary) and its answer content.
use super::CardSchedule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// `None` for cards stored before scheduling existed; those count as due.
    pub schedule: Option<CardSchedule>,
}

impl Card {
    /// The stored schedule, or an initial one starting at `initial_ease` for cards that
    /// never had any.
    pub fn effective_schedule(&self, initial_ease: f64) -> CardSchedule {
        self.schedule
            .clone()
            .unwrap_or_else(|| CardSchedule::with_ease(self.created_at, initial_ease))
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.schedule
            .as_ref()
            .map(|s| s.next_review_at)
            .unwrap_or(self.created_at)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match &self.schedule {
            Some(schedule) => schedule.is_due(now),
            None => true,
        }
    }
}
