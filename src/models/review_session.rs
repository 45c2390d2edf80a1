//! Review session management for spaced repetition practice.
//!
//! One card is in flight at a time. Each card moves Hidden → (Hinted) → Revealed → Rated;
//! rating computes the next schedule, writes it back, folds the review into the streak and
//! moves on to the next card. A failed write keeps the computed state so the host can
//! retry without showing the card again.

use super::due_cards::{DEFAULT_SESSION_LIMIT, SelectionMode, build_working_set};
use super::hint;
use super::rating::RatingError;
use super::sm2::{SchedulerConfig, calculate_next_review};
use super::{Card, CardSchedule, Rating, ReviewEvent, UserStreak};
use crate::clock::Clock;
use crate::config::ConfigError;
use crate::database::{CardStore, StoreError, StreakStore};
use chrono::{DateTime, NaiveDate, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_HINT_DIFFICULTY: f64 = 0.6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of cards in one session.
    pub limit: usize,
    /// Share of the answer masked in the hint view, 0..=1.
    pub hint_difficulty: f64,
    pub daily_goal: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SESSION_LIMIT,
            hint_difficulty: DEFAULT_HINT_DIFFICULTY,
            daily_goal: super::achievements::DEFAULT_DAILY_GOAL,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::Invalid("session limit must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.hint_difficulty) {
            return Err(ConfigError::Invalid(format!(
                "hint_difficulty must be within 0..=1, got {}",
                self.hint_difficulty
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardPhase {
    /// Only the prompt is visible.
    Hidden,
    /// Prompt plus a partially masked answer.
    Hinted,
    /// Full answer visible; waiting for a rating.
    Revealed,
    /// Rated, but the write-back has not gone through yet.
    Rated,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot rate a card that is {0:?}; reveal it first")]
    NotRevealed(CardPhase),
    #[error("the answer is already revealed")]
    AlreadyRevealed,
    #[error("a rating is waiting to be saved; retry it first")]
    AwaitingRetry,
    #[error("the session has ended")]
    Finished,
    #[error(transparent)]
    InvalidRating(#[from] RatingError),
    #[error("nothing to retry")]
    NothingPending,
    #[error("failed to load cards: {0}")]
    Fetch(#[source] StoreError),
    #[error("failed to save review: {0}")]
    Persistence(#[source] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A rating whose write-back has not completed.
#[derive(Clone, Debug)]
struct PendingReview {
    card_index: usize,
    event: ReviewEvent,
    schedule: CardSchedule,
    today: NaiveDate,
    schedule_saved: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RateOutcome {
    pub card_id: i64,
    pub schedule: CardSchedule,
    pub streak: UserStreak,
    pub duration: Duration,
    /// True when this was the last card.
    pub finished: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub cards_in_session: usize,
    pub reviewed: usize,
    pub successful: usize,
    pub total_time: Duration,
}

pub struct ReviewSession<S: ?Sized, C: ?Sized> {
    user_id: String,
    cards: Vec<Card>,
    cursor: usize,
    phase: CardPhase,
    hint: Option<String>,
    shown_at: DateTime<Utc>,
    pending: Option<PendingReview>,
    summary: SessionSummary,
    aborted: bool,
    scheduler: SchedulerConfig,
    hint_difficulty: f64,
    rng: StdRng,
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> ReviewSession<S, C>
where
    S: CardStore + StreakStore + ?Sized,
    C: Clock + ?Sized,
{
    /// Starts a session over an already selected working set.
    pub fn new(user_id: &str, cards: Vec<Card>, store: Arc<S>, clock: Arc<C>) -> Self {
        let shown_at = clock.now();
        tracing::info!(user_id, cards = cards.len(), "review session started");
        Self {
            user_id: user_id.to_string(),
            summary: SessionSummary {
                cards_in_session: cards.len(),
                ..SessionSummary::default()
            },
            cards,
            cursor: 0,
            phase: CardPhase::Hidden,
            hint: None,
            shown_at,
            pending: None,
            aborted: false,
            scheduler: SchedulerConfig::default(),
            hint_difficulty: DEFAULT_HINT_DIFFICULTY,
            rng: StdRng::from_entropy(),
            store,
            clock,
        }
    }

    /// Selects the working set from `store` and starts a session over it.
    pub fn start(
        user_id: &str,
        store: Arc<S>,
        clock: Arc<C>,
        mode: &SelectionMode,
        config: &SessionConfig,
        scheduler: SchedulerConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        scheduler.validate()?;
        let mut rng = StdRng::from_entropy();
        let cards = build_working_set(&*store, user_id, clock.now(), mode, config.limit, &mut rng)
            .map_err(SessionError::Fetch)?;
        Ok(Self::new(user_id, cards, store, clock)
            .with_scheduler(scheduler)
            .with_hint_difficulty(config.hint_difficulty)
            .with_rng(rng))
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_hint_difficulty(mut self, difficulty: f64) -> Self {
        self.hint_difficulty = difficulty;
        self
    }

    /// Replaces the random source used for hints and interval fuzzing.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn current_card(&self) -> Option<&Card> {
        if self.aborted {
            return None;
        }
        self.cards.get(self.cursor)
    }

    pub fn phase(&self) -> CardPhase {
        self.phase
    }

    /// The masked answer, once a hint was requested for the current card.
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Zero-based index of the current card and the size of the working set.
    pub fn position(&self) -> (usize, usize) {
        (self.cursor, self.cards.len())
    }

    pub fn is_finished(&self) -> bool {
        self.aborted || self.cursor >= self.cards.len()
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Card whose rating still has to be saved, if any.
    pub fn pending_card_id(&self) -> Option<i64> {
        self.pending.as_ref().map(|p| p.event.card_id)
    }

    /// Shows a partially masked answer. Repeated calls return the same hint.
    pub fn request_hint(&mut self) -> Result<&str, SessionError> {
        if self.is_finished() {
            return Err(SessionError::Finished);
        }
        match self.phase {
            CardPhase::Hidden => {
                let masked = hint::mask(
                    &self.cards[self.cursor].content,
                    self.hint_difficulty,
                    &mut self.rng,
                );
                self.phase = CardPhase::Hinted;
                Ok(self.hint.insert(masked).as_str())
            }
            CardPhase::Hinted => Ok(self.hint.as_deref().unwrap_or_default()),
            CardPhase::Revealed => Err(SessionError::AlreadyRevealed),
            CardPhase::Rated => Err(SessionError::AwaitingRetry),
        }
    }

    /// Shows the full answer of the current card.
    pub fn reveal(&mut self) -> Result<&Card, SessionError> {
        if self.is_finished() {
            return Err(SessionError::Finished);
        }
        match self.phase {
            CardPhase::Hidden | CardPhase::Hinted | CardPhase::Revealed => {
                self.phase = CardPhase::Revealed;
                Ok(&self.cards[self.cursor])
            }
            CardPhase::Rated => Err(SessionError::AwaitingRetry),
        }
    }

    /// Rates a raw value coming from the host, rejecting anything outside 0-5.
    pub fn rate_value(&mut self, value: u8) -> Result<RateOutcome, SessionError> {
        let rating = Rating::new(value)?;
        self.rate(rating)
    }

    /// Rates the revealed card, saves the result and advances.
    ///
    /// Rejected without touching any card unless the answer is revealed. On a
    /// [`SessionError::Persistence`] error the rating is kept for [`Self::retry_pending`].
    pub fn rate(&mut self, rating: Rating) -> Result<RateOutcome, SessionError> {
        if self.is_finished() {
            return Err(SessionError::Finished);
        }
        match self.phase {
            CardPhase::Revealed => {}
            CardPhase::Rated => return Err(SessionError::AwaitingRetry),
            phase => return Err(SessionError::NotRevealed(phase)),
        }

        let now = self.clock.now();
        let card = &self.cards[self.cursor];
        let schedule = calculate_next_review(
            &card.effective_schedule(self.scheduler.initial_ease_factor),
            rating,
            now,
            &self.scheduler,
            &mut self.rng,
        );
        let event = ReviewEvent {
            card_id: card.id,
            rating,
            duration: (now - self.shown_at).to_std().unwrap_or_default(),
            reviewed_at: now,
        };

        self.phase = CardPhase::Rated;
        self.pending = Some(PendingReview {
            card_index: self.cursor,
            event,
            schedule,
            today: self.clock.today(),
            schedule_saved: false,
        });
        self.flush_pending()
    }

    /// Retries the write-back of a rating that failed to save.
    pub fn retry_pending(&mut self) -> Result<RateOutcome, SessionError> {
        if self.pending.is_none() {
            return Err(SessionError::NothingPending);
        }
        self.flush_pending()
    }

    /// Ends the session early. Cards not yet rated keep their schedules.
    ///
    /// A pending rating that wrote nothing yet is discarded. One whose schedule is already
    /// saved but whose review is not yet recorded must be retried first, so this returns
    /// [`SessionError::AwaitingRetry`] and leaves the session running.
    pub fn abort(&mut self) -> Result<&SessionSummary, SessionError> {
        if self.pending.as_ref().is_some_and(|p| p.schedule_saved) {
            return Err(SessionError::AwaitingRetry);
        }
        if let Some(pending) = self.pending.take() {
            tracing::warn!(
                user_id = %self.user_id,
                card_id = pending.event.card_id,
                "session aborted with an unsaved rating"
            );
        }
        self.aborted = true;
        tracing::info!(user_id = %self.user_id, reviewed = self.summary.reviewed, "review session aborted");
        Ok(&self.summary)
    }

    fn flush_pending(&mut self) -> Result<RateOutcome, SessionError> {
        let Some(pending) = self.pending.as_mut() else {
            return Err(SessionError::NothingPending);
        };

        if !pending.schedule_saved {
            if let Err(err) = self
                .store
                .write_schedule(pending.event.card_id, &pending.schedule)
            {
                tracing::warn!(card_id = pending.event.card_id, error = %err, "schedule write failed");
                return Err(SessionError::Persistence(err));
            }
            pending.schedule_saved = true;
        }

        let streak = match self
            .store
            .record_review(&self.user_id, &pending.event, pending.today)
        {
            Ok(streak) => streak,
            Err(err) => {
                tracing::warn!(card_id = pending.event.card_id, error = %err, "streak update failed");
                return Err(SessionError::Persistence(err));
            }
        };

        let Some(pending) = self.pending.take() else {
            return Err(SessionError::NothingPending);
        };
        self.cards[pending.card_index].schedule = Some(pending.schedule.clone());
        self.summary.reviewed += 1;
        if pending.event.rating.is_success() {
            self.summary.successful += 1;
        }
        self.summary.total_time += pending.event.duration;
        self.advance();

        let finished = self.is_finished();
        if finished {
            tracing::info!(
                user_id = %self.user_id,
                reviewed = self.summary.reviewed,
                successful = self.summary.successful,
                "review session finished"
            );
        }
        Ok(RateOutcome {
            card_id: pending.event.card_id,
            schedule: pending.schedule,
            streak,
            duration: pending.event.duration,
            finished,
        })
    }

    fn advance(&mut self) {
        self.cursor += 1;
        self.phase = CardPhase::Hidden;
        self.hint = None;
        self.shown_at = self.clock.now();
    }
}
