use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use knowledge_cards::database::{CardStore, StreakStore};
use knowledge_cards::models::review_session::SessionConfig;
use knowledge_cards::models::{Card, CardSchedule, ReviewEvent, SchedulerConfig, SessionError};
use knowledge_cards::stats::streak_report;
use knowledge_cards::{
    Clock, ManualClock, MemoryStore, Rating, ReviewSession, SelectionMode, SqliteStore,
    StoreError, UserStreak,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const USER: &str = "learner";

fn day_one() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 18, 0, 0).unwrap()
}

fn start<S: CardStore + StreakStore>(
    store: &Arc<S>,
    clock: &Arc<ManualClock>,
    mode: SelectionMode,
) -> ReviewSession<S, ManualClock> {
    ReviewSession::start(
        USER,
        Arc::clone(store),
        Arc::clone(clock),
        &mode,
        &SessionConfig::default(),
        SchedulerConfig::deterministic(),
    )
    .unwrap()
}

fn review_all<S: CardStore + StreakStore>(
    session: &mut ReviewSession<S, ManualClock>,
    rating: Rating,
) -> Vec<CardSchedule> {
    let mut schedules = Vec::new();
    while !session.is_finished() {
        session.reveal().unwrap();
        schedules.push(session.rate(rating).unwrap().schedule);
    }
    schedules
}

#[test]
fn test_sqlite_session_persists_schedules() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(day_one()));
    let first = store.add_card(USER, "cześć", None, "hello", day_one()).unwrap();
    let second = store.add_card(USER, "proszę", None, "please", day_one()).unwrap();
    store.add_card("someone else", "x", None, "y", day_one()).unwrap();

    let mut session = start(&store, &clock, SelectionMode::Due);
    assert_eq!(session.position(), (0, 2));

    session.request_hint().unwrap();
    session.reveal().unwrap();
    let outcome = session.rate(Rating::GOOD).unwrap();
    assert_eq!(outcome.card_id, first);
    assert_eq!(outcome.schedule.interval_days, 1);

    session.reveal().unwrap();
    let outcome = session.rate(Rating::BLACKOUT).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.schedule.repetition_count, 0);
    assert!((outcome.schedule.ease_factor - 2.3).abs() < 1e-9);

    let saved = store.card(second).unwrap().schedule.unwrap();
    assert_eq!(saved, outcome.schedule);
    assert_eq!(saved.next_review_at, day_one() + Duration::days(1));

    let streak = store.read_streak(USER).unwrap();
    assert_eq!(streak.total_reviews, 2);
    assert_eq!(streak.current_streak, 1);
    assert_eq!(session.summary().successful, 1);

    // Nothing is due until tomorrow.
    let later = start(&store, &clock, SelectionMode::Due);
    assert!(later.is_finished());
}

#[test]
fn test_perfect_recall_grows_intervals_across_days() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(day_one()));
    let card_id = store.add_card(USER, "term", None, "definition", day_one()).unwrap();

    let mut intervals = Vec::new();
    for _ in 0..3 {
        let mut session = start(&store, &clock, SelectionMode::Explicit(vec![card_id]));
        intervals.extend(review_all(&mut session, Rating::EASY).iter().map(|s| s.interval_days));
        clock.advance_days(1);
    }

    assert_eq!(intervals, vec![1, 6, 16]);
    let schedule = store.card(card_id).unwrap().schedule.unwrap();
    assert!((schedule.ease_factor - 2.8).abs() < 1e-9);
    assert_eq!(schedule.repetition_count, 3);
}

#[test]
fn test_streak_over_a_week() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(day_one()));
    let card_id = store.add_card(USER, "term", None, "definition", day_one()).unwrap();

    for _ in 0..3 {
        let mut session = start(&store, &clock, SelectionMode::Explicit(vec![card_id]));
        review_all(&mut session, Rating::GOOD);
        // A second session on the same day does not extend the streak.
        let mut again = start(&store, &clock, SelectionMode::Explicit(vec![card_id]));
        review_all(&mut again, Rating::GOOD);
        clock.advance_days(1);
    }
    let streak = store.read_streak(USER).unwrap();
    assert_eq!(streak.current_streak, 3);
    assert_eq!(streak.total_reviews, 6);

    clock.advance_days(2);
    let report = streak_report(&*store, &*clock, USER, 10).unwrap();
    assert!(!report.streak_active);
    assert_eq!(report.progress.reviewed_today, 0);

    let mut session = start(&store, &clock, SelectionMode::Explicit(vec![card_id]));
    review_all(&mut session, Rating::FAIR);
    let streak = store.read_streak(USER).unwrap();
    assert_eq!(
        streak,
        UserStreak {
            current_streak: 1,
            longest_streak: 3,
            total_reviews: 7,
            last_review_date: Some(clock.today()),
        }
    );
    assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 8).unwrap());
}

#[test]
fn test_legacy_card_without_schedule_is_due() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(day_one()));
    store
        .insert_card(
            USER,
            Card {
                id: 40,
                title: "old".to_string(),
                summary: None,
                content: "imported before scheduling existed".to_string(),
                created_at: day_one() - Duration::days(90),
                schedule: None,
            },
        )
        .unwrap();

    let mut session = start(&store, &clock, SelectionMode::Due);
    let schedules = review_all(&mut session, Rating::GOOD);
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].interval_days, 1);
    assert_eq!(schedules[0].repetition_count, 1);
}

/// Store whose schedule writes fail while `offline` is set and whose review recording
/// fails while `stats_offline` is set.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    offline: AtomicBool,
    stats_offline: AtomicBool,
}

impl CardStore for FlakyStore {
    fn fetch_due(&self, user_id: &str, now: DateTime<Utc>, limit: usize) -> Result<Vec<Card>, StoreError> {
        self.inner.fetch_due(user_id, now, limit)
    }

    fn fetch_all(&self, user_id: &str) -> Result<Vec<Card>, StoreError> {
        self.inner.fetch_all(user_id)
    }

    fn write_schedule(&self, card_id: i64, schedule: &CardSchedule) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("network down".to_string()));
        }
        self.inner.write_schedule(card_id, schedule)
    }

    fn import_card(&self, user_id: &str, card: &Card) -> Result<i64, StoreError> {
        self.inner.import_card(user_id, card)
    }
}

impl StreakStore for FlakyStore {
    fn read_streak(&self, user_id: &str) -> Result<UserStreak, StoreError> {
        self.inner.read_streak(user_id)
    }

    fn write_streak(&self, user_id: &str, streak: &UserStreak) -> Result<(), StoreError> {
        self.inner.write_streak(user_id, streak)
    }

    fn append_review_log(&self, user_id: &str, event: &ReviewEvent) -> Result<(), StoreError> {
        self.inner.append_review_log(user_id, event)
    }

    fn reviews_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<ReviewEvent>, StoreError> {
        self.inner.reviews_since(user_id, since)
    }

    fn record_review(
        &self,
        user_id: &str,
        event: &ReviewEvent,
        today: NaiveDate,
    ) -> Result<UserStreak, StoreError> {
        if self.stats_offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("stats service down".to_string()));
        }
        self.inner.record_review(user_id, event, today)
    }
}

#[test]
fn test_failed_write_is_retried_without_double_counting() {
    let store = Arc::new(FlakyStore::default());
    let clock = Arc::new(ManualClock::new(day_one()));
    let card_id = store.inner.add_card(USER, "term", None, "definition", day_one()).unwrap();
    store.inner.add_card(USER, "next", None, "card", day_one()).unwrap();

    let mut session = start(&store, &clock, SelectionMode::Due);
    session.reveal().unwrap();

    store.offline.store(true, Ordering::SeqCst);
    let err = session.rate(Rating::GOOD).unwrap_err();
    assert!(matches!(err, SessionError::Persistence(StoreError::Unavailable(_))));
    assert_eq!(session.pending_card_id(), Some(card_id));
    assert_eq!(session.position(), (0, 2));
    assert!(matches!(session.rate(Rating::EASY), Err(SessionError::AwaitingRetry)));
    assert!(matches!(session.reveal(), Err(SessionError::AwaitingRetry)));
    assert_eq!(store.read_streak(USER).unwrap(), UserStreak::default());

    // The retry lands on the next day but still credits the day of the rating.
    clock.advance(Duration::hours(7));
    assert!(matches!(session.retry_pending(), Err(SessionError::Persistence(_))));
    store.offline.store(false, Ordering::SeqCst);
    let outcome = session.retry_pending().unwrap();

    assert_eq!(outcome.card_id, card_id);
    assert_eq!(outcome.schedule.next_review_at, day_one() + Duration::days(1));
    assert_eq!(session.pending_card_id(), None);
    assert_eq!(session.position(), (1, 2));
    assert!(matches!(session.retry_pending(), Err(SessionError::NothingPending)));

    let streak = store.read_streak(USER).unwrap();
    assert_eq!(streak.total_reviews, 1);
    assert_eq!(streak.last_review_date, Some(day_one().date_naive()));
    assert_eq!(store.inner.card(card_id).unwrap().schedule, Some(outcome.schedule));
}

#[test]
fn test_abort_refuses_half_saved_rating() {
    let store = Arc::new(FlakyStore::default());
    let clock = Arc::new(ManualClock::new(day_one()));
    let card_id = store.inner.add_card(USER, "term", None, "definition", day_one()).unwrap();

    let mut session = start(&store, &clock, SelectionMode::Due);
    session.reveal().unwrap();
    store.stats_offline.store(true, Ordering::SeqCst);
    assert!(matches!(session.rate(Rating::GOOD), Err(SessionError::Persistence(_))));

    // The schedule is written but the review is not recorded yet.
    assert_eq!(store.inner.card(card_id).unwrap().schedule.unwrap().repetition_count, 1);
    assert!(matches!(session.abort(), Err(SessionError::AwaitingRetry)));
    assert!(!session.is_finished());
    assert_eq!(session.pending_card_id(), Some(card_id));

    store.stats_offline.store(false, Ordering::SeqCst);
    let outcome = session.retry_pending().unwrap();
    assert!(outcome.finished);

    let streak = store.read_streak(USER).unwrap();
    assert_eq!(streak.total_reviews, 1);
    assert_eq!(store.reviews_since(USER, day_one()).unwrap().len(), 1);
}

#[test]
fn test_abort_discards_rating_that_wrote_nothing() {
    let store = Arc::new(FlakyStore::default());
    let clock = Arc::new(ManualClock::new(day_one()));
    let card_id = store.inner.add_card(USER, "term", None, "definition", day_one()).unwrap();

    let mut session = start(&store, &clock, SelectionMode::Due);
    session.reveal().unwrap();
    store.offline.store(true, Ordering::SeqCst);
    assert!(session.rate(Rating::GOOD).is_err());

    let summary = session.abort().unwrap().clone();
    assert_eq!(summary.reviewed, 0);
    assert!(session.is_finished());
    assert_eq!(store.inner.card(card_id).unwrap().schedule, Some(CardSchedule::new(day_one())));
    assert_eq!(store.read_streak(USER).unwrap(), UserStreak::default());
    assert!(store.reviews_since(USER, day_one()).unwrap().is_empty());
}

fn review_once_at(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>, card_id: i64, at: DateTime<Utc>) -> UserStreak {
    clock.set(at);
    let mut session = start(store, clock, SelectionMode::Explicit(vec![card_id]));
    session.reveal().unwrap();
    session.rate(Rating::GOOD).unwrap().streak
}

#[test]
fn test_streak_follows_local_calendar_days() {
    let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();

    // 23:30 local, then 19:30 local the next day: consecutive local dates.
    let store = Arc::new(MemoryStore::new());
    let first = Utc.with_ymd_and_hms(2025, 3, 3, 14, 30, 0).unwrap();
    let clock = Arc::new(ManualClock::with_offset(first, tokyo));
    let card_id = store.add_card(USER, "term", None, "definition", first).unwrap();
    assert_eq!(review_once_at(&store, &clock, card_id, first).current_streak, 1);
    let streak = review_once_at(&store, &clock, card_id, first + Duration::hours(20));
    assert_eq!(streak.current_streak, 2);
    assert_eq!(streak.last_review_date, NaiveDate::from_ymd_opt(2025, 3, 4));

    // Different UTC dates, same local date: still day one.
    let store = Arc::new(MemoryStore::new());
    let first = Utc.with_ymd_and_hms(2025, 3, 3, 23, 30, 0).unwrap();
    let clock = Arc::new(ManualClock::with_offset(first, tokyo));
    let card_id = store.add_card(USER, "term", None, "definition", first).unwrap();
    review_once_at(&store, &clock, card_id, first);
    let streak = review_once_at(&store, &clock, card_id, Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap());
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.total_reviews, 2);

    // Same UTC date, different local dates: the streak grows.
    let store = Arc::new(MemoryStore::new());
    let first = Utc.with_ymd_and_hms(2025, 3, 3, 14, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::with_offset(first, tokyo));
    let card_id = store.add_card(USER, "term", None, "definition", first).unwrap();
    review_once_at(&store, &clock, card_id, first);
    let streak = review_once_at(&store, &clock, card_id, Utc.with_ymd_and_hms(2025, 3, 3, 16, 0, 0).unwrap());
    assert_eq!(streak.current_streak, 2);
}
