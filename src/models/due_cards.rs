//! Picks the cards shown in one review session.
//!
//! Due mode keeps cards whose review time has passed, oldest first, capped at the session
//! limit so a neglected deck cannot turn into a thousand-card sitting. Practice modes skip
//! the due filter: a random sample of the deck or a caller-chosen set of cards.

use super::Card;
use crate::database::{CardStore, StoreError};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_SESSION_LIMIT: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionMode {
    /// Cards due at "now", most overdue first.
    Due,
    /// Uniform random sample of the whole deck.
    RandomSample,
    /// Exactly these cards, in this order. Unknown ids are skipped.
    Explicit(Vec<i64>),
}

/// Due cards in non-decreasing due order, truncated to `limit`.
pub fn select_due(cards: Vec<Card>, now: DateTime<Utc>, limit: usize) -> Vec<Card> {
    let mut due: Vec<Card> = cards.into_iter().filter(|c| c.is_due(now)).collect();
    due.sort_by_key(|c| (c.due_at(), c.id));
    due.truncate(limit);
    due
}

pub fn sample_random<R: Rng + ?Sized>(mut cards: Vec<Card>, limit: usize, rng: &mut R) -> Vec<Card> {
    let amount = limit.min(cards.len());
    let (sample, _) = cards.partial_shuffle(rng, amount);
    sample.to_vec()
}

pub fn select_by_ids(cards: Vec<Card>, ids: &[i64], limit: usize) -> Vec<Card> {
    let mut by_id: HashMap<i64, Card> =
        cards.into_iter().map(|c| (c.id, c)).collect();
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(**id))
        .filter_map(|id| by_id.remove(id))
        .take(limit)
        .collect()
}

/// Fetches the session working set for `user_id`.
///
/// An empty result means nothing to review; store failures are returned as errors.
pub fn build_working_set<S, R>(
    store: &S,
    user_id: &str,
    now: DateTime<Utc>,
    mode: &SelectionMode,
    limit: usize,
    rng: &mut R,
) -> Result<Vec<Card>, StoreError>
where
    S: CardStore + ?Sized,
    R: Rng + ?Sized,
{
    let cards = match mode {
        SelectionMode::Due => store.fetch_due(user_id, now, limit)?,
        SelectionMode::RandomSample => sample_random(store.fetch_all(user_id)?, limit, rng),
        SelectionMode::Explicit(ids) => select_by_ids(store.fetch_all(user_id)?, ids, limit),
    };
    tracing::debug!(user_id, ?mode, count = cards.len(), "built working set");
    Ok(cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardSchedule;
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    fn card(id: i64, due_in_hours: Option<i64>) -> Card {
        let created_at = now() - Duration::days(10);
        Card {
            id,
            title: format!("card {id}"),
            summary: None,
            content: "answer".to_string(),
            created_at,
            schedule: due_in_hours.map(|h| {
                let mut s = CardSchedule::new(created_at);
                s.next_review_at = now() + Duration::hours(h);
                s
            }),
        }
    }

    fn ids(cards: &[Card]) -> Vec<i64> {
        cards.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_due_cards_ordered_oldest_first() {
        let cards = vec![
            card(1, Some(-1)),
            card(2, Some(5)),
            card(3, Some(-48)),
            card(4, None),
            card(5, Some(0)),
        ];
        let selected = select_due(cards, now(), usize::MAX);
        assert_eq!(ids(&selected), vec![4, 3, 1, 5]);
        assert!(
            selected
                .windows(2)
                .all(|w| w[0].due_at() <= w[1].due_at())
        );
    }

    #[test]
    fn test_due_cards_truncated_to_limit() {
        let cards = (1..=80).map(|i| card(i, Some(-i))).collect();
        let selected = select_due(cards, now(), DEFAULT_SESSION_LIMIT);
        assert_eq!(selected.len(), DEFAULT_SESSION_LIMIT);
        assert_eq!(selected[0].id, 80);
    }

    #[test]
    fn test_nothing_due_is_empty() {
        let cards = vec![card(1, Some(3)), card(2, Some(24))];
        assert!(select_due(cards, now(), 50).is_empty());
    }

    #[test]
    fn test_random_sample_ignores_due_time() {
        let cards: Vec<Card> = (1..=10).map(|i| card(i, Some(100))).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let sample = sample_random(cards, 4, &mut rng);
        assert_eq!(sample.len(), 4);
        let unique: HashSet<i64> = ids(&sample).into_iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_explicit_ids_keep_caller_order() {
        let cards: Vec<Card> = (1..=5).map(|i| card(i, Some(100))).collect();
        let selected = select_by_ids(cards, &[4, 2, 99, 4, 1], 50);
        assert_eq!(ids(&selected), vec![4, 2, 1]);
    }
}
