//! One completed rating, as written to the review log.
use super::Rating;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub card_id: i64,
    pub rating: Rating,
    /// Time between the card being shown and it being rated.
    pub duration: Duration,
    pub reviewed_at: DateTime<Utc>,
}
