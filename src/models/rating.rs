//! Recall-quality rating given after a card's answer has been revealed.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ratings at or above this value count as a successful recall.
pub const SUCCESS_THRESHOLD: u8 = 3;

/// Highest rating a user can give.
pub const MAX_RATING: u8 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RatingError {
    #[error("rating {0} is outside 0-{MAX_RATING}")]
    OutOfRange(u8),
}

/// Quality of a response: 0 = total blackout, 5 = perfect recall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const BLACKOUT: Rating = Rating(0);
    pub const INCORRECT: Rating = Rating(1);
    pub const HARD: Rating = Rating(2);
    pub const FAIR: Rating = Rating(3);
    pub const GOOD: Rating = Rating(4);
    pub const EASY: Rating = Rating(5);

    pub fn new(value: u8) -> Result<Self, RatingError> {
        if value > MAX_RATING {
            return Err(RatingError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 >= SUCCESS_THRESHOLD
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "Forgot",
            1 => "Incorrect",
            2 => "Hard",
            3 => "Fair",
            4 => "Good",
            _ => "Easy",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.label())
    }
}
