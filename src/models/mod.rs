pub mod achievements;
pub mod card;
pub mod card_schedule;
pub mod due_cards;
pub mod hint;
pub mod rating;
pub mod review_event;
pub mod review_session;
pub mod sm2;
pub mod streak;

pub use achievements::{Achievement, AchievementStatus, DailyProgress};
pub use card::Card;
pub use card_schedule::CardSchedule;
pub use due_cards::SelectionMode;
pub use rating::Rating;
pub use review_event::ReviewEvent;
pub use review_session::{CardPhase, ReviewSession, SessionConfig, SessionError};
pub use sm2::{FailurePolicy, SchedulerConfig};
pub use streak::UserStreak;
