pub mod clock;
pub mod config;
pub mod database;
pub mod export;
pub mod logging;
pub mod models;
pub mod stats;

pub use clock::{Clock, ManualClock, SystemClock};
pub use database::{CardStore, MemoryStore, SqliteStore, StoreError, StreakStore};
pub use models::{Card, CardSchedule, Rating, ReviewSession, SelectionMode, UserStreak};
