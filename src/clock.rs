//! Injected source of "now" and of the user's calendar day boundary.
//!
//! Nothing in the scheduling core reads the wall clock directly; everything that needs
//! the current time receives a [`Clock`].

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Offset, TimeZone, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Offset of the user's local day from UTC.
    fn offset(&self) -> FixedOffset;

    /// Calendar date of `now` in the user's local day.
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset()).date_naive()
    }

    /// Local midnight of [`Clock::today`], expressed in UTC.
    fn start_of_today(&self) -> DateTime<Utc> {
        let midnight = self.today().and_time(chrono::NaiveTime::MIN);
        match self.offset().from_local_datetime(&midnight).single() {
            Some(local) => local.with_timezone(&Utc),
            None => self.now(),
        }
    }
}

/// Wall clock. Uses the machine's local offset unless one is configured.
#[derive(Clone, Debug, Default)]
pub struct SystemClock {
    offset: Option<FixedOffset>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self {
            offset: Some(offset),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset.unwrap_or_else(|| *Local::now().offset())
    }
}

/// Clock that only moves when told to. Used to simulate consecutive study days.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_offset(now, Utc.fix())
    }

    pub fn with_offset(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    /// Advances by whole days, like flipping the calendar.
    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}
