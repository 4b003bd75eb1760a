//! Crossing clock — the single source of "now" for detection timestamps,
//! the current competency and the report window anchor.

use crate::period::{last_n_competencies, Competency};
use chrono::{NaiveDate, NaiveDateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrossingClock {
    /// Wall clock, UTC.
    System,
    /// Frozen instant (tests and replays).
    Fixed(NaiveDateTime),
}

impl CrossingClock {
    pub fn system() -> Self {
        CrossingClock::System
    }

    /// Frozen at midday on the given date.
    pub fn fixed_on(date: NaiveDate) -> Self {
        CrossingClock::Fixed(date.and_hms_opt(12, 0, 0).unwrap_or_default())
    }

    pub fn now(&self) -> NaiveDateTime {
        match self {
            CrossingClock::System   => Utc::now().naive_utc(),
            CrossingClock::Fixed(t) => *t,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    pub fn current_competency(&self) -> Competency {
        Competency::of_date(self.today())
    }

    /// The `n` competencies ending at the current month, oldest first.
    pub fn last_n_competencies(&self, n: usize) -> Vec<Competency> {
        last_n_competencies(n, self.current_competency())
    }
}

impl Default for CrossingClock {
    fn default() -> Self {
        CrossingClock::System
    }
}
