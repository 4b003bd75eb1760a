//! Competency (fiscal month) handling.
//!
//! Source systems hand us at least three period spellings:
//!   - `YYYY-MM`  (canonical, used for every aggregation key)
//!   - `YYYYMM`   (bank and guide exports)
//!   - `MM/YYYY`  (self-assessments and the public boundary)
//!
//! RULE: every cross-source comparison keys on `Competency`, never on the raw
//! string. A raw period that does not parse is "no data", not an error.

use crate::error::{CrossingError, CrossingResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Day of the following month on which the monthly filing falls due.
pub const FILING_DUE_DAY: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Competency {
    year: i32,
    month: u32,
}

impl Competency {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=9999).contains(&year) && (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Accepts `YYYY-MM`, `YYYYMM` or `MM/YYYY`. Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !raw.is_ascii() {
            return None;
        }
        let bytes = raw.as_bytes();
        let (year, month) = match bytes.len() {
            7 if bytes[4] == b'-' => (&raw[..4], &raw[5..]),
            7 if bytes[2] == b'/' => (&raw[3..], &raw[..2]),
            6 => (&raw[..4], &raw[4..]),
            _ => return None,
        };
        Self::new(digits(year)? as i32, digits(month)?)
    }

    /// Parse a period received on the public boundary. Unlike record
    /// periods, an unparseable value here is the caller's mistake.
    pub fn from_public(raw: &str) -> CrossingResult<Self> {
        Self::parse(raw).ok_or_else(|| CrossingError::InvalidPeriod {
            raw: raw.to_string(),
        })
    }

    pub fn of_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Half-open date window `[first day, first day of next month)`.
    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        (self.first_day(), self.succ().first_day())
    }

    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn pred(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    /// Date on which the ordinary filing for this competency falls due.
    pub fn filing_due_date(&self) -> NaiveDate {
        let next = self.succ();
        NaiveDate::from_ymd_opt(next.year, next.month, FILING_DUE_DAY).unwrap_or(NaiveDate::MAX)
    }

    /// `MM/YYYY`, the spelling used on the public boundary.
    pub fn public_label(&self) -> String {
        format!("{:02}/{:04}", self.month, self.year)
    }
}

impl fmt::Display for Competency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl From<Competency> for String {
    fn from(c: Competency) -> Self {
        c.to_string()
    }
}

impl TryFrom<String> for Competency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Competency::parse(&value).ok_or_else(|| format!("invalid competency '{value}'"))
    }
}

/// Canonical `YYYY-MM` key for a raw period, or `None` if unparseable.
pub fn canonical_period(raw: &str) -> Option<String> {
    Competency::parse(raw).map(|c| c.to_string())
}

/// The `n` competencies ending at `current`, oldest first.
pub fn last_n_competencies(n: usize, current: Competency) -> Vec<Competency> {
    let mut out = Vec::with_capacity(n);
    let mut cursor = current;
    for _ in 0..n {
        out.push(cursor);
        cursor = cursor.pred();
    }
    out.reverse();
    out
}

fn digits(s: &str) -> Option<u32> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}
