//! Severity tiers and the shared percentage band tables.
//!
//! RULE: every check that classifies a percentage goes through a
//! `SeverityBands` table. Tables are evaluated top-down with strict `>`;
//! the first tier whose minimum is exceeded wins, otherwise the floor.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "BAIXA")]
    Low,
    #[serde(rename = "MEDIA")]
    Medium,
    #[serde(rename = "ALTA")]
    High,
    #[serde(rename = "CRITICA")]
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low      => "BAIXA",
            Severity::Medium   => "MEDIA",
            Severity::High     => "ALTA",
            Severity::Critical => "CRITICA",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "BAIXA"   => Some(Severity::Low),
            "MEDIA"   => Some(Severity::Medium),
            "ALTA"    => Some(Severity::High),
            "CRITICA" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Points subtracted from the risk score per divergence of this tier.
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Low      => 2,
            Severity::Medium   => 12,
            Severity::High     => 20,
            Severity::Critical => 35,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered `(minimum percent, severity)` table with a floor tier.
#[derive(Debug, Clone, Copy)]
pub struct SeverityBands {
    pub tiers: &'static [(f64, Severity)],
    pub floor: Severity,
}

impl SeverityBands {
    pub fn classify(&self, percent: f64) -> Severity {
        self.tiers
            .iter()
            .find(|(min, _)| percent > *min)
            .map(|(_, severity)| *severity)
            .unwrap_or(self.floor)
    }
}

/// Revenue omission: >50 critical, >20 high, >5 medium, else low.
pub const OMISSION_BANDS: SeverityBands = SeverityBands {
    tiers: &[(50.0, Severity::Critical), (20.0, Severity::High), (5.0, Severity::Medium)],
    floor: Severity::Low,
};

/// Non-payment and sublimit excess: >50 critical, >20 high, else medium.
pub const SHORTFALL_BANDS: SeverityBands = SeverityBands {
    tiers: &[(50.0, Severity::Critical), (20.0, Severity::High)],
    floor: Severity::Medium,
};

/// Downward amendment: >20 critical, >10 high, else medium.
pub const AMENDMENT_BANDS: SeverityBands = SeverityBands {
    tiers: &[(20.0, Severity::Critical), (10.0, Severity::High)],
    floor: Severity::Medium,
};

/// Percentage of `part` over `base`; a zero base yields 100% for any
/// positive part so the gap is never under-classified.
pub fn percent_of(part: f64, base: f64) -> f64 {
    if base.abs() < f64::EPSILON {
        if part.abs() < f64::EPSILON { 0.0 } else { 100.0 }
    } else {
        part / base * 100.0
    }
}
