//! Composite risk score shared by every check.
//!
//! score = 100 - Σ (severity weight + value penalty), clamped at 0.
//! Lower is worse. An empty divergence list scores exactly 100.

use crate::{divergence::Divergence, types::Amount};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_SCORE: u32 = 100;

/// Extra points subtracted according to the divergent amount.
pub fn value_penalty(value: Amount) -> u32 {
    let value = value.abs();
    if value > 100_000.0 {
        15
    } else if value > 50_000.0 {
        10
    } else if value > 10_000.0 {
        7
    } else if value > 1_000.0 {
        4
    } else {
        2
    }
}

pub fn risk_score(divergences: &[Divergence]) -> u32 {
    let penalty: u32 = divergences
        .iter()
        .map(|d| d.severity.weight() + value_penalty(d.value))
        .sum();
    MAX_SCORE.saturating_sub(penalty)
}

/// Cached classification written onto the company after a full crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "BAIXO")]
    Low,
    #[serde(rename = "MEDIO")]
    Medium,
    #[serde(rename = "ALTO")]
    High,
    #[serde(rename = "CRITICO")]
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s < 30 => RiskLevel::Critical,
            s if s < 50 => RiskLevel::High,
            s if s < 75 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low      => "BAIXO",
            RiskLevel::Medium   => "MEDIO",
            RiskLevel::High     => "ALTO",
            RiskLevel::Critical => "CRITICO",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "BAIXO"   => Some(RiskLevel::Low),
            "MEDIO"   => Some(RiskLevel::Medium),
            "ALTO"    => Some(RiskLevel::High),
            "CRITICO" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{divergence::DivergenceKind, severity::Severity};

    fn div(severity: Severity, value: Amount) -> Divergence {
        Divergence::new(DivergenceKind::OmissaoReceita, severity, value, None, "test")
    }

    #[test]
    fn empty_list_scores_one_hundred() {
        assert_eq!(risk_score(&[]), 100);
    }

    #[test]
    fn weights_and_penalties_add_up() {
        // 35 + 7 = 42
        assert_eq!(risk_score(&[div(Severity::Critical, 25_000.0)]), 58);
        // (20 + 2) + (12 + 4) = 38
        assert_eq!(risk_score(&[div(Severity::High, 0.0), div(Severity::Medium, 1_500.0)]), 62);
        // 2 + 15
        assert_eq!(risk_score(&[div(Severity::Low, 250_000.0)]), 83);
    }

    #[test]
    fn score_is_clamped_at_zero() {
        let many: Vec<_> = (0..10).map(|_| div(Severity::Critical, 1_000_000.0)).collect();
        assert_eq!(risk_score(&many), 0);
    }

    #[test]
    fn score_stays_within_bounds() {
        let tiers = [Severity::Low, Severity::Medium, Severity::High, Severity::Critical];
        for n in 0..12 {
            let list: Vec<_> = (0..n).map(|i| div(tiers[i % 4], (i as f64) * 20_000.0)).collect();
            let score = risk_score(&list);
            assert!(score <= 100);
        }
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(29), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(30), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(49), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(74), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(75), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Low);
    }
}
