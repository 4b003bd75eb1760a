//! Audit events appended by the orchestrators.
//!
//! RULE: events are written in the same transaction as the divergence rows
//! they describe, so the log never mentions a finding that was not stored.

use crate::{
    divergence::DivergenceKind,
    period::Competency,
    scoring::RiskLevel,
    severity::Severity,
    types::{Amount, CompanyId},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Variants are added over time — never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrossingEvent {
    DivergenceDetected {
        company_id: CompanyId,
        divergence_id: String,
        kind: DivergenceKind,
        severity: Severity,
        value: Amount,
    },
    RiskLevelChanged {
        company_id: CompanyId,
        previous: Option<RiskLevel>,
        current: RiskLevel,
        score: u32,
    },
    CrossingCompleted {
        company_id: CompanyId,
        competency: Competency,
        divergence_count: usize,
        score: u32,
    },
    BatchCompleted {
        competency: Competency,
        processed: usize,
        with_divergences: usize,
        failed: usize,
        total_divergences: usize,
    },
}

impl CrossingEvent {
    /// Stable name stored in the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            CrossingEvent::DivergenceDetected { .. } => "divergence_detected",
            CrossingEvent::RiskLevelChanged { .. }   => "risk_level_changed",
            CrossingEvent::CrossingCompleted { .. }  => "crossing_completed",
            CrossingEvent::BatchCompleted { .. }     => "batch_completed",
        }
    }

    pub fn company_id(&self) -> Option<&str> {
        match self {
            CrossingEvent::DivergenceDetected { company_id, .. }
            | CrossingEvent::RiskLevelChanged { company_id, .. }
            | CrossingEvent::CrossingCompleted { company_id, .. } => Some(company_id),
            CrossingEvent::BatchCompleted { .. } => None,
        }
    }
}

/// A persisted event row.
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub company_id: Option<CompanyId>,
    pub competency: Option<String>,
    pub event_type: String,
    pub payload: String,
    pub recorded_at: NaiveDateTime,
}

impl EventLogEntry {
    pub fn from_event(
        event: &CrossingEvent,
        competency: Option<Competency>,
        recorded_at: NaiveDateTime,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            company_id: event.company_id().map(str::to_string),
            competency: competency.map(|c| c.to_string()),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
            recorded_at,
        })
    }

    pub fn decode(&self) -> serde_json::Result<CrossingEvent> {
        serde_json::from_str(&self.payload)
    }
}
