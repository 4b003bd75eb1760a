//! Batch orchestrator: the composite crossing for every active
//! simplified-regime company, then both fleet-wide detectors.
//!
//! Companies are processed sequentially on the engine's single connection.
//! A failing company either aborts the batch or is recorded in the summary,
//! depending on `CrossingConfig::batch_policy`.

use crate::{
    config::BatchPolicy,
    delinquency_check,
    engine::CrossingEngine,
    error::CrossingResult,
    event::{CrossingEvent, EventLogEntry},
    omission_check,
    period::Competency,
    types::CompanyId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub company_id: CompanyId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub competency: Competency,
    /// Companies whose crossing completed and was persisted.
    pub processed: usize,
    pub with_divergences: usize,
    pub omitted_count: usize,
    pub delinquent_count: usize,
    pub total_divergences: usize,
    pub failures: Vec<BatchFailure>,
}

impl CrossingEngine {
    pub fn run_batch(&self, period: &str) -> CrossingResult<BatchSummary> {
        let competency = Competency::from_public(period)?;
        let config = self.config();
        let companies = self
            .store
            .list_companies_by_status_regime(&config.active_status, &config.simplified_regime)?;
        log::info!("Batch {competency}: {} companies", companies.len());

        let mut summary = BatchSummary {
            competency,
            processed: 0,
            with_divergences: 0,
            omitted_count: 0,
            delinquent_count: 0,
            total_divergences: 0,
            failures: Vec::new(),
        };

        for company in &companies {
            match self.cross_company(company, competency) {
                Ok(bundle) => {
                    summary.processed += 1;
                    summary.total_divergences += bundle.divergence_count;
                    if bundle.has_divergences() {
                        summary.with_divergences += 1;
                    }
                }
                Err(e) => match config.batch_policy {
                    BatchPolicy::FailFast => {
                        log::error!("Batch {competency} aborted at {}: {e}", company.company_id);
                        return Err(e);
                    }
                    BatchPolicy::ContinueOnError => {
                        log::warn!("Batch {competency}: {} failed: {e}", company.company_id);
                        summary.failures.push(BatchFailure {
                            company_id: company.company_id.clone(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        summary.omitted_count = omission_check::detect_omitted(&self.store, config, competency)?.len();
        summary.delinquent_count = delinquency_check::detect_delinquent(&self.store, competency)?.len();

        let event = CrossingEvent::BatchCompleted {
            competency,
            processed: summary.processed,
            with_divergences: summary.with_divergences,
            failed: summary.failures.len(),
            total_divergences: summary.total_divergences,
        };
        self.store
            .append_event(&EventLogEntry::from_event(&event, Some(competency), self.clock.now())?)?;

        log::info!(
            "Batch {competency}: {} processed, {} with divergences, {} omitted, {} delinquent, {} failed",
            summary.processed,
            summary.with_divergences,
            summary.omitted_count,
            summary.delinquent_count,
            summary.failures.len()
        );
        Ok(summary)
    }
}
