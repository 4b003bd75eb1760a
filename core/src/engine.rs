//! The crossing engine: public operations over one fiscal store.
//!
//! EXECUTION ORDER of the composite crossing (fixed, never reordered):
//!   1. Revenue vs invoices   (amendment, omission, municipality, non-payment)
//!   2. Sublimits             (calendar year of the competency)
//!   3. Withholding / rates
//!
//! RULES:
//!   - Checks only read; the engine is the only writer of crossing outputs.
//!   - One composite crossing persists its divergences, the company's risk
//!     level and its audit events in a single transaction.
//!   - Single checks and fleet-wide detectors return results and persist
//!     nothing.

use crate::{
    check::{CheckContext, CompanyCheck},
    clock::CrossingClock,
    config::CrossingConfig,
    delinquency_check,
    divergence::ResultBundle,
    error::{CrossingError, CrossingResult},
    event::{CrossingEvent, EventLogEntry},
    omission_check,
    period::Competency,
    report::{self, MultiYearReport},
    revenue_check::RevenueCheck,
    scoring::RiskLevel,
    store::{CompanyRow, DivergenceRow, FiscalStore},
    sublimit_check::SublimitCheck,
    withholding_check::WithholdingCheck,
};
use chrono::NaiveDate;

pub struct CrossingEngine {
    pub store: FiscalStore,
    pub clock: CrossingClock,
    config: CrossingConfig,
    checks: Vec<Box<dyn CompanyCheck>>,
}

impl CrossingEngine {
    /// Bare engine with no checks registered.
    pub fn new(store: FiscalStore, config: CrossingConfig, clock: CrossingClock) -> Self {
        Self {
            store,
            clock,
            config,
            checks: Vec::new(),
        }
    }

    /// Build a fully wired engine: the store's settings record is overlaid
    /// on `config` and every check is registered in execution order.
    pub fn build(store: FiscalStore, config: CrossingConfig, clock: CrossingClock) -> CrossingResult<Self> {
        let config = match store.get_settings()? {
            Some(settings) => config.with_settings(&settings),
            None => config,
        };
        config.validate()?;
        let mut engine = CrossingEngine::new(store, config, clock);
        engine.register(Box::new(RevenueCheck));
        engine.register(Box::new(SublimitCheck));
        engine.register(Box::new(WithholdingCheck));
        Ok(engine)
    }

    /// Migrated in-memory store, test configuration, clock frozen on `today`.
    pub fn build_test(today: NaiveDate) -> CrossingResult<Self> {
        let store = FiscalStore::in_memory()?;
        store.migrate()?;
        Self::build(store, CrossingConfig::default_test(), CrossingClock::fixed_on(today))
    }

    /// Register a check. Call in the documented execution order.
    pub fn register(&mut self, check: Box<dyn CompanyCheck>) {
        self.checks.push(check);
    }

    pub fn config(&self) -> &CrossingConfig {
        &self.config
    }

    /// Re-read the settings record, e.g. after it was edited.
    pub fn reload_settings(&mut self) -> CrossingResult<()> {
        if let Some(settings) = self.store.get_settings()? {
            self.config = self.config.clone().with_settings(&settings);
        }
        Ok(())
    }

    fn company(&self, company_id: &str) -> CrossingResult<CompanyRow> {
        self.store
            .get_company(company_id)?
            .ok_or_else(|| CrossingError::CompanyNotFound {
                company_id: company_id.to_string(),
            })
    }

    fn context<'a>(&'a self, company: &'a CompanyRow, competency: Competency) -> CheckContext<'a> {
        CheckContext {
            store: &self.store,
            config: &self.config,
            company,
            competency,
        }
    }

    // ── Single checks (read-only) ──────────────────────────────────

    pub fn check_revenue_vs_invoices(&self, company_id: &str, period: &str) -> CrossingResult<ResultBundle> {
        let competency = Competency::from_public(period)?;
        let company = self.company(company_id)?;
        let divergences = RevenueCheck.run(&self.context(&company, competency))?;
        Ok(ResultBundle::new(&company, divergences))
    }

    pub fn check_sublimits(&self, company_id: &str, year: i32) -> CrossingResult<ResultBundle> {
        let company = self.company(company_id)?;
        let divergences = SublimitCheck::for_year(&self.store, &self.config, &company, year)?;
        Ok(ResultBundle::new(&company, divergences))
    }

    pub fn check_withholding(&self, company_id: &str, period: &str) -> CrossingResult<ResultBundle> {
        let competency = Competency::from_public(period)?;
        let company = self.company(company_id)?;
        let divergences = WithholdingCheck.run(&self.context(&company, competency))?;
        Ok(ResultBundle::new(&company, divergences))
    }

    // ── Fleet-wide detectors (read-only) ───────────────────────────

    pub fn detect_omitted(&self, period: &str) -> CrossingResult<Vec<ResultBundle>> {
        let competency = Competency::from_public(period)?;
        omission_check::detect_omitted(&self.store, &self.config, competency)
    }

    pub fn detect_delinquent(&self, period: &str) -> CrossingResult<Vec<ResultBundle>> {
        let competency = Competency::from_public(period)?;
        delinquency_check::detect_delinquent(&self.store, competency)
    }

    // ── Composite crossing (persists) ──────────────────────────────

    /// Run every registered check for one company and period, then persist
    /// the findings, the new risk level and the audit trail atomically.
    pub fn run_all_checks(&self, company_id: &str, period: &str) -> CrossingResult<ResultBundle> {
        let competency = Competency::from_public(period)?;
        let company = self.company(company_id)?;
        self.cross_company(&company, competency)
    }

    pub(crate) fn cross_company(&self, company: &CompanyRow, competency: Competency) -> CrossingResult<ResultBundle> {
        let ctx = self.context(company, competency);
        let mut divergences = Vec::new();
        for check in &self.checks {
            let found = check.run(&ctx)?;
            log::debug!(
                "{} {competency}: {} found {}",
                company.company_id,
                check.name(),
                found.len()
            );
            divergences.extend(found);
        }

        let bundle = ResultBundle::new(company, divergences);
        let level = RiskLevel::from_score(bundle.score);
        let now = self.clock.now();

        let rows: Vec<DivergenceRow> = bundle
            .divergences
            .iter()
            .map(|d| DivergenceRow::pending(&company.company_id, d, now))
            .collect();

        let mut events = Vec::with_capacity(rows.len() + 2);
        for (row, d) in rows.iter().zip(&bundle.divergences) {
            let event = CrossingEvent::DivergenceDetected {
                company_id: company.company_id.clone(),
                divergence_id: row.divergence_id.clone(),
                kind: d.kind,
                severity: d.severity,
                value: d.value,
            };
            events.push(EventLogEntry::from_event(&event, Some(competency), now)?);
        }
        let previous = company.risk_level.as_deref().and_then(RiskLevel::parse);
        if previous != Some(level) {
            let event = CrossingEvent::RiskLevelChanged {
                company_id: company.company_id.clone(),
                previous,
                current: level,
                score: bundle.score,
            };
            events.push(EventLogEntry::from_event(&event, Some(competency), now)?);
        }
        let completed = CrossingEvent::CrossingCompleted {
            company_id: company.company_id.clone(),
            competency,
            divergence_count: bundle.divergence_count,
            score: bundle.score,
        };
        events.push(EventLogEntry::from_event(&completed, Some(competency), now)?);

        self.store
            .record_crossing_outcome(&company.company_id, &rows, level.as_str(), &events)?;

        log::info!(
            "{} {competency}: {} divergences, score {}, risk {level}",
            company.company_id,
            bundle.divergence_count,
            bundle.score
        );
        Ok(bundle)
    }

    // ── Aggregate report (read-only) ───────────────────────────────

    pub fn build_multi_year_report(&self, years_back: u32) -> CrossingResult<MultiYearReport> {
        report::build_multi_year_report(&self.store, &self.config, &self.clock, years_back)
    }
}
