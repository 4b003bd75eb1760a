//! Fiscal crossing engine: reconciles what companies declare against the
//! invoices they issue and the payments actually relayed, and scores the
//! divergences found.

pub mod batch;
pub mod check;
pub mod clock;
pub mod config;
pub mod delinquency_check;
pub mod divergence;
pub mod engine;
pub mod error;
pub mod event;
pub mod matching;
pub mod omission_check;
pub mod period;
pub mod report;
pub mod revenue_check;
pub mod scoring;
pub mod severity;
pub mod store;
pub mod sublimit_check;
pub mod tolerance;
pub mod types;
pub mod withholding_check;
