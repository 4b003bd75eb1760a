use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrossingError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Company '{company_id}' not found")]
    CompanyNotFound { company_id: String },

    #[error("Invalid period '{raw}': expected MM/YYYY, YYYYMM or YYYY-MM")]
    InvalidPeriod { raw: String },

    #[error("Invalid report span: {years} years (allowed 1..=5)")]
    InvalidYearSpan { years: u32 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CrossingResult<T> = Result<T, CrossingError>;
