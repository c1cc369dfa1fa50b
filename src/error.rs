//! Pipeline error taxonomy
//!
//! Every stage validates its own preconditions and fails fast with one of
//! these variants. The message names the stage and the violated invariant.

use thiserror::Error;

pub type Result<T, E = ForecastError> = std::result::Result<T, E>;

/// Errors raised by the forecasting pipeline
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("schema error: missing required column: {column}")]
    Schema { column: String },

    #[error("series error: {0}")]
    Series(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("metric error: {0}")]
    Metric(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("feature mismatch: model expects {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("model export error: {0}")]
    Export(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl ForecastError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        ForecastError::Schema {
            column: column.into(),
        }
    }
}

impl From<figment::Error> for ForecastError {
    fn from(err: figment::Error) -> Self {
        ForecastError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Export(err.to_string())
    }
}
