//! Analysis error taxonomy.
//!
//! Every failure that can reach a caller of the analytical core is one of
//! these. Feed errors convert in via `From<DataError>`.

use thiserror::Error;

use crate::data::DataError;
use crate::domain::SymbolError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("insufficient history: needed {needed} observations, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("model fit failed: {0}")]
    ModelFitFailure(String),

    #[error("data integrity risk: {0}")]
    DataIntegrityRisk(String),
}

impl From<SymbolError> for AnalysisError {
    fn from(err: SymbolError) -> Self {
        AnalysisError::InvalidSymbol(err.to_string())
    }
}

impl From<DataError> for AnalysisError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::SymbolNotFound { symbol } => AnalysisError::InvalidSymbol(format!(
                "'{symbol}' is not listed; use a trading pair such as 'BTCUSDT'"
            )),
            DataError::DuplicateKey(detail) => AnalysisError::DataIntegrityRisk(detail),
            other => AnalysisError::UpstreamUnavailable(other.to_string()),
        }
    }
}
