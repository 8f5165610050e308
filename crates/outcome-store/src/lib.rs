//! Outcome Store
//!
//! Retains recent prediction/outcome pairs and serves them to the
//! calibration scheduler as an outcome source.

mod repository;

pub use repository::{OutcomeRecord, OutcomeRepository, StoreConfig};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("Prediction is not a finite probability: {0}")]
    InvalidPrediction(f64),
    #[error("Lookback out of range: {0:?}")]
    InvalidLookback(std::time::Duration),
    #[error("Lock error: {0}")]
    LockError(String),
}
