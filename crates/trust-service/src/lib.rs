//! Decision Trust Service
//!
//! Loads settings, initializes logging, and owns one instance of each
//! decision trust component for the lifetime of the process.

mod logging;
mod services;
mod settings;

pub use logging::init_logging;
pub use services::{ServiceStatus, TrustServices};
pub use settings::{LogSettings, Settings};

use calibration::CalibrationError;
use outcome_store::StorageError;
use sensitivity::SensitivityError;
use thiserror::Error;

/// Service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
    #[error(transparent)]
    Sensitivity(#[from] SensitivityError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Unknown hysteresis profile: {0}")]
    UnknownProfile(String),
    #[error("Logging initialization failed: {0}")]
    Logging(String),
}
