//! Hysteresis Controller
//!
//! Turns a stream of repeated threshold evaluations into a stable boolean
//! per key, using a dead band between two thresholds and a minimum hold time.

mod config;
mod controller;

pub use config::HysteresisConfig;
pub use controller::{EvaluationReason, HysteresisController, HysteresisDecision, HysteresisState};

use thiserror::Error;

/// Errors raised when building a hysteresis configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HysteresisError {
    #[error(
        "Deactivation threshold {deactivation} must be strictly lower than \
         activation threshold {activation}"
    )]
    InvalidBand { activation: f64, deactivation: f64 },
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("Minimum hold time must be non-negative, got {0}s")]
    NegativeHoldTime(f64),
    #[error("Minimum hold time is too large to represent: {0}s")]
    HoldTimeOutOfRange(f64),
}
