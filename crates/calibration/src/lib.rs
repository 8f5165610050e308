//! Calibration Engine
//!
//! Fits probability-correction models from historical prediction/outcome
//! pairs, measures calibration quality, and periodically recalibrates
//! against an external outcome source.

mod isotonic;
mod platt;
mod scheduler;
mod scoring;
mod source;

pub use isotonic::{IsotonicCalibrator, IsotonicMap};
pub use platt::{fit_platt, PlattFit, PlattFitOptions, PlattParameters, PlattScaler};
pub use scheduler::{
    CalibrationMethod, CalibrationResult, CalibrationScheduler, CalibrationStatus,
    SchedulerConfig, SchedulerStatus,
};
pub use scoring::{
    calculate_brier_score, calculate_calibration_error, log_loss, BinStats, CalibrationReport,
};
pub use source::{OutcomeSamples, OutcomeSource};

use thiserror::Error;

/// Minimum number of paired samples either calibrator will fit on
pub const MIN_FIT_SAMPLES: usize = 10;

/// Errors raised by the calibration routines
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("Insufficient samples: need at least {required}, got {actual}")]
    InsufficientSamples { required: usize, actual: usize },
    #[error("Length mismatch: {predictions} predictions vs {outcomes} outcomes")]
    LengthMismatch { predictions: usize, outcomes: usize },
    #[error("Prediction at index {index} is not finite: {value}")]
    NonFinite { index: usize, value: f64 },
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Check that predictions and outcomes pair up and are numeric
pub(crate) fn validate_pairs(predicted: &[f64], outcomes: &[bool]) -> Result<(), CalibrationError> {
    if predicted.len() != outcomes.len() {
        return Err(CalibrationError::LengthMismatch {
            predictions: predicted.len(),
            outcomes: outcomes.len(),
        });
    }
    if let Some((index, &value)) = predicted.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(CalibrationError::NonFinite { index, value });
    }
    Ok(())
}

/// Same as [`validate_pairs`], also requiring [`MIN_FIT_SAMPLES`]
pub(crate) fn validate_fit_input(
    predicted: &[f64],
    outcomes: &[bool],
) -> Result<(), CalibrationError> {
    validate_pairs(predicted, outcomes)?;
    if predicted.len() < MIN_FIT_SAMPLES {
        return Err(CalibrationError::InsufficientSamples {
            required: MIN_FIT_SAMPLES,
            actual: predicted.len(),
        });
    }
    Ok(())
}

#[inline]
pub(crate) fn outcome_value(outcome: bool) -> f64 {
    if outcome {
        1.0
    } else {
        0.0
    }
}
