//! Platt Scaling
//!
//! Logistic recalibration `q = sigmoid(a * logit(p) + b)` fitted by full-batch
//! gradient descent on the cross-entropy loss.

use crate::{outcome_value, validate_fit_input, CalibrationError};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// Probabilities are clamped into this range before taking the logit
const PROBABILITY_FLOOR: f64 = 1e-4;
const PROBABILITY_CEIL: f64 = 0.9999;

/// Fitted logistic parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattParameters {
    /// Slope applied to the log-odds
    pub a: f64,
    /// Intercept
    pub b: f64,
}

impl PlattParameters {
    /// Parameters that reproduce the (clamped) input probability
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0 };

    /// Apply the logistic transform to a raw probability
    pub fn apply(&self, probability: f64) -> f64 {
        sigmoid(self.a * logit(clamp_probability(probability)) + self.b)
    }
}

impl Default for PlattParameters {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Gradient descent settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlattFitOptions {
    /// Step size (default: 0.01)
    pub learning_rate: f64,
    /// Upper bound on full-batch passes (default: 1000)
    pub max_iterations: usize,
    /// Stop once both parameter updates are below this (default: 1e-6)
    pub tolerance: f64,
}

impl Default for PlattFitOptions {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            max_iterations: 1000,
            tolerance: 1e-6,
        }
    }
}

impl PlattFitOptions {
    /// Check the step size, iteration cap and tolerance are usable
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(CalibrationError::InvalidParameter {
                name: "learning_rate",
                reason: format!("must be positive and finite, got {}", self.learning_rate),
            });
        }
        if self.max_iterations == 0 {
            return Err(CalibrationError::InvalidParameter {
                name: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(CalibrationError::InvalidParameter {
                name: "tolerance",
                reason: format!("must be non-negative and finite, got {}", self.tolerance),
            });
        }
        Ok(())
    }
}

/// Result of one Platt fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlattFit {
    pub parameters: PlattParameters,
    /// Gradient descent passes performed
    pub iterations: usize,
    /// Whether the tolerance was reached before `max_iterations`
    pub converged: bool,
}

/// Fit Platt parameters without publishing them anywhere.
///
/// Starts from the identity transform, so on any dataset the fitted loss is
/// no worse than leaving the probabilities unchanged.
pub fn fit_platt(
    predicted: &[f64],
    outcomes: &[bool],
    options: &PlattFitOptions,
) -> Result<PlattFit, CalibrationError> {
    validate_fit_input(predicted, outcomes)?;
    options.validate()?;

    let samples: Vec<(f64, f64)> = predicted
        .iter()
        .zip(outcomes)
        .map(|(&p, &o)| (logit(clamp_probability(p)), outcome_value(o)))
        .collect();
    let n = samples.len() as f64;

    let PlattParameters { mut a, mut b } = PlattParameters::IDENTITY;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        iterations += 1;

        let (mut grad_a, mut grad_b) = (0.0, 0.0);
        for &(x, y) in &samples {
            let residual = sigmoid(a * x + b) - y;
            grad_a += residual * x;
            grad_b += residual;
        }

        let delta_a = options.learning_rate * grad_a / n;
        let delta_b = options.learning_rate * grad_b / n;
        a -= delta_a;
        b -= delta_b;

        if delta_a.abs() < options.tolerance && delta_b.abs() < options.tolerance {
            converged = true;
            break;
        }
    }

    debug!(a, b, iterations, converged, "Platt gradient descent finished");

    Ok(PlattFit {
        parameters: PlattParameters { a, b },
        iterations,
        converged,
    })
}

/// Platt calibrator holding the currently published parameters.
///
/// Fitting runs without holding the lock; the finished pair is published in
/// one write, so readers see either the old or the new parameters.
#[derive(Debug, Default)]
pub struct PlattScaler {
    parameters: RwLock<Option<PlattParameters>>,
}

impl PlattScaler {
    /// Create an unfitted scaler (acts as identity)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scaler with known parameters
    pub fn with_parameters(parameters: PlattParameters) -> Self {
        Self {
            parameters: RwLock::new(Some(parameters)),
        }
    }

    /// Fit on the given samples and publish the result
    pub fn fit(
        &self,
        predicted: &[f64],
        outcomes: &[bool],
        options: &PlattFitOptions,
    ) -> Result<PlattFit, CalibrationError> {
        let fit = fit_platt(predicted, outcomes, options)?;
        self.publish(fit.parameters);
        info!(
            a = fit.parameters.a,
            b = fit.parameters.b,
            samples = predicted.len(),
            "Platt parameters updated"
        );
        Ok(fit)
    }

    /// Replace the active parameters
    pub fn publish(&self, parameters: PlattParameters) {
        *self
            .parameters
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(parameters);
    }

    /// Active parameters, if a fit has completed
    pub fn parameters(&self) -> Option<PlattParameters> {
        *self.parameters.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a fit has completed
    pub fn is_fitted(&self) -> bool {
        self.parameters().is_some()
    }

    /// Calibrate a probability; identity until the first fit
    pub fn calibrate(&self, probability: f64) -> f64 {
        match self.parameters() {
            Some(parameters) => parameters.apply(probability),
            None => probability,
        }
    }
}

fn clamp_probability(p: f64) -> f64 {
    p.clamp(PROBABILITY_FLOOR, PROBABILITY_CEIL)
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_loss;

    /// Predictions that are too extreme compared to realised frequencies
    fn overconfident(samples_per_bucket: usize) -> (Vec<f64>, Vec<bool>) {
        let mut predicted = Vec::new();
        let mut outcomes = Vec::new();
        for bucket in 0..20 {
            let p = 0.025 + 0.05 * bucket as f64;
            let true_rate = 0.5 + (p - 0.5) * 0.3;
            let positives = (true_rate * samples_per_bucket as f64).round() as usize;
            for j in 0..samples_per_bucket {
                predicted.push(p);
                outcomes.push(j < positives);
            }
        }
        (predicted, outcomes)
    }

    #[test]
    fn test_sigmoid_logit_inverse() {
        for p in [0.01, 0.25, 0.5, 0.75, 0.99] {
            assert!((sigmoid(logit(p)) - p).abs() < 1e-12);
        }
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(800.0) <= 1.0);
    }

    #[test]
    fn test_identity_parameters() {
        assert!((PlattParameters::IDENTITY.apply(0.3) - 0.3).abs() < 1e-12);
        // Clamped away from log(0)
        assert!((PlattParameters::IDENTITY.apply(0.0) - PROBABILITY_FLOOR).abs() < 1e-12);
        assert!((PlattParameters::IDENTITY.apply(1.0) - PROBABILITY_CEIL).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted_scaler_is_identity() {
        let scaler = PlattScaler::new();
        assert!(!scaler.is_fitted());
        assert_eq!(scaler.calibrate(0.0), 0.0);
        assert_eq!(scaler.calibrate(0.42), 0.42);
    }

    #[test]
    fn test_insufficient_samples() {
        let scaler = PlattScaler::new();
        let err = scaler
            .fit(&[0.5; 9], &[true; 9], &PlattFitOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            CalibrationError::InsufficientSamples {
                required: 10,
                actual: 9
            }
        );
        assert!(!scaler.is_fitted());
    }

    #[test]
    fn test_invalid_options() {
        let options = PlattFitOptions {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            fit_platt(&[0.5; 10], &[true; 10], &options),
            Err(CalibrationError::InvalidParameter { name: "learning_rate", .. })
        ));
    }

    #[test]
    fn test_fit_shrinks_overconfident_predictions() {
        let (predicted, outcomes) = overconfident(20);
        let scaler = PlattScaler::new();
        let fit = scaler.fit(&predicted, &outcomes, &PlattFitOptions::default()).unwrap();

        // Realised rates are flatter than predictions, so the slope shrinks
        assert!(fit.parameters.a < 1.0);
        assert!(fit.parameters.b.abs() < 0.1);
        assert!(scaler.is_fitted());
        assert!(scaler.calibrate(0.95) < 0.95);
        assert!(scaler.calibrate(0.05) > 0.05);
    }

    #[test]
    fn test_fit_does_not_increase_loss() {
        let (predicted, outcomes) = overconfident(10);
        let fit = fit_platt(&predicted, &outcomes, &PlattFitOptions::default()).unwrap();

        let identity: Vec<f64> = predicted
            .iter()
            .map(|&p| PlattParameters::IDENTITY.apply(p))
            .collect();
        let calibrated: Vec<f64> = predicted.iter().map(|&p| fit.parameters.apply(p)).collect();

        let before = log_loss(&identity, &outcomes).unwrap();
        let after = log_loss(&calibrated, &outcomes).unwrap();
        assert!(after <= before, "loss rose from {} to {}", before, after);
    }

    #[test]
    fn test_converges_with_loose_tolerance() {
        let (predicted, outcomes) = overconfident(10);
        let options = PlattFitOptions {
            tolerance: 1e-2,
            ..Default::default()
        };
        let fit = fit_platt(&predicted, &outcomes, &options).unwrap();
        assert!(fit.converged);
        assert!(fit.iterations < options.max_iterations);
    }

    #[test]
    fn test_publish_replaces_pair() {
        let scaler = PlattScaler::with_parameters(PlattParameters { a: 2.0, b: 0.5 });
        scaler.publish(PlattParameters { a: 0.5, b: -0.1 });
        assert_eq!(scaler.parameters(), Some(PlattParameters { a: 0.5, b: -0.1 }));
    }
}
