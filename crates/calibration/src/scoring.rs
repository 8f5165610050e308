//! Calibration Quality Scores

use crate::{outcome_value, validate_pairs, CalibrationError};
use serde::{Deserialize, Serialize};

/// Statistics for one non-empty confidence bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinStats {
    /// Index of the bin, 0 for the lowest probabilities
    pub bin_index: usize,
    /// Lower edge of the bin (inclusive)
    pub lower: f64,
    /// Upper edge of the bin (exclusive, except for the last bin)
    pub upper: f64,
    /// Number of predictions in the bin
    pub count: usize,
    /// Mean predicted probability
    pub avg_confidence: f64,
    /// Observed frequency of positive outcomes
    pub accuracy: f64,
    /// |accuracy - avg_confidence|
    pub gap: f64,
}

/// Expected calibration error together with its per-bin breakdown
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Expected Calibration Error
    pub ece: f64,
    /// Largest gap of any non-empty bin
    pub max_calibration_error: f64,
    /// Number of samples scored
    pub sample_count: usize,
    /// Non-empty bins in ascending probability order
    pub bins: Vec<BinStats>,
}

/// Compute the Expected Calibration Error over `num_bins` equal-width bins.
///
/// ECE = Σ (count / total) * |accuracy - avg_confidence| over non-empty bins.
/// Probabilities are clamped to [0, 1]; a probability of exactly 1.0 lands in
/// the last bin. Empty input yields an ECE of 0.
pub fn calculate_calibration_error(
    predicted: &[f64],
    outcomes: &[bool],
    num_bins: usize,
) -> Result<CalibrationReport, CalibrationError> {
    validate_pairs(predicted, outcomes)?;
    if num_bins == 0 {
        return Err(CalibrationError::InvalidParameter {
            name: "num_bins",
            reason: "must be at least 1".to_string(),
        });
    }
    if predicted.is_empty() {
        return Ok(CalibrationReport::default());
    }

    let mut confidence_sums = vec![0.0; num_bins];
    let mut positives = vec![0.0; num_bins];
    let mut counts = vec![0usize; num_bins];

    for (&p, &outcome) in predicted.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let bin = ((p * num_bins as f64) as usize).min(num_bins - 1);
        confidence_sums[bin] += p;
        positives[bin] += outcome_value(outcome);
        counts[bin] += 1;
    }

    let total = predicted.len() as f64;
    let width = 1.0 / num_bins as f64;
    let mut report = CalibrationReport {
        sample_count: predicted.len(),
        ..Default::default()
    };

    for bin_index in 0..num_bins {
        let count = counts[bin_index];
        if count == 0 {
            continue;
        }
        let avg_confidence = confidence_sums[bin_index] / count as f64;
        let accuracy = positives[bin_index] / count as f64;
        let gap = (accuracy - avg_confidence).abs();

        report.ece += (count as f64 / total) * gap;
        report.max_calibration_error = report.max_calibration_error.max(gap);
        report.bins.push(BinStats {
            bin_index,
            lower: bin_index as f64 * width,
            upper: (bin_index + 1) as f64 * width,
            count,
            avg_confidence,
            accuracy,
            gap,
        });
    }

    Ok(report)
}

/// Mean squared error between predicted probabilities and binary outcomes.
///
/// Empty input scores 0.
pub fn calculate_brier_score(
    predicted: &[f64],
    outcomes: &[bool],
) -> Result<f64, CalibrationError> {
    validate_pairs(predicted, outcomes)?;
    if predicted.is_empty() {
        return Ok(0.0);
    }

    let sum: f64 = predicted
        .iter()
        .zip(outcomes)
        .map(|(&p, &o)| (p - outcome_value(o)).powi(2))
        .sum();
    Ok(sum / predicted.len() as f64)
}

/// Mean binary cross-entropy of the predictions
pub fn log_loss(predicted: &[f64], outcomes: &[bool]) -> Result<f64, CalibrationError> {
    const EPS: f64 = 1e-15;

    validate_pairs(predicted, outcomes)?;
    if predicted.is_empty() {
        return Ok(0.0);
    }

    let sum: f64 = predicted
        .iter()
        .zip(outcomes)
        .map(|(&p, &o)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            if o {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    Ok(sum / predicted.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every distinct probability is hit with exactly its own frequency
    fn perfectly_calibrated() -> (Vec<f64>, Vec<bool>) {
        let mut predicted = Vec::new();
        let mut outcomes = Vec::new();
        for tenth in 1..10 {
            let p = tenth as f64 / 10.0;
            for j in 0..20 {
                predicted.push(p);
                outcomes.push(j < tenth * 2);
            }
        }
        (predicted, outcomes)
    }

    #[test]
    fn test_perfect_calibration_has_zero_ece() {
        let (predicted, outcomes) = perfectly_calibrated();
        let report = calculate_calibration_error(&predicted, &outcomes, 10).unwrap();
        assert!(report.ece < 1e-9, "ece = {}", report.ece);
        assert_eq!(report.bins.len(), 9);
        assert_eq!(report.sample_count, 180);
        assert!(report.bins.iter().all(|b| b.count == 20));
    }

    #[test]
    fn test_overconfident_predictions() {
        // Predicts 0.9 but only half come true
        let predicted = vec![0.9; 10];
        let outcomes: Vec<bool> = (0..10).map(|i| i % 2 == 0).collect();
        let report = calculate_calibration_error(&predicted, &outcomes, 10).unwrap();

        assert!((report.ece - 0.4).abs() < 1e-9);
        assert!((report.max_calibration_error - 0.4).abs() < 1e-9);
        let bin = &report.bins[0];
        assert_eq!(bin.bin_index, 9);
        assert!((bin.avg_confidence - 0.9).abs() < 1e-12);
        assert!((bin.accuracy - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_edge_probabilities_binned() {
        let predicted = vec![0.0, 1.0, 1.2, -0.3];
        let outcomes = vec![false, true, true, false];
        let report = calculate_calibration_error(&predicted, &outcomes, 10).unwrap();
        assert_eq!(report.bins.len(), 2);
        assert_eq!(report.bins[0].bin_index, 0);
        assert_eq!(report.bins[1].bin_index, 9);
        assert!(report.ece < 1e-12);
    }

    #[test]
    fn test_empty_input() {
        let report = calculate_calibration_error(&[], &[], 10).unwrap();
        assert_eq!(report.ece, 0.0);
        assert!(report.bins.is_empty());
        assert_eq!(calculate_brier_score(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(
            calculate_brier_score(&[0.5, 0.5], &[true]),
            Err(CalibrationError::LengthMismatch {
                predictions: 2,
                outcomes: 1
            })
        );
        assert!(matches!(
            calculate_calibration_error(&[0.5, f64::NAN], &[true, false], 10),
            Err(CalibrationError::NonFinite { index: 1, .. })
        ));
        assert!(calculate_calibration_error(&[0.5], &[true], 0).is_err());
    }

    #[test]
    fn test_brier_score() {
        let brier =
            calculate_brier_score(&[1.0, 0.0, 0.5, 0.8], &[true, false, true, false]).unwrap();
        // (0 + 0 + 0.25 + 0.64) / 4
        assert!((brier - 0.2225).abs() < 1e-12);
    }

    #[test]
    fn test_log_loss_prefers_confident_correct() {
        let outcomes = [true, false, true, false];
        let good = log_loss(&[0.9, 0.1, 0.8, 0.2], &outcomes).unwrap();
        let bad = log_loss(&[0.5, 0.5, 0.5, 0.5], &outcomes).unwrap();
        assert!(good < bad);
        assert!((bad - std::f64::consts::LN_2).abs() < 1e-12);
    }
}
