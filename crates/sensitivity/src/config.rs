//! Analyzer configuration

use crate::SensitivityError;
use serde::{Deserialize, Serialize};

/// Sensitivity analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    /// Relative headroom below which a factor is fragile (default: 0.20)
    pub fragile_threshold: f64,
    /// Score at or above which the decision is called robust (default: 0.70)
    pub robust_threshold: f64,
    /// Score below which human review is recommended (default: 0.30)
    pub weak_threshold: f64,
    /// Score below which a moderate warning is issued (default: 0.50)
    pub moderate_threshold: f64,
    /// Score penalty per fragile factor (default: 0.10)
    pub fragile_penalty: f64,
    /// Boundary search stops once the interval is this fraction of
    /// max(|current|, 1) (default: 0.01)
    pub tolerance: f64,
    /// Hard cap on bisection steps per search (default: 64)
    pub max_search_iterations: usize,
    /// Number of key drivers reported (default: 3)
    pub max_key_drivers: usize,
    /// Reject ranges for inputs missing from the base inputs (default: false)
    pub strict_ranges: bool,
    /// Search all inputs concurrently (default: false)
    pub concurrent_searches: bool,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            fragile_threshold: 0.20,
            robust_threshold: 0.70,
            weak_threshold: 0.30,
            moderate_threshold: 0.50,
            fragile_penalty: 0.10,
            tolerance: 0.01,
            max_search_iterations: 64,
            max_key_drivers: 3,
            strict_ranges: false,
            concurrent_searches: false,
        }
    }
}

impl SensitivityConfig {
    /// Check that thresholds and search settings are usable
    pub fn validate(&self) -> Result<(), SensitivityError> {
        let non_negative = [
            ("fragile_threshold", self.fragile_threshold),
            ("fragile_penalty", self.fragile_penalty),
            ("tolerance", self.tolerance),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SensitivityError::InvalidConfig(format!(
                    "{} must be non-negative and finite, got {}",
                    name, value
                )));
            }
        }

        let scores = [
            ("robust_threshold", self.robust_threshold),
            ("weak_threshold", self.weak_threshold),
            ("moderate_threshold", self.moderate_threshold),
        ];
        for (name, value) in scores {
            if !(0.0..=1.0).contains(&value) {
                return Err(SensitivityError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.max_search_iterations == 0 {
            return Err(SensitivityError::InvalidConfig(
                "max_search_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SensitivityConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = SensitivityConfig {
            tolerance: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SensitivityConfig {
            robust_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SensitivityConfig {
            max_search_iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: SensitivityConfig =
            serde_json::from_str(r#"{"fragile_threshold": 0.3, "strict_ranges": true}"#).unwrap();
        assert_eq!(config.fragile_threshold, 0.3);
        assert!(config.strict_ranges);
        assert_eq!(config.max_key_drivers, 3);
    }
}
