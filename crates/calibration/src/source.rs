//! Historical outcome source consumed by the scheduler

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{validate_pairs, CalibrationError};

/// Paired predictions and realised outcomes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSamples {
    /// Predicted probabilities
    pub predicted: Vec<f64>,
    /// Realised binary outcomes, paired with `predicted` by index
    pub outcomes: Vec<bool>,
}

impl OutcomeSamples {
    /// Create an empty sample set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sample set with room for `capacity` pairs
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            predicted: Vec::with_capacity(capacity),
            outcomes: Vec::with_capacity(capacity),
        }
    }

    /// Append one pair
    pub fn push(&mut self, predicted: f64, outcome: bool) {
        self.predicted.push(predicted);
        self.outcomes.push(outcome);
    }

    /// Number of predictions
    pub fn len(&self) -> usize {
        self.predicted.len()
    }

    /// Whether there are no predictions
    pub fn is_empty(&self) -> bool {
        self.predicted.is_empty()
    }

    /// Check the pairs line up and are numeric
    pub fn validate(&self) -> Result<(), CalibrationError> {
        validate_pairs(&self.predicted, &self.outcomes)
    }
}

impl FromIterator<(f64, bool)> for OutcomeSamples {
    fn from_iter<I: IntoIterator<Item = (f64, bool)>>(iter: I) -> Self {
        let (predicted, outcomes) = iter.into_iter().unzip();
        Self { predicted, outcomes }
    }
}

/// Supplier of historical prediction/outcome pairs
#[async_trait]
pub trait OutcomeSource: Send + Sync {
    /// Fetch every sample recorded within `lookback` of now
    async fn fetch(&self, lookback: Duration) -> anyhow::Result<OutcomeSamples>;
}
