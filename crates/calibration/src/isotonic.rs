//! Isotonic Regression (Pool-Adjacent-Violators)

use crate::{outcome_value, validate_fit_input, CalibrationError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Monotone step function produced by PAVA.
///
/// `thresholds[i]` is the lowest raw probability pooled into block `i`;
/// `values[i]` is the observed positive rate of that block. Values are
/// non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotonicMap {
    thresholds: Vec<f64>,
    values: Vec<f64>,
}

/// Block of pooled samples during PAVA
struct Block {
    threshold: f64,
    upper: f64,
    sum: f64,
    weight: f64,
}

impl Block {
    fn mean(&self) -> f64 {
        self.sum / self.weight
    }

    fn absorb(&mut self, other: Block) {
        self.upper = other.upper;
        self.sum += other.sum;
        self.weight += other.weight;
    }
}

impl IsotonicMap {
    /// Fit a monotone step function to the samples
    pub fn fit(predicted: &[f64], outcomes: &[bool]) -> Result<Self, CalibrationError> {
        validate_fit_input(predicted, outcomes)?;

        let mut pairs: Vec<(f64, f64)> = predicted
            .iter()
            .zip(outcomes)
            .map(|(&p, &o)| (p, outcome_value(o)))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut blocks: Vec<Block> = Vec::with_capacity(pairs.len());
        for (p, y) in pairs {
            match blocks.last_mut() {
                // Identical predictions must map to one value
                Some(last) if last.upper == p => {
                    last.sum += y;
                    last.weight += 1.0;
                }
                _ => blocks.push(Block {
                    threshold: p,
                    upper: p,
                    sum: y,
                    weight: 1.0,
                }),
            }

            // Pool backwards until the tail is non-decreasing again
            while blocks.len() >= 2
                && blocks[blocks.len() - 2].mean() > blocks[blocks.len() - 1].mean()
            {
                if let Some(last) = blocks.pop() {
                    if let Some(prev) = blocks.last_mut() {
                        prev.absorb(last);
                    }
                }
            }
        }

        Ok(Self {
            thresholds: blocks.iter().map(|b| b.threshold).collect(),
            values: blocks.iter().map(Block::mean).collect(),
        })
    }

    /// Step-function lookup: value of the last block whose threshold is <= `probability`.
    ///
    /// Probabilities below the first threshold map to the first block.
    pub fn calibrate(&self, probability: f64) -> f64 {
        let idx = self.thresholds.partition_point(|&t| t <= probability);
        self.values[idx.saturating_sub(1)]
    }

    /// Block thresholds in ascending order
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Block values, non-decreasing
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// Always false for a fitted map
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

/// Isotonic calibrator holding the currently published map
#[derive(Debug, Default)]
pub struct IsotonicCalibrator {
    map: RwLock<Option<Arc<IsotonicMap>>>,
}

impl IsotonicCalibrator {
    /// Create an unfitted calibrator (acts as identity)
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit on the given samples and publish the resulting map
    pub fn fit(
        &self,
        predicted: &[f64],
        outcomes: &[bool],
    ) -> Result<Arc<IsotonicMap>, CalibrationError> {
        let map = Arc::new(IsotonicMap::fit(predicted, outcomes)?);
        *self.map.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&map));
        info!(blocks = map.len(), samples = predicted.len(), "Isotonic map updated");
        Ok(map)
    }

    /// Active map, if a fit has completed
    pub fn map(&self) -> Option<Arc<IsotonicMap>> {
        self.map.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether a fit has completed
    pub fn is_fitted(&self) -> bool {
        self.map().is_some()
    }

    /// Calibrate a probability; identity until the first fit
    pub fn calibrate(&self, probability: f64) -> f64 {
        match self.map() {
            Some(map) => map.calibrate(probability),
            None => probability,
        }
    }
}
