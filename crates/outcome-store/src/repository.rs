//! Repository Implementation

use crate::StorageError;
use anyhow::Context;
use async_trait::async_trait;
use calibration::{OutcomeSamples, OutcomeSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Max retained records; the oldest are evicted first (default: 100000)
    pub max_records: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_records: 100_000,
        }
    }
}

/// One prediction and what actually happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub timestamp: DateTime<Utc>,
    /// Predicted probability
    pub predicted: f64,
    pub outcome: bool,
}

/// Repository of prediction outcomes (in-memory)
pub struct OutcomeRepository {
    records: Mutex<VecDeque<OutcomeRecord>>,
    config: StoreConfig,
}

impl OutcomeRepository {
    /// Create a repository with default retention
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a repository with custom retention
    pub fn with_config(config: StoreConfig) -> Self {
        info!(max_records = config.max_records, "Creating in-memory outcome repository");
        Self {
            records: Mutex::new(VecDeque::with_capacity(config.max_records.min(10_000))),
            config,
        }
    }

    /// Get configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Record an outcome observed now
    pub fn record(&self, predicted: f64, outcome: bool) -> Result<(), StorageError> {
        self.record_at(Utc::now(), predicted, outcome)
    }

    /// Record an outcome with an explicit timestamp
    pub fn record_at(
        &self,
        timestamp: DateTime<Utc>,
        predicted: f64,
        outcome: bool,
    ) -> Result<(), StorageError> {
        if !(predicted.is_finite() && (0.0..=1.0).contains(&predicted)) {
            return Err(StorageError::InvalidPrediction(predicted));
        }
        if self.config.max_records == 0 {
            return Ok(());
        }

        let mut records = self.lock()?;

        // Enforce retention
        while records.len() >= self.config.max_records {
            records.pop_front();
        }

        records.push_back(OutcomeRecord {
            timestamp,
            predicted,
            outcome,
        });
        Ok(())
    }

    /// Records with a timestamp at or after `since`, in insertion order
    pub fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<OutcomeRecord>, StorageError> {
        let records = self.lock()?;
        Ok(records.iter().filter(|r| r.timestamp >= since).cloned().collect())
    }

    /// Most recent records, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<OutcomeRecord>, StorageError> {
        let records = self.lock()?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    /// Paired samples recorded within `lookback` of now
    pub fn samples_within(&self, lookback: Duration) -> Result<OutcomeSamples, StorageError> {
        let window = chrono::Duration::from_std(lookback)
            .map_err(|_| StorageError::InvalidLookback(lookback))?;
        let since = Utc::now()
            .checked_sub_signed(window)
            .ok_or(StorageError::InvalidLookback(lookback))?;

        let records = self.lock()?;
        let samples: OutcomeSamples = records
            .iter()
            .filter(|r| r.timestamp >= since)
            .map(|r| (r.predicted, r.outcome))
            .collect();
        debug!(samples = samples.len(), retained = records.len(), "Fetched outcome samples");
        Ok(samples)
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether no records are retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record, returning how many were removed
    pub fn clear(&self) -> Result<usize, StorageError> {
        let mut records = self.lock()?;
        let removed = records.len();
        records.clear();
        info!(removed, "Cleared outcome repository");
        Ok(removed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<OutcomeRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }
}

impl Default for OutcomeRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutcomeSource for OutcomeRepository {
    async fn fetch(&self, lookback: Duration) -> anyhow::Result<OutcomeSamples> {
        self.samples_within(lookback)
            .context("failed to read outcome repository")
    }
}
