//! Calibration Scheduler Implementation

use crate::isotonic::IsotonicCalibrator;
use crate::platt::{PlattFitOptions, PlattParameters, PlattScaler};
use crate::scoring::{calculate_brier_score, calculate_calibration_error};
use crate::source::{OutcomeSamples, OutcomeSource};
use crate::CalibrationError;
use anyhow::Context;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Which fitted model `calibrate_probability` applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    #[default]
    Platt,
    Isotonic,
}

/// Terminal (or in-flight) state of a calibration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl CalibrationStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationStatus::Pending => "pending",
            CalibrationStatus::Running => "running",
            CalibrationStatus::Completed => "completed",
            CalibrationStatus::Failed => "failed",
            CalibrationStatus::Skipped => "skipped",
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Identifier recorded on every result
    pub model_id: String,
    /// Time between scheduled runs in milliseconds (default: 24h)
    pub interval_ms: u64,
    /// How often an idle scheduler wakes to check if a run is due (default: 1h)
    pub check_interval_ms: u64,
    /// How far back to pull outcome samples (default: 30 days)
    pub lookback_days: u32,
    /// Fewer samples than this skips the run (default: 100)
    pub min_samples_required: usize,
    /// ECE below this skips unforced runs (default: 0.05)
    pub recalibration_threshold: f64,
    /// ECE increase beyond this flags the run (default: 0.02)
    pub degradation_threshold: f64,
    /// Bins used for ECE (default: 10)
    pub num_bins: usize,
    /// Results kept in history (default: 100)
    pub max_history: usize,
    /// Model applied by `calibrate_probability`
    pub method: CalibrationMethod,
    /// Platt gradient descent settings
    pub platt: PlattFitOptions,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            model_id: "default".to_string(),
            interval_ms: 24 * 60 * 60 * 1000,
            check_interval_ms: 60 * 60 * 1000,
            lookback_days: 30,
            min_samples_required: 100,
            recalibration_threshold: 0.05,
            degradation_threshold: 0.02,
            num_bins: 10,
            max_history: 100,
            method: CalibrationMethod::Platt,
            platt: PlattFitOptions::default(),
        }
    }
}

impl SchedulerConfig {
    /// Time between scheduled runs
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Idle re-check period
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }

    /// Sample window requested from the outcome source
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(u64::from(self.lookback_days) * 24 * 60 * 60)
    }
}

/// Outcome of one calibration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub run_id: Uuid,
    pub model_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether the run ignored the recalibration threshold
    pub forced: bool,
    pub sample_count: usize,
    pub ece_before: Option<f64>,
    pub ece_after: Option<f64>,
    pub brier_before: Option<f64>,
    pub brier_after: Option<f64>,
    pub platt_parameters: Option<PlattParameters>,
    /// Number of blocks in the fitted isotonic map
    pub isotonic_blocks: Option<usize>,
    pub status: CalibrationStatus,
    /// Skip reason or failure message
    pub message: Option<String>,
    /// Set when the fit made calibration noticeably worse
    pub warning: Option<String>,
}

impl CalibrationResult {
    fn new(model_id: &str, forced: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            model_id: model_id.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            forced,
            sample_count: 0,
            ece_before: None,
            ece_after: None,
            brier_before: None,
            brier_after: None,
            platt_parameters: None,
            isotonic_blocks: None,
            status: CalibrationStatus::Pending,
            message: None,
            warning: None,
        }
    }

    /// ECE reduction achieved by the run, if it fitted
    pub fn ece_improvement(&self) -> Option<f64> {
        Some(self.ece_before? - self.ece_after?)
    }
}

/// Snapshot of the scheduler for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub model_id: String,
    pub running: bool,
    pub method: CalibrationMethod,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub platt_parameters: Option<PlattParameters>,
    pub isotonic_blocks: Option<usize>,
    pub history_len: usize,
}

/// Periodically refits the calibrators from an outcome source.
///
/// Owns the active Platt and isotonic models. Fits are computed off the
/// async workers and published atomically, so `calibrate_probability`
/// never observes a partially updated model.
pub struct CalibrationScheduler {
    config: SchedulerConfig,
    source: Arc<dyn OutcomeSource>,
    platt: Arc<PlattScaler>,
    isotonic: Arc<IsotonicCalibrator>,
    history: Mutex<VecDeque<CalibrationResult>>,
    last_run: Mutex<Option<DateTime<Utc>>>,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl CalibrationScheduler {
    /// Create a scheduler with unfitted (identity) calibrators
    pub fn new(config: SchedulerConfig, source: Arc<dyn OutcomeSource>) -> Self {
        info!(
            model_id = %config.model_id,
            method = ?config.method,
            interval_ms = config.interval_ms,
            "Creating calibration scheduler"
        );
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            source,
            platt: Arc::new(PlattScaler::new()),
            isotonic: Arc::new(IsotonicCalibrator::new()),
            history: Mutex::new(VecDeque::new()),
            last_run: Mutex::new(None),
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Spawn the periodic loop. The first run happens immediately.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let interval = scheduler.config.interval();
            let check_interval = scheduler.config.check_interval();
            info!(
                model_id = %scheduler.config.model_id,
                interval_ms = scheduler.config.interval_ms,
                check_interval_ms = scheduler.config.check_interval_ms,
                "Starting calibration scheduler"
            );

            let mut next_due = Instant::now();
            loop {
                if *shutdown_rx.borrow_and_update() {
                    break;
                }

                if Instant::now() >= next_due {
                    scheduler.run_calibration(false).await;
                    next_due = Instant::now() + interval;
                }

                let wait = check_interval.min(next_due.saturating_duration_since(Instant::now()));
                debug!(wait_ms = wait.as_millis() as u64, "Calibration scheduler idle");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            scheduler.running.store(false, Ordering::SeqCst);
            info!(model_id = %scheduler.config.model_id, "Calibration scheduler stopped");
        })
    }

    /// Ask the loop to exit; an in-flight fit is allowed to finish
    pub fn stop(&self) {
        info!(model_id = %self.config.model_id, "Stopping calibration scheduler");
        self.shutdown_tx.send_replace(true);
    }

    /// Check if the loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Execute one calibration run and record its result.
    ///
    /// Never fails: unexpected errors become a `Failed` result.
    pub async fn run_calibration(&self, force: bool) -> CalibrationResult {
        let mut result = CalibrationResult::new(&self.config.model_id, force);
        result.status = CalibrationStatus::Running;
        info!(
            run_id = %result.run_id,
            model_id = %result.model_id,
            force,
            "Starting calibration run"
        );

        match self.execute(&mut result).await {
            Ok(status) => result.status = status,
            Err(e) => {
                error!(
                    run_id = %result.run_id,
                    error = %format!("{:#}", e),
                    "Calibration run failed"
                );
                result.status = CalibrationStatus::Failed;
                result.message = Some(format!("{:#}", e));
            }
        }

        result.completed_at = Some(Utc::now());
        counter!("calibration_runs_total", "status" => result.status.as_str()).increment(1);
        info!(
            run_id = %result.run_id,
            status = result.status.as_str(),
            samples = result.sample_count,
            ece_before = ?result.ece_before,
            ece_after = ?result.ece_after,
            "Calibration run finished"
        );

        self.record(result.clone());
        result
    }

    async fn execute(&self, result: &mut CalibrationResult) -> anyhow::Result<CalibrationStatus> {
        let samples = self
            .source
            .fetch(self.config.lookback())
            .await
            .context("Failed to fetch outcome samples")?;
        samples.validate()?;
        result.sample_count = samples.len();

        if samples.len() < self.config.min_samples_required {
            let message = format!(
                "Insufficient samples: {} < {}",
                samples.len(),
                self.config.min_samples_required
            );
            info!(run_id = %result.run_id, "Skipping calibration: {}", message);
            result.message = Some(message);
            return Ok(CalibrationStatus::Skipped);
        }

        let before = calculate_calibration_error(
            &samples.predicted,
            &samples.outcomes,
            self.config.num_bins,
        )?;
        let brier_before = calculate_brier_score(&samples.predicted, &samples.outcomes)?;
        result.ece_before = Some(before.ece);
        result.brier_before = Some(brier_before);
        gauge!("calibration_ece_before").set(before.ece);

        if before.ece < self.config.recalibration_threshold && !result.forced {
            let message = format!(
                "Already well calibrated: ECE {:.4} < {:.4}",
                before.ece, self.config.recalibration_threshold
            );
            info!(run_id = %result.run_id, "Skipping calibration: {}", message);
            result.message = Some(message);
            return Ok(CalibrationStatus::Skipped);
        }

        let (samples, parameters, isotonic_blocks) = self.fit_models(samples).await?;
        result.platt_parameters = Some(parameters);
        result.isotonic_blocks = Some(isotonic_blocks);

        let calibrated: Vec<f64> = samples.predicted.iter().map(|&p| parameters.apply(p)).collect();
        let after =
            calculate_calibration_error(&calibrated, &samples.outcomes, self.config.num_bins)?;
        let brier_after = calculate_brier_score(&calibrated, &samples.outcomes)?;
        result.ece_after = Some(after.ece);
        result.brier_after = Some(brier_after);
        gauge!("calibration_ece_after").set(after.ece);

        let degradation = after.ece - before.ece;
        if degradation > self.config.degradation_threshold {
            let warning = format!(
                "Calibration degraded: ECE rose from {:.4} to {:.4}",
                before.ece, after.ece
            );
            warn!(run_id = %result.run_id, "{}", warning);
            result.warning = Some(warning);
        }

        Ok(CalibrationStatus::Completed)
    }

    /// Fit both calibrators on the blocking pool, handing the samples back
    async fn fit_models(
        &self,
        samples: OutcomeSamples,
    ) -> anyhow::Result<(OutcomeSamples, PlattParameters, usize)> {
        let platt = Arc::clone(&self.platt);
        let isotonic = Arc::clone(&self.isotonic);
        let options = self.config.platt.clone();

        let fitted = tokio::task::spawn_blocking(move || -> Result<_, CalibrationError> {
            let fit = platt.fit(&samples.predicted, &samples.outcomes, &options)?;
            let map = isotonic.fit(&samples.predicted, &samples.outcomes)?;
            Ok((samples, fit.parameters, map.len()))
        })
        .await
        .context("Calibration fit task did not complete")??;

        Ok(fitted)
    }

    fn record(&self, result: CalibrationResult) {
        *lock(&self.last_run) = result.completed_at;

        let mut history = lock(&self.history);
        history.push_back(result);
        while history.len() > self.config.max_history.max(1) {
            history.pop_front();
        }
    }

    /// Calibrate a probability with the configured method
    pub fn calibrate_probability(&self, probability: f64) -> f64 {
        match self.config.method {
            CalibrationMethod::Platt => self.platt.calibrate(probability),
            CalibrationMethod::Isotonic => self.isotonic.calibrate(probability),
        }
    }

    /// Calibrate a batch of probabilities with the configured method
    pub fn calibrate_batch(&self, probabilities: &[f64]) -> Vec<f64> {
        probabilities
            .iter()
            .map(|&p| self.calibrate_probability(p))
            .collect()
    }

    /// Most recent results, newest first
    pub fn history(&self, limit: usize) -> Vec<CalibrationResult> {
        lock(&self.history).iter().rev().take(limit).cloned().collect()
    }

    /// Completion time of the most recent run
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_run)
    }

    /// Snapshot for status reporting
    pub fn status(&self) -> SchedulerStatus {
        let last_run = self.last_run();
        let next_run = last_run.and_then(|t| {
            chrono::Duration::from_std(self.config.interval())
                .ok()
                .map(|interval| t + interval)
        });

        SchedulerStatus {
            model_id: self.config.model_id.clone(),
            running: self.is_running(),
            method: self.config.method,
            last_run,
            next_run,
            platt_parameters: self.platt.parameters(),
            isotonic_blocks: self.isotonic.map().map(|m| m.len()),
            history_len: lock(&self.history).len(),
        }
    }

    /// The Platt model
    pub fn platt(&self) -> &Arc<PlattScaler> {
        &self.platt
    }

    /// The isotonic model
    pub fn isotonic(&self) -> &Arc<IsotonicCalibrator> {
        &self.isotonic
    }

    /// Get configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
