//! Component wiring and lifecycle

use crate::settings::Settings;
use crate::ServiceError;
use calibration::{CalibrationScheduler, SchedulerStatus};
use hysteresis::{HysteresisController, HysteresisDecision};
use outcome_store::OutcomeRepository;
use sensitivity::{DecisionFunction, SensitivityAnalyzer};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Snapshot of every owned component
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub scheduler: SchedulerStatus,
    pub tracked_keys: usize,
    pub stored_outcomes: usize,
}

/// One instance of each decision trust component, built from settings
pub struct TrustServices {
    settings: Settings,
    hysteresis: Arc<HysteresisController>,
    store: Arc<OutcomeRepository>,
    scheduler: Arc<CalibrationScheduler>,
    scheduler_task: Mutex<Option<JoinHandle<()>>>,
}

impl TrustServices {
    /// Validate settings and construct the components
    pub fn build(settings: &Settings) -> Result<Self, ServiceError> {
        settings.validate()?;

        let store = Arc::new(OutcomeRepository::with_config(settings.store.clone()));
        let scheduler = Arc::new(CalibrationScheduler::new(
            settings.scheduler.clone(),
            store.clone(),
        ));

        info!(
            model_id = %settings.scheduler.model_id,
            hysteresis_profiles = settings.hysteresis.len(),
            "Decision trust services built"
        );

        Ok(Self {
            settings: settings.clone(),
            hysteresis: Arc::new(HysteresisController::new()),
            store,
            scheduler,
            scheduler_task: Mutex::new(None),
        })
    }

    /// Start the calibration loop. Returns false if it is already running.
    pub fn start(&self) -> bool {
        let mut task = self
            .scheduler_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("Calibration scheduler already started");
            return false;
        }

        *task = Some(self.scheduler.start());
        true
    }

    /// Stop the calibration loop and wait for it to exit
    pub async fn shutdown(&self) {
        self.scheduler.stop();

        let handle = self
            .scheduler_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Calibration scheduler task ended abnormally");
            }
        }
        info!("Decision trust services shut down");
    }

    /// Evaluate `value` for `key` against a named hysteresis profile
    pub fn evaluate(
        &self,
        profile: &str,
        key: &str,
        value: f64,
    ) -> Result<HysteresisDecision, ServiceError> {
        let config = self
            .settings
            .hysteresis_profile(profile)
            .ok_or_else(|| ServiceError::UnknownProfile(profile.to_string()))?;
        Ok(self.hysteresis.evaluate_now(key, value, config))
    }

    /// Record a realised outcome for later recalibration
    pub fn record_outcome(&self, predicted: f64, outcome: bool) -> Result<(), ServiceError> {
        self.store.record(predicted, outcome)?;
        Ok(())
    }

    /// Calibrate a raw probability with the active model
    pub fn calibrate(&self, probability: f64) -> f64 {
        self.scheduler.calibrate_probability(probability)
    }

    /// Analyzer for `decision_fn` using the configured thresholds
    pub fn analyzer(
        &self,
        decision_fn: Arc<dyn DecisionFunction>,
    ) -> Result<SensitivityAnalyzer, ServiceError> {
        Ok(SensitivityAnalyzer::with_config(
            decision_fn,
            self.settings.sensitivity.clone(),
        )?)
    }

    /// Snapshot for status reporting
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            scheduler: self.scheduler.status(),
            tracked_keys: self.hysteresis.len(),
            stored_outcomes: self.store.len(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn hysteresis(&self) -> &Arc<HysteresisController> {
        &self.hysteresis
    }

    pub fn store(&self) -> &Arc<OutcomeRepository> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<CalibrationScheduler> {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hysteresis::{EvaluationReason, HysteresisConfig};
    use sensitivity::{from_fn, Decision, DecisionInputs};

    fn settings_with_profile() -> Settings {
        let mut settings = Settings::default();
        settings.hysteresis.insert(
            "escalation".to_string(),
            HysteresisConfig::from_seconds(0.8, 0.6, 0.0).unwrap(),
        );
        settings
    }

    #[test]
    fn test_evaluate_named_profile() {
        let services = TrustServices::build(&settings_with_profile()).unwrap();

        let first = services.evaluate("escalation", "route-7", 0.85).unwrap();
        assert!(first.should_act);
        assert_eq!(first.reason, EvaluationReason::InitialEvaluation);

        let held = services.evaluate("escalation", "route-7", 0.7).unwrap();
        assert!(held.should_act);
        assert_eq!(services.status().tracked_keys, 1);
    }

    #[test]
    fn test_unknown_profile() {
        let services = TrustServices::build(&Settings::default()).unwrap();
        assert!(matches!(
            services.evaluate("missing", "k", 1.0),
            Err(ServiceError::UnknownProfile(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_record_outcome_validates() {
        let services = TrustServices::build(&Settings::default()).unwrap();
        services.record_outcome(0.4, true).unwrap();
        assert!(matches!(
            services.record_outcome(2.0, true),
            Err(ServiceError::Storage(_))
        ));
        assert_eq!(services.status().stored_outcomes, 1);
    }

    #[test]
    fn test_uncalibrated_is_identity() {
        let services = TrustServices::build(&Settings::default()).unwrap();
        assert_eq!(services.calibrate(0.42), 0.42);
    }

    #[tokio::test]
    async fn test_analyzer_uses_configured_thresholds() {
        let mut settings = Settings::default();
        settings.sensitivity.max_key_drivers = 1;
        let services = TrustServices::build(&settings).unwrap();

        let analyzer = services
            .analyzer(from_fn(|_: &DecisionInputs| Decision::new("hold", 1.0)))
            .unwrap();
        assert_eq!(analyzer.config().max_key_drivers, 1);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let services = TrustServices::build(&Settings::default()).unwrap();

        assert!(services.start());
        assert!(!services.start());

        // First run happens immediately and skips on an empty store
        for _ in 0..100 {
            if services.scheduler().last_run().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        services.shutdown().await;

        let status = services.status();
        assert!(!status.scheduler.running);
        assert_eq!(status.scheduler.history_len, 1);
    }
}
