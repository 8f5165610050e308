use calibration::{CalibrationScheduler, CalibrationStatus, OutcomeSource, SchedulerConfig};
use chrono::Utc;
use outcome_store::{OutcomeRepository, StoreConfig};
use std::sync::Arc;
use std::time::Duration;

/// Overconfident model: true rate is pulled 70% of the way back toward 0.5
fn record_overconfident(repo: &OutcomeRepository) {
    for bucket in 0..20 {
        let p = 0.025 + 0.05 * bucket as f64;
        let positives = ((0.5 + (p - 0.5) * 0.3) * 20.0).round() as usize;
        for j in 0..20 {
            repo.record(p, j < positives).unwrap();
        }
    }
}

#[tokio::test]
async fn test_repository_feeds_scheduler() {
    let repo = Arc::new(OutcomeRepository::new());
    record_overconfident(&repo);

    let scheduler = CalibrationScheduler::new(SchedulerConfig::default(), repo.clone());
    let result = scheduler.run_calibration(false).await;

    assert_eq!(result.status, CalibrationStatus::Completed);
    assert_eq!(result.sample_count, 400);
    assert!(result.ece_after.unwrap() < result.ece_before.unwrap());
    assert!(scheduler.platt().is_fitted());

    // An overconfident 0.975 is pulled toward the base rate
    assert!(scheduler.calibrate_probability(0.975) < 0.975);
}

#[tokio::test]
async fn test_stale_outcomes_outside_lookback_are_ignored() {
    let repo = Arc::new(OutcomeRepository::new());
    let stale = Utc::now() - chrono::Duration::days(45);
    for i in 0..500 {
        repo.record_at(stale, 0.9, i % 2 == 0).unwrap();
    }

    let scheduler = CalibrationScheduler::new(SchedulerConfig::default(), repo.clone());
    let result = scheduler.run_calibration(true).await;

    assert_eq!(result.status, CalibrationStatus::Skipped);
    assert_eq!(result.sample_count, 0);
    assert_eq!(repo.len(), 500);
}

#[tokio::test]
async fn test_fetch_through_trait_object() {
    let repo = OutcomeRepository::with_config(StoreConfig { max_records: 2 });
    repo.record(0.1, false).unwrap();
    repo.record(0.6, true).unwrap();
    repo.record(0.8, true).unwrap();

    let source: &dyn OutcomeSource = &repo;
    let samples = source.fetch(Duration::from_secs(60)).await.unwrap();

    assert_eq!(samples.predicted, vec![0.6, 0.8]);
    assert_eq!(samples.outcomes, vec![true, true]);
}

#[tokio::test]
async fn test_fetch_rejects_unrepresentable_lookback() {
    let repo = OutcomeRepository::new();
    let source: &dyn OutcomeSource = &repo;
    assert!(source.fetch(Duration::MAX).await.is_err());
}
