use calibration::CalibrationStatus;
use sensitivity::{from_fn, Decision, DecisionInputs, InputRanges};
use trust_service::{Settings, TrustServices};

const SETTINGS: &str = r#"
[scheduler]
model_id = "delay-risk"
min_samples_required = 200

[hysteresis.reroute]
activation_threshold = 0.7
deactivation_threshold = 0.5
min_hold_time_seconds = 600.0
"#;

#[tokio::test]
async fn test_record_then_recalibrate() {
    let settings = Settings::from_toml_str(SETTINGS).unwrap();
    let services = TrustServices::build(&settings).unwrap();

    // Overconfident predictions: observed rate is pulled toward 0.5
    for bucket in 0..20 {
        let p = 0.025 + 0.05 * bucket as f64;
        let positives = ((0.5 + (p - 0.5) * 0.3) * 20.0).round() as usize;
        for j in 0..20 {
            services.record_outcome(p, j < positives).unwrap();
        }
    }

    let result = services.scheduler().run_calibration(false).await;
    assert_eq!(result.status, CalibrationStatus::Completed);
    assert_eq!(result.model_id, "delay-risk");
    assert!(services.calibrate(0.975) < 0.975);

    let status = services.status();
    assert_eq!(status.stored_outcomes, 400);
    assert_eq!(status.scheduler.history_len, 1);
    assert!(status.scheduler.platt_parameters.is_some());

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["scheduler"]["model_id"], "delay-risk");
}

#[tokio::test]
async fn test_hold_time_debounces_profile() {
    let settings = Settings::from_toml_str(SETTINGS).unwrap();
    let services = TrustServices::build(&settings).unwrap();

    assert!(services.evaluate("reroute", "shipment-1", 0.9).unwrap().should_act);
    // Well under the deactivation threshold but inside the 10 minute hold
    let held = services.evaluate("reroute", "shipment-1", 0.1).unwrap();
    assert!(held.should_act);
    assert!(held.reason.to_string().starts_with("hold_time_active"));
}

#[tokio::test]
async fn test_analyzer_from_services() {
    let services = TrustServices::build(&Settings::default()).unwrap();
    let analyzer = services
        .analyzer(from_fn(|inputs: &DecisionInputs| {
            if inputs["risk"] >= 0.6 {
                Decision::new("reroute", 1.0)
            } else {
                Decision::new("wait", 0.5)
            }
        }))
        .unwrap();

    let base: DecisionInputs = [("risk".to_string(), 0.7)].into_iter().collect();
    let ranges: InputRanges = [("risk".to_string(), (0.0, 1.0))].into_iter().collect();
    let report = analyzer.analyze(&base, &ranges).await.unwrap();

    assert_eq!(report.base_decision, "reroute");
    assert!(report.is_fragile());
}
