//! Property tests for the hysteresis band and debounce guarantees

use hysteresis::{HysteresisConfig, HysteresisController};
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn band() -> impl Strategy<Value = (f64, f64)> {
    (-1000.0f64..1000.0, 0.001f64..500.0).prop_map(|(deactivation, width)| {
        (deactivation + width, deactivation)
    })
}

proptest! {
    #[test]
    fn ordered_band_always_constructs(
        (activation, deactivation) in band(),
        hold in 0.0f64..3600.0,
    ) {
        prop_assert!(HysteresisConfig::from_seconds(activation, deactivation, hold).is_ok());
    }

    #[test]
    fn unordered_band_never_constructs(a in -1000.0f64..1000.0, offset in 0.0f64..500.0) {
        prop_assert!(HysteresisConfig::from_seconds(a, a + offset, 0.0).is_err());
    }

    #[test]
    fn active_state_survives_dead_band(
        (activation, deactivation) in band(),
        fractions in prop::collection::vec(0.0f64..=1.0, 1..50),
        overshoot in 0.0f64..100.0,
    ) {
        let config = HysteresisConfig::from_seconds(activation, deactivation, 1.0).unwrap();
        let controller = HysteresisController::new();
        let t0 = Instant::now();

        prop_assert!(controller.evaluate("k", activation + overshoot, &config, t0).should_act);

        for (i, fraction) in fractions.iter().enumerate() {
            let value = deactivation + fraction * (activation - deactivation) * 0.999;
            let now = t0 + Duration::from_secs(2 * (i as u64 + 1));
            prop_assert!(controller.evaluate("k", value, &config, now).should_act);
        }
        prop_assert_eq!(controller.get_state("k").unwrap().change_count, 0);
    }

    #[test]
    fn inactive_state_survives_dead_band(
        (activation, deactivation) in band(),
        fractions in prop::collection::vec(0.0f64..1.0, 1..50),
    ) {
        let config = HysteresisConfig::from_seconds(activation, deactivation, 1.0).unwrap();
        let controller = HysteresisController::new();
        let t0 = Instant::now();

        prop_assert!(!controller.evaluate("k", deactivation - 1.0, &config, t0).should_act);

        for (i, fraction) in fractions.iter().enumerate() {
            let value = deactivation + fraction * (activation - deactivation) * 0.999;
            let now = t0 + Duration::from_secs(2 * (i as u64 + 1));
            prop_assert!(!controller.evaluate("k", value, &config, now).should_act);
        }
    }

    #[test]
    fn evaluations_within_hold_time_agree(
        (activation, deactivation) in band(),
        first in -2000.0f64..2000.0,
        second in -2000.0f64..2000.0,
        hold_secs in 1u64..3600,
        gap_fraction in 0.0f64..1.0,
    ) {
        let config =
            HysteresisConfig::new(activation, deactivation, Duration::from_secs(hold_secs))
                .unwrap();
        let controller = HysteresisController::new();
        let t0 = Instant::now();

        let a = controller.evaluate("k", first, &config, t0);
        let gap = Duration::from_secs_f64(hold_secs as f64 * gap_fraction);
        let b = controller.evaluate("k", second, &config, t0 + gap);
        prop_assert_eq!(a.should_act, b.should_act);
    }
}
