//! Hysteresis band configuration

use crate::HysteresisError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Validated hysteresis band.
///
/// Immutable once built: the only constructors check that the deactivation
/// threshold sits strictly below the activation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHysteresisConfig", into = "RawHysteresisConfig")]
pub struct HysteresisConfig {
    activation_threshold: f64,
    deactivation_threshold: f64,
    min_hold_time: Duration,
}

/// Settings-file shape, with the hold time in seconds
#[derive(Debug, Serialize, Deserialize)]
struct RawHysteresisConfig {
    activation_threshold: f64,
    deactivation_threshold: f64,
    #[serde(default)]
    min_hold_time_seconds: f64,
}

impl TryFrom<RawHysteresisConfig> for HysteresisConfig {
    type Error = HysteresisError;

    fn try_from(raw: RawHysteresisConfig) -> Result<Self, Self::Error> {
        Self::from_seconds(
            raw.activation_threshold,
            raw.deactivation_threshold,
            raw.min_hold_time_seconds,
        )
    }
}

impl From<HysteresisConfig> for RawHysteresisConfig {
    fn from(config: HysteresisConfig) -> Self {
        Self {
            activation_threshold: config.activation_threshold,
            deactivation_threshold: config.deactivation_threshold,
            min_hold_time_seconds: config.min_hold_time.as_secs_f64(),
        }
    }
}

impl HysteresisConfig {
    /// Create a new band, failing if it is misconfigured
    pub fn new(
        activation_threshold: f64,
        deactivation_threshold: f64,
        min_hold_time: Duration,
    ) -> Result<Self, HysteresisError> {
        check_band(activation_threshold, deactivation_threshold)?;
        Ok(Self {
            activation_threshold,
            deactivation_threshold,
            min_hold_time,
        })
    }

    /// Create a new band with the hold time given in seconds
    pub fn from_seconds(
        activation_threshold: f64,
        deactivation_threshold: f64,
        min_hold_time_seconds: f64,
    ) -> Result<Self, HysteresisError> {
        check_band(activation_threshold, deactivation_threshold)?;

        if !min_hold_time_seconds.is_finite() {
            return Err(HysteresisError::NonFinite {
                field: "min_hold_time_seconds",
                value: min_hold_time_seconds,
            });
        }
        if min_hold_time_seconds < 0.0 {
            return Err(HysteresisError::NegativeHoldTime(min_hold_time_seconds));
        }
        let min_hold_time = Duration::try_from_secs_f64(min_hold_time_seconds)
            .map_err(|_| HysteresisError::HoldTimeOutOfRange(min_hold_time_seconds))?;

        Ok(Self {
            activation_threshold,
            deactivation_threshold,
            min_hold_time,
        })
    }

    /// Value at or above which an inactive key activates
    pub fn activation_threshold(&self) -> f64 {
        self.activation_threshold
    }

    /// Value below which an active key deactivates
    pub fn deactivation_threshold(&self) -> f64 {
        self.deactivation_threshold
    }

    /// Minimum time between two state changes
    pub fn min_hold_time(&self) -> Duration {
        self.min_hold_time
    }

    /// Width of the dead band
    pub fn band_width(&self) -> f64 {
        self.activation_threshold - self.deactivation_threshold
    }
}

fn check_band(
    activation_threshold: f64,
    deactivation_threshold: f64,
) -> Result<(), HysteresisError> {
    for (field, value) in [
        ("activation_threshold", activation_threshold),
        ("deactivation_threshold", deactivation_threshold),
    ] {
        if !value.is_finite() {
            return Err(HysteresisError::NonFinite { field, value });
        }
    }

    if deactivation_threshold >= activation_threshold {
        return Err(HysteresisError::InvalidBand {
            activation: activation_threshold,
            deactivation: deactivation_threshold,
        });
    }
    Ok(())
}
