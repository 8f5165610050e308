//! Settings loading

use crate::ServiceError;
use calibration::SchedulerConfig;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use hysteresis::HysteresisConfig;
use outcome_store::StoreConfig;
use sensitivity::SensitivityConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Prefix for environment overrides, e.g. `DECISION_TRUST__SCHEDULER__INTERVAL_MS`
const ENV_PREFIX: &str = "DECISION_TRUST";

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset (default: "info")
    pub level: String,
    /// Emit JSON lines instead of human-readable output (default: false)
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Process-wide settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogSettings,
    pub sensitivity: SensitivityConfig,
    pub scheduler: SchedulerConfig,
    pub store: StoreConfig,
    /// Named hysteresis bands. Profile names are lowercased by the loader.
    pub hysteresis: BTreeMap<String, HysteresisConfig>,
}

impl Settings {
    /// Load settings from an optional TOML file plus `DECISION_TRUST__*` overrides.
    ///
    /// Load order:
    /// 1. built-in defaults
    /// 2. `path`, if given (must exist)
    /// 3. environment variables, `__` separating nested keys
    pub fn load(path: Option<&Path>) -> Result<Self, ServiceError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        Self::from_builder(builder)
    }

    /// Parse settings from a TOML document, ignoring the environment
    pub fn from_toml_str(toml: &str) -> Result<Self, ServiceError> {
        Self::from_builder(
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ServiceError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints that deserialization alone cannot
    pub fn validate(&self) -> Result<(), ServiceError> {
        self.sensitivity.validate()?;
        self.scheduler.platt.validate()?;

        if self.scheduler.num_bins == 0 {
            return Err(ServiceError::InvalidSetting(
                "scheduler.num_bins must be at least 1".to_string(),
            ));
        }
        if self.scheduler.interval_ms == 0 {
            return Err(ServiceError::InvalidSetting(
                "scheduler.interval_ms must be at least 1".to_string(),
            ));
        }
        if self.scheduler.model_id.is_empty() {
            return Err(ServiceError::InvalidSetting(
                "scheduler.model_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up a hysteresis profile by name
    pub fn hysteresis_profile(&self, name: &str) -> Option<&HysteresisConfig> {
        self.hysteresis.get(name)
    }
}
