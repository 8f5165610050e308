//! Logging initialization

use crate::settings::LogSettings;
use crate::ServiceError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level`. Fails if a subscriber
/// is already installed.
pub fn init_logging(settings: &LogSettings) -> Result<(), ServiceError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| ServiceError::Logging(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if settings.json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| ServiceError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_reported() {
        std::env::remove_var("RUST_LOG");
        let settings = LogSettings {
            level: "decision_trust=notalevel".to_string(),
            json: false,
        };
        assert!(matches!(init_logging(&settings), Err(ServiceError::Logging(_))));
    }
}
