//! Logging initialization for nimbus binaries
//!
//! Structured JSON logging via tracing-subscriber, filtered through
//! `RUST_LOG` with a sensible default. Called once from the hosting
//! process before the first reconciliation pass.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Errors that can occur during logging initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the tracing subscriber
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Service name recorded on every event
    pub service_name: String,

    /// Emit JSON lines (true, the default) or human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "nimbus".to_string(),
            json: true,
        }
    }
}

/// Initialize logging with the given configuration.
///
/// Respects `RUST_LOG` when set; otherwise defaults to info-level output
/// with debug detail for nimbus crates.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nimbus=debug,kube=info,hyper=warn,tower=warn"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true);
        registry.with(fmt_layer).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    tracing::info!(service = %config.service_name, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_json_with_service_name() {
        let config = LoggingConfig::default();
        assert_eq!(config.service_name, "nimbus");
        assert!(config.json);
    }

    #[test]
    fn init_is_idempotent_enough_for_tests() {
        // A second init in the same process must fail cleanly, not panic.
        let config = LoggingConfig {
            service_name: "test".to_string(),
            json: false,
        };
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(first.is_ok() || second.is_err());
    }
}
