//! Structured logging setup.
//!
//! The engine only emits `tracing` events; installing a subscriber is left to
//! the host. [`init_logging`] is a convenience for hosts and tests that just
//! want sensible output.

use crate::error::ObservabilityError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log format options for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Structured JSON output for log aggregators
    Json,
    /// Human-readable format for development (with all fields)
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

/// Logging configuration.
///
/// `RUST_LOG`, when set, takes precedence over `log_level`.
///
/// ```rust,no_run
/// # use duroflow::runtime::{ObservabilityConfig, LogFormat};
/// let config = ObservabilityConfig {
///     log_format: LogFormat::Json,
///     log_level: "debug".to_string(),
/// };
/// duroflow::runtime::init_logging(&config)?;
/// # Ok::<(), duroflow::ObservabilityError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Level applied to workflow and engine targets (e.g. "info", "debug").
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Compact,
            log_level: "info".to_string(),
        }
    }
}

fn default_filter_expression(level: &str) -> String {
    format!("warn,duroflow::workflow={level},duroflow::runtime={level}")
}

/// Install a global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter_expression(&config.log_level)));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(tracing_subscriber::fmt::layer().compact()).try_init(),
    };
    installed.map_err(|source| ObservabilityError::SubscriberInit {
        format: config.log_format,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_scopes_level_to_crate_targets() {
        assert_eq!(
            default_filter_expression("debug"),
            "warn,duroflow::workflow=debug,duroflow::runtime=debug"
        );
    }

    #[test]
    fn defaults_to_compact_info() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn second_install_reports_the_requested_format() {
        let _ = init_logging(&ObservabilityConfig::default());

        let err = init_logging(&ObservabilityConfig::default()).unwrap_err();

        assert!(matches!(
            err,
            ObservabilityError::SubscriberInit {
                format: LogFormat::Compact,
                ..
            }
        ));
        assert_eq!(err.to_string(), "failed to initialize Compact logging");
        assert!(std::error::Error::source(&err).is_some());
    }
}
