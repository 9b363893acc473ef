//! Tracing subscriber setup

use callbridge_core::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub default_directive: String,
    /// Colourise output
    pub ansi: bool,
    /// Include the event target
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
            ansi: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Configuration with `directive` as default filter
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            default_directive: directive.into(),
            ..Self::default()
        }
    }

    /// Disable ANSI colours
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Build the filter, preferring `RUST_LOG` over the configured directive
    pub fn env_filter(&self) -> BridgeResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.default_directive).map_err(|e| BridgeError::Configuration {
            reason: format!("invalid log directive {:?}: {}", self.default_directive, e),
        })
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, which is not
/// an error so tests and embedders may call this repeatedly.
pub fn init_logging(config: &LoggingConfig) -> BridgeResult<bool> {
    let filter = config.env_filter()?;
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.with_target)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialised with {}", config.default_directive);
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: LoggingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoggingConfig::default());
        assert_eq!(config.default_directive, "info");
    }

    #[test]
    fn test_invalid_directive_is_a_configuration_error() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = LoggingConfig::new("callbridge=loud").env_filter().unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_INVALID");
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        let config = LoggingConfig::new("warn").without_ansi();
        assert!(init_logging(&config).is_ok());
        assert!(!init_logging(&config).unwrap());
    }
}
