//! Configuration types and defaults

use callbridge_core::{BridgeError, BridgeResult};
use callbridge_diagnostics::{LoggingConfig, DEFAULT_TRACE_CAPACITY};
use callbridge_media::DTMF_TONE_VOLUME;
use serde::{Deserialize, Serialize};

/// RTCP minimum reporting interval advertised for codecs that carry none
pub const DEFAULT_REPORTING_INTERVAL_MS: u32 = 5000;

/// Bridge-wide configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Volume used for DTMF tones and expected back from the engine
    pub dtmf_volume: u8,
    /// Reporting interval in milliseconds for RTCP feedback entries without one
    pub default_reporting_interval_ms: u32,
    /// Apply the engine's default codec preferences to new sessions
    pub apply_default_codec_preferences: bool,
    /// Number of engine bus routing decisions kept for inspection
    pub bus_trace_capacity: usize,
    /// Logging setup
    pub logging: LoggingConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dtmf_volume: DTMF_TONE_VOLUME,
            default_reporting_interval_ms: DEFAULT_REPORTING_INTERVAL_MS,
            apply_default_codec_preferences: true,
            bus_trace_capacity: DEFAULT_TRACE_CAPACITY,
            logging: LoggingConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| BridgeError::Configuration {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the bridge cannot work with
    pub fn validate(&self) -> BridgeResult<()> {
        if self.dtmf_volume > 63 {
            return Err(BridgeError::Configuration {
                reason: format!("DTMF volume {} is outside 0..=63", self.dtmf_volume),
            });
        }
        Ok(())
    }
}
