//! Startup configuration
//!
//! Loaded from an optional TOML file; every field has a default so a
//! missing file or a partial one is fine. Command-line flags override the
//! file after loading.
//!
//! ```toml
//! serial_port = "/dev/ttyACM0"
//! baud = 921600
//! udp_port = 4048
//! led_count = 43
//! test_pattern = true
//!
//! [tweening]
//! tweening_enabled = true
//! tweening_steps = 4
//! target_fps = 60
//! ```

use crate::constants::{
    DEFAULT_BAUD, DEFAULT_LED_COUNT, DEFAULT_UDP_PORT, DIAGNOSTIC_PREFIX, MAX_LED_COUNT,
};
use crate::error::ConfigError;
use crate::settings::BridgeSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Bridge configuration fixed at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Serial device; auto-detected when absent
    pub serial_port: Option<String>,

    /// Serial baud rate
    pub baud: u32,

    /// UDP port to listen on (all interfaces)
    pub udp_port: u16,

    /// LEDs on the device; full frames are `led_count * 3` bytes
    pub led_count: usize,

    /// Prefix marking device diagnostic lines
    pub diagnostic_prefix: String,

    /// Send the colour test sweep after startup
    pub test_pattern: bool,

    /// Initial tweening settings
    pub tweening: BridgeSettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial_port: None,
            baud: DEFAULT_BAUD,
            udp_port: DEFAULT_UDP_PORT,
            led_count: DEFAULT_LED_COUNT,
            diagnostic_prefix: DIAGNOSTIC_PREFIX.to_string(),
            test_pattern: false,
            tweening: BridgeSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text)?;
        config.validate()?;
        config.tweening = config.tweening.clamped();
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Reject values the bridge cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.led_count == 0 || self.led_count > MAX_LED_COUNT {
            return Err(ConfigError::Invalid {
                field: "led_count",
                reason: format!("must be between 1 and {}", MAX_LED_COUNT),
            });
        }
        if self.udp_port == 0 {
            return Err(ConfigError::Invalid {
                field: "udp_port",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.baud == 0 {
            return Err(ConfigError::Invalid {
                field: "baud",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.diagnostic_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "diagnostic_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
