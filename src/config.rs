//! Configuration loading with Figment.
//!
//! Configuration is loaded from:
//! 1. config.toml file (base configuration)
//! 2. Environment variables (prefixed with LABJACK_DAQ_)
//!
//! # Example
//! ```no_run
//! use labjack_daq::config::AppConfig;
//!
//! # fn main() -> Result<(), figment::Error> {
//! let config = AppConfig::load()?;
//! println!("Application: {}", config.application.name);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ljm::{ConnectionType, DeviceType};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Device selection
    #[serde(default)]
    pub device: DeviceConfig,
    /// DAC sweep defaults
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Stream-out defaults
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Application-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            name: "labjack-daq".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Which device to open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device family (ANY, T4, T7, T8, DIGIT)
    #[serde(default)]
    pub device_type: DeviceType,
    /// Transport (ANY, USB, TCP, ETHERNET, WIFI)
    #[serde(default)]
    pub connection: ConnectionType,
    /// Serial number, IP address, name, or "ANY"
    #[serde(default = "default_identifier")]
    pub identifier: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            device_type: DeviceType::default(),
            connection: ConnectionType::default(),
            identifier: default_identifier(),
        }
    }
}

/// DAC sweep defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Passes over the code range
    pub runs: usize,
    /// Binary code increment
    pub step: u32,
    /// Directory CSV output lands in
    pub output_dir: PathBuf,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            runs: 10,
            step: 1,
            output_dir: PathBuf::from("data"),
        }
    }
}

/// Stream-out defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Scans per read handed to stream start
    pub scans_per_read: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig { scans_per_read: 1 }
    }
}

fn default_identifier() -> String {
    "ANY".to_string()
}

impl AppConfig {
    /// Load configuration from config.toml and environment variables.
    ///
    /// Environment variables override file values with prefix LABJACK_DAQ_
    /// and `__` between nesting levels, for example
    /// `LABJACK_DAQ_APPLICATION__LOG_LEVEL=debug`.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("LABJACK_DAQ_").split("__"))
            .extract()
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.calibration.runs == 0 {
            return Err("calibration.runs must be at least 1".to_string());
        }
        if self.calibration.step == 0 {
            return Err("calibration.step must be nonzero".to_string());
        }
        if self.stream.scans_per_read == 0 {
            return Err("stream.scans_per_read must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.device.identifier, "ANY");
        assert_eq!(config.calibration.runs, 10);
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let mut config = AppConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_sweep_parameters_are_rejected() {
        let mut config = AppConfig::default();
        config.calibration.runs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.calibration.step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_fragment_overrides_defaults() {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(
                r#"
                [device]
                device_type = "T4"
                identifier = "470010123"

                [calibration]
                step = 16
                "#,
            ))
            .extract()
            .unwrap();
        assert_eq!(config.device.device_type, DeviceType::T4);
        assert_eq!(config.device.identifier, "470010123");
        assert_eq!(config.calibration.step, 16);
        assert_eq!(config.calibration.runs, 10);
    }
}
