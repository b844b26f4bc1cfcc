//! Configuration System using Figment
//!
//! Configuration is loaded from:
//! 1. `laser_daq.toml` (or a file given on the command line)
//! 2. Environment variables prefixed with `LASER_DAQ_`
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! LASER_DAQ_APPLICATION__LOG_LEVEL=debug
//! LASER_DAQ_VERSALASE__PORT=/dev/ttyUSB3
//! LASER_DAQ_COBOLT__BAUD_RATE=57600
//! ```
//!
//! # Example
//!
//! ```no_run
//! use laser_daq::config::LaserDaqConfig;
//!
//! let config = LaserDaqConfig::load().unwrap();
//! println!("Log level: {}", config.application.log_level);
//! if let Some(versalase) = &config.versalase {
//!     println!("VersaLase on {}", versalase.port);
//! }
//! ```

use crate::error::{AppResult, DaqError};
use crate::hardware::SerialPortConfig;
use crate::logging::OutputFormat;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "laser_daq.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "LASER_DAQ_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaserDaqConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Stradus VersaLase, if one is attached
    #[serde(default)]
    pub versalase: Option<VersaLaseConfig>,
    /// Cobolt laser, if one is attached
    #[serde(default)]
    pub cobolt: Option<CoboltConfig>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
        }
    }
}

/// Stradus VersaLase configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersaLaseConfig {
    /// Serial port (e.g., "/dev/ttyUSB0")
    pub port: String,
    /// Baud rate
    #[serde(default = "default_versalase_baud_rate")]
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    #[serde(default = "default_versalase_timeout")]
    pub timeout_ms: u64,
    /// Slots to probe during discovery
    #[serde(default = "default_versalase_slots")]
    pub slots: Vec<u8>,
}

/// Cobolt laser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoboltConfig {
    /// Serial port (e.g., "/dev/ttyUSB1")
    pub port: String,
    /// Baud rate
    #[serde(default = "default_cobolt_baud_rate")]
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    #[serde(default = "default_cobolt_timeout")]
    pub timeout_ms: u64,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "laser_daq".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_versalase_baud_rate() -> u32 {
    19200
}

fn default_versalase_timeout() -> u64 {
    6000
}

fn default_versalase_slots() -> Vec<u8> {
    (1..=8).collect()
}

fn default_cobolt_baud_rate() -> u32 {
    115200
}

fn default_cobolt_timeout() -> u64 {
    100
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl LaserDaqConfig {
    /// Load configuration from [`DEFAULT_CONFIG_FILE`] and environment variables.
    ///
    /// A missing file is not an error; every section has defaults or is optional.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file path
    ///
    /// Environment variables take precedence over the file, and the file over the
    /// built-in defaults. The result is validated.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks the log level, non-empty port paths, non-zero baud rates and that
    /// VersaLase slots lie in 1..=8.
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if let Some(versalase) = &self.versalase {
            validate_port("versalase", &versalase.port, versalase.baud_rate)?;
            if let Some(slot) = versalase.slots.iter().find(|s| !(1..=8).contains(*s)) {
                return Err(DaqError::Configuration(format!(
                    "versalase: slot {} out of range 1-8",
                    slot
                )));
            }
        }

        if let Some(cobolt) = &self.cobolt {
            validate_port("cobolt", &cobolt.port, cobolt.baud_rate)?;
        }

        Ok(())
    }
}

fn validate_port(section: &str, port: &str, baud_rate: u32) -> AppResult<()> {
    if port.is_empty() {
        return Err(DaqError::Configuration(format!(
            "{section}: 'port' cannot be empty"
        )));
    }
    if baud_rate == 0 {
        return Err(DaqError::Configuration(format!(
            "{section}: 'baud_rate' must be > 0"
        )));
    }
    Ok(())
}

impl VersaLaseConfig {
    /// Line settings for the VersaLase port.
    pub fn serial_config(&self) -> SerialPortConfig {
        SerialPortConfig {
            path: self.port.clone(),
            baud_rate: self.baud_rate,
            timeout: Duration::from_millis(self.timeout_ms),
            ..SerialPortConfig::versalase()
        }
    }
}

impl CoboltConfig {
    /// Line settings for the Cobolt port.
    pub fn serial_config(&self) -> SerialPortConfig {
        SerialPortConfig {
            path: self.port.clone(),
            baud_rate: self.baud_rate,
            timeout: Duration::from_millis(self.timeout_ms),
            ..SerialPortConfig::cobolt()
        }
    }
}
