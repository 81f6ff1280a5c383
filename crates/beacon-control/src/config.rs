//! Beacon configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) yields a working setup that drives the first bridge found.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::level_filters::LevelFilter;

use crate::animator::{PulseShape, DEFAULT_FLOOR, DEFAULT_STEP};
use crate::device::{LinkSettings, SessionSettings, DEFAULT_BAUD_RATE};
use crate::dmx::MAX_ADDRESS;
use crate::{error::ControlError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    pub device: DeviceConfig,
    pub animation: AnimationConfig,
    pub web: WebServerConfig,
    pub logging: LogConfig,
}

/// Bridge selection and transmit timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// USB serial number of the bridge; first one enumerated when unset
    pub serial_number: Option<String>,
    pub transmit_interval_ms: u64,
    pub discovery_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub baud_rate: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial_number: None,
            transmit_interval_ms: 1,
            discovery_interval_ms: 100,
            shutdown_timeout_ms: 2000,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl DeviceConfig {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            discovery_interval: Duration::from_millis(self.discovery_interval_ms),
            transmit_interval: Duration::from_millis(self.transmit_interval_ms),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
            link: LinkSettings {
                baud_rate: self.baud_rate,
                ..LinkSettings::default()
            },
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Pulse animation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub tick_interval_ms: u64,
    pub step: f32,
    pub floor: f32,
    /// Start address of the beacon's RGB triple
    pub channel: usize,
    /// Restart the fade from dark whenever the bridge (re)connects
    pub reset_on_connect: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1,
            step: DEFAULT_STEP,
            floor: DEFAULT_FLOOR,
            channel: 1,
            reset_on_connect: false,
        }
    }
}

impl AnimationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn pulse_shape(&self) -> PulseShape {
        PulseShape {
            step: self.step,
            floor: self.floor,
        }
    }
}

/// HTTP control surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebServerConfig {
    pub host: String,
    pub port: u16,
    /// Runtime worker threads serving requests
    pub worker_threads: usize,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            // Localhost unless explicitly exposed
            host: "127.0.0.1".to_string(),
            port: 8080,
            worker_threads: 1,
        }
    }
}

impl WebServerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    pub log_directory: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_directory: PathBuf::from("logs"),
        }
    }
}

impl LogConfig {
    /// Level filter for `level`, INFO if it does not parse
    pub fn parse_level(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::INFO)
    }

    pub fn ensure_log_directory(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.log_directory)
    }

    pub fn current_log_path(&self) -> PathBuf {
        self.log_directory.join("beacon.log")
    }
}

impl BeaconConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BeaconConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ControlError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let device = &self.device;
        if let Some(serial) = &device.serial_number {
            if serial.trim().is_empty() {
                return Err(invalid("device.serial_number must not be empty"));
            }
        }
        if device.transmit_interval_ms == 0 {
            return Err(invalid("device.transmit_interval_ms must be positive"));
        }
        if device.discovery_interval_ms == 0 {
            return Err(invalid("device.discovery_interval_ms must be positive"));
        }
        if device.shutdown_timeout_ms == 0 {
            return Err(invalid("device.shutdown_timeout_ms must be positive"));
        }
        if device.baud_rate == 0 {
            return Err(invalid("device.baud_rate must be positive"));
        }

        let animation = &self.animation;
        if animation.tick_interval_ms == 0 {
            return Err(invalid("animation.tick_interval_ms must be positive"));
        }
        if !(animation.step > 0.0 && animation.step <= 1.0) {
            return Err(invalid("animation.step must be within (0, 1]"));
        }
        if !animation.floor.is_finite() || animation.floor < 0.0 {
            return Err(invalid("animation.floor must be a non-negative number"));
        }
        if !(1..=MAX_ADDRESS - 2).contains(&animation.channel) {
            return Err(invalid("animation.channel must be within [1-510]"));
        }

        if self.web.worker_threads == 0 {
            return Err(invalid("web.worker_threads must be a positive integer"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> ControlError {
    ControlError::ConfigError(message.to_string())
}
