//! Device configuration for the macro pad
//!
//! One TOML document describes the matrix, the scan timing, telemetry
//! switches and the full keymap. It is loaded once at startup and is
//! read-only afterwards.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/ctrl-macropad/config.toml` |
//! | macOS | `~/Library/Application Support/ctrl-macropad/config.toml` |
//! | Windows | `%APPDATA%\ctrl-macropad\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use ctrl_macropad::Config;
//!
//! // Load existing config or use defaults
//! let config = Config::load().unwrap_or_default();
//! config.validate().expect("invalid configuration");
//! ```

use crate::keyboard::keymap::{EncoderConfig, KeymapConfig, LayerConfig, Rgb};
use crate::keyboard::scanner::DiodeDirection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Keymap or device bounds are inconsistent; startup must abort
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join("ctrl-macropad");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Matrix geometry and scan timing
    pub device: DeviceConfig,
    /// Host telemetry switches
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Layers, key assignments and encoder bindings
    #[serde(default)]
    pub keymap: KeymapConfig,
}

/// Matrix geometry and scan timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Tick period, which is also the debounce window
    pub scan_interval_ms: u64,
    /// Event queue capacity
    pub max_events: usize,
    /// Upper bound on configured layers and on layer stack depth
    pub num_layers: usize,
    /// Scan polarity
    pub diode_direction: DiodeDirection,
    pub rows: u8,
    pub cols: u8,
    /// Quadrature transitions per encoder pulse
    #[serde(default = "default_encoder_divisor")]
    pub encoder_divisor: u8,
}

fn default_encoder_divisor() -> u8 {
    4
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 20,
            max_events: 64,
            num_layers: 3,
            diode_direction: DiodeDirection::Col2Row,
            rows: 2,
            cols: 3,
            encoder_divisor: default_encoder_divisor(),
        }
    }
}

impl DeviceConfig {
    pub fn key_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::invalid("matrix must have at least one row and column"));
        }
        if self.scan_interval_ms == 0 {
            return Err(ConfigError::invalid("scan_interval_ms must be positive"));
        }
        if self.max_events == 0 {
            return Err(ConfigError::invalid("max_events must be positive"));
        }
        if self.num_layers == 0 {
            return Err(ConfigError::invalid("num_layers must be positive"));
        }
        if self.encoder_divisor == 0 {
            return Err(ConfigError::invalid("encoder_divisor must be positive"));
        }
        Ok(())
    }
}

/// Host telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Send telemetry when a host link is connected
    pub enabled: bool,
    /// Also report key presses, not only layer changes
    pub key_actions: bool,
    /// Serial port to the host; stdin/stdout when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    115_200
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_actions: true,
            port: None,
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for KeymapConfig {
    /// The stock three-layer layout: productivity, media, developer
    fn default() -> Self {
        let layer = |index: usize, name: &str, color: u32, keys: [&str; 6], cw: &str, ccw: &str| {
            LayerConfig {
                index,
                name: name.to_string(),
                color: Rgb::from_u32(color),
                keys: keys.iter().map(|k| k.to_string()).collect(),
                encoder: Some(EncoderConfig {
                    clockwise: cw.to_string(),
                    counterclockwise: ccw.to_string(),
                }),
            }
        };

        Self {
            layers: vec![
                layer(
                    0,
                    "PRODUCTIVITY",
                    0x00FF00,
                    ["LCTL+C", "LCTL+V", "LCTL+X", "LCTL+Z", "LCTL+S", "MO(1)"],
                    "VOLU",
                    "VOLD",
                ),
                layer(
                    1,
                    "MEDIA",
                    0xFF00FF,
                    ["MPLY", "MNXT", "MPRV", "HOME", "END", "MO(2)"],
                    "RIGHT",
                    "LEFT",
                ),
                layer(
                    2,
                    "DEVELOPER",
                    0x00FFFF,
                    ["LCTL+T", "LCTL+W", "LCTL+LSFT+P", "LCTL+SLASH", "LCTL+GRAVE", "TO(0)"],
                    "LCTL+EQUAL",
                    "LCTL+MINUS",
                ),
            ],
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check device bounds and the keymap; any failure is fatal at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device.validate()?;
        crate::keyboard::Keymap::from_config(&self.device, &self.keymap).map(|_| ())
    }
}
