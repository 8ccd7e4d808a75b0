//! Pipeline Configuration - serial link, buffer, analysis and session settings
//!
//! Each struct implements `Default` with the values the device firmware
//! was built against, so an absent config file changes nothing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::types::TherapyProfile;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a therapy station.
///
/// Load with `PipelineConfig::load()` which searches:
/// 1. `$PARKIMOTION_CONFIG` env var
/// 2. `./parkimotion.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Read and write link settings
    #[serde(default)]
    pub serial: SerialConfig,

    /// Sample ring-buffer sizing
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Bandpass filter and spectral analysis parameters
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Session monitor behaviour
    #[serde(default)]
    pub session: SessionConfig,
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PARKIMOTION_CONFIG` environment variable
    /// 2. `./parkimotion.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded pipeline config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        // 2. Check working directory
        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded pipeline config from ./{}", defaults::CONFIG_FILE_NAME);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::CONFIG_FILE_NAME);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", defaults::CONFIG_FILE_NAME);
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys are reported as warnings; impossible values fail.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Reject impossible values; log suspicious ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_ranges(self);
        for w in &warnings {
            warn!("{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            Self::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            Self::Serialize(e) => write!(f, "Config serialization error: {e}"),
            Self::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Serial
// ============================================================================

/// Names and line settings of the two device links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port the accelerometer stream arrives on
    #[serde(default = "default_read_port")]
    pub read_port: String,

    /// Port drive-frequency commands are written to
    #[serde(default = "default_write_port")]
    pub write_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Per-read timeout on both links (ms)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_read_port() -> String {
    defaults::READ_PORT.to_string()
}
fn default_write_port() -> String {
    defaults::WRITE_PORT.to_string()
}
const fn default_baud_rate() -> u32 {
    defaults::BAUD_RATE
}
const fn default_read_timeout_ms() -> u64 {
    defaults::READ_TIMEOUT_MS
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            read_port: default_read_port(),
            write_port: default_write_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl SerialConfig {
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

// ============================================================================
// Buffer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum retained samples; the oldest is evicted on overflow
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::SAMPLE_BUFFER_CAPACITY,
        }
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Parameters of the bandpass + FFT chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Nominal sample rate assumed for filtering and the frequency axis (Hz)
    pub sample_rate_hz: f64,
    pub band_low_hz: f64,
    pub band_high_hz: f64,
    /// Butterworth prototype order
    pub filter_order: usize,
    /// Samples required before any analysis output is produced
    pub min_samples: usize,
    /// Default span of the filtered time series (s)
    pub window_secs: f64,
    /// Dominant-frequency search width around a reference (Hz)
    pub search_bandwidth_hz: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: defaults::SAMPLE_RATE_HZ,
            band_low_hz: defaults::BAND_LOW_HZ,
            band_high_hz: defaults::BAND_HIGH_HZ,
            filter_order: defaults::FILTER_ORDER,
            min_samples: defaults::MIN_SAMPLES,
            window_secs: defaults::WINDOW_SECS,
            search_bandwidth_hz: defaults::SEARCH_BANDWIDTH_HZ,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Monitor poll cadence (ms)
    pub poll_interval_ms: u64,
    /// Starting therapy profile
    pub profile: TherapyProfile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            profile: TherapyProfile::default(),
        }
    }
}

impl SessionConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.serial.read_port, "COM6");
        assert_eq!(config.serial.write_port, "COM11");
        assert_eq!(config.buffer.capacity, 300);
        assert_eq!(config.analysis.min_samples, 50);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
[serial]
read_port = "/dev/ttyUSB0"

[analysis]
band_high_hz = 8.0
"#,
        )
        .unwrap();
        assert_eq!(config.serial.read_port, "/dev/ttyUSB0");
        assert_eq!(config.serial.write_port, "COM11");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.analysis.band_high_hz, 8.0);
        assert_eq!(config.analysis.band_low_hz, 3.0);
    }

    #[test]
    fn invalid_band_is_rejected() {
        let err = PipelineConfig::from_toml_str(
            r#"
[analysis]
band_low_hz = 7.0
band_high_hz = 3.0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = PipelineConfig::from_toml_str("[buffer\ncapacity = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_, _)));
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = PipelineConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
