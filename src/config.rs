//! Settings loaded with Figment.
//!
//! Settings are merged from, lowest precedence first:
//! 1. built-in defaults
//! 2. a YAML file (`$WFS_CONFIG`, else `$LOG_CFG`, else `wfs.yaml`)
//! 3. environment variables prefixed with `WFS_`, nested with `__`
//!
//! ```text
//! WFS_LOGGING__LEVEL=debug
//! WFS_LIBRARY__PATH=/opt/thorlabs/lib/libWFS_64.so
//! WFS_MEASUREMENT__ZERNIKE_ORDERS=6
//! ```
//!
//! A missing YAML file is not an error; the defaults log at INFO.
//!
//! # Example
//!
//! ```no_run
//! use rust_wfs::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("Log level: {}", settings.logging.level);
//!     println!("Zernike orders: {}", settings.measurement.zernike_orders);
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use wfs_sys::ViInt32;

use crate::constants::{
    is_valid_zernike_order, NOISE_LEVEL_MAX, NOISE_LEVEL_MIN, PIXEL_FORMAT_MONO8,
};
use crate::error::{WfsError, WfsResult};

/// Environment variable naming the YAML file.
pub const CONFIG_ENV: &str = "WFS_CONFIG";
/// Older name of [`CONFIG_ENV`], still honoured.
pub const LEGACY_CONFIG_ENV: &str = "LOG_CFG";
/// File read when neither variable is set.
pub const DEFAULT_CONFIG_FILE: &str = "wfs.yaml";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "WFS_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub measurement: MeasurementSettings,
}

/// Log output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Per-target levels, e.g. `VI: debug`
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            targets: BTreeMap::new(),
        }
    }
}

/// Where to find the vendor library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Tried before the platform search path
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Defaults applied by the measurement pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSettings {
    /// VISA resource to open; the first listed instrument when unset
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub mla_index: ViInt32,
    #[serde(default)]
    pub resolution_index: ViInt32,
    #[serde(default = "default_pixel_format")]
    pub pixel_format: ViInt32,
    #[serde(default)]
    pub pupil_center_x_mm: f64,
    #[serde(default)]
    pub pupil_center_y_mm: f64,
    #[serde(default = "default_pupil_diameter")]
    pub pupil_diameter_x_mm: f64,
    #[serde(default = "default_pupil_diameter")]
    pub pupil_diameter_y_mm: f64,
    /// Noise-cut floor applied to every image
    #[serde(default = "default_intensity_limit")]
    pub intensity_limit: ViInt32,
    #[serde(default = "default_true")]
    pub allow_auto_exposure: bool,
    #[serde(default = "default_true")]
    pub dynamic_noise_cut: bool,
    #[serde(default)]
    pub calculate_diameters: bool,
    #[serde(default = "default_true")]
    pub cancel_wavefront_tilt: bool,
    /// 0 measured, 1 reconstructed, 2 difference
    #[serde(default)]
    pub wavefront_type: ViInt32,
    #[serde(default)]
    pub limit_to_pupil: bool,
    /// 0 lets the driver pick, else 2..=10
    #[serde(default = "default_zernike_orders")]
    pub zernike_orders: ViInt32,
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            resource_name: None,
            mla_index: 0,
            resolution_index: 0,
            pixel_format: default_pixel_format(),
            pupil_center_x_mm: 0.0,
            pupil_center_y_mm: 0.0,
            pupil_diameter_x_mm: default_pupil_diameter(),
            pupil_diameter_y_mm: default_pupil_diameter(),
            intensity_limit: default_intensity_limit(),
            allow_auto_exposure: true,
            dynamic_noise_cut: true,
            calculate_diameters: false,
            cancel_wavefront_tilt: true,
            wavefront_type: 0,
            limit_to_pupil: false,
            zernike_orders: default_zernike_orders(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_level() -> String {
    "info".to_string()
}

fn default_pixel_format() -> ViInt32 {
    PIXEL_FORMAT_MONO8
}

fn default_pupil_diameter() -> f64 {
    5.4
}

fn default_intensity_limit() -> ViInt32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_zernike_orders() -> ViInt32 {
    4
}

// ============================================================================
// Loading and validation
// ============================================================================

impl Settings {
    /// Path of the YAML file to read.
    pub fn config_path() -> PathBuf {
        [CONFIG_ENV, LEGACY_CONFIG_ENV]
            .into_iter()
            .find_map(|key| env::var_os(key).filter(|v| !v.is_empty()))
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
    }

    /// Loads from [`Settings::config_path`] and the environment.
    pub fn load() -> WfsResult<Self> {
        Self::load_from(Self::config_path())
    }

    /// Loads from a specific YAML file and the environment, then validates.
    ///
    /// # Errors
    ///
    /// `Config` when a present file or variable does not parse,
    /// `ConfigValidation` when the merged settings are out of range.
    pub fn load_from<P: AsRef<Path>>(path: P) -> WfsResult<Self> {
        let settings: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Checks:
    /// - log levels are valid (trace, debug, info, warn, error)
    /// - pupil diameters are positive
    /// - the noise-cut floor is within the driver's range
    /// - the Zernike order is auto or 2..=10
    pub fn validate(&self) -> WfsResult<()> {
        check_level("log level", &self.logging.level)?;
        for (target, level) in &self.logging.targets {
            check_level(&format!("level of target '{target}'"), level)?;
        }

        let m = &self.measurement;
        if m.pupil_diameter_x_mm <= 0.0 || m.pupil_diameter_y_mm <= 0.0 {
            return Err(WfsError::ConfigValidation(format!(
                "Invalid pupil diameter {} x {} mm. Must be positive",
                m.pupil_diameter_x_mm, m.pupil_diameter_y_mm
            )));
        }

        if !(NOISE_LEVEL_MIN..=NOISE_LEVEL_MAX).contains(&m.intensity_limit) {
            return Err(WfsError::ConfigValidation(format!(
                "Invalid intensity_limit {}. Must be {NOISE_LEVEL_MIN}-{NOISE_LEVEL_MAX}",
                m.intensity_limit
            )));
        }

        if !is_valid_zernike_order(m.zernike_orders) {
            return Err(WfsError::ConfigValidation(format!(
                "Invalid zernike_orders {}. Must be 0 (auto) or 2-10",
                m.zernike_orders
            )));
        }

        Ok(())
    }
}

fn check_level(what: &str, level: &str) -> WfsResult<()> {
    if VALID_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(WfsError::ConfigValidation(format!(
            "Invalid {what} '{level}'. Must be one of: {}",
            VALID_LEVELS.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, LogFormat::Text);
        assert_eq!(settings.measurement.intensity_limit, 10);
        assert!(settings.measurement.allow_auto_exposure);
        assert_eq!(settings.measurement.pupil_diameter_x_mm, 5.4);
        assert_eq!(settings.measurement.zernike_orders, 4);
        assert!(settings.library.path.is_none());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log level 'verbose'"));

        let mut settings = Settings::default();
        settings.logging.targets.insert("VI".to_string(), "loud".to_string());
        assert!(matches!(settings.validate(), Err(WfsError::ConfigValidation(_))));

        settings.logging.targets.insert("VI".to_string(), "DEBUG".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_measurement_ranges() {
        let mut settings = Settings::default();
        settings.measurement.pupil_diameter_y_mm = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.measurement.intensity_limit = NOISE_LEVEL_MAX + 1;
        assert!(settings.validate().is_err());

        for (orders, valid) in [(0, true), (1, false), (2, true), (10, true), (11, false)] {
            let mut settings = Settings::default();
            settings.measurement.zernike_orders = orders;
            assert_eq!(settings.validate().is_ok(), valid, "orders={orders}");
        }
    }
}
