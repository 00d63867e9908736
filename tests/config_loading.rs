//! Settings loading from YAML files and the environment.

use std::env;
use std::io::Write;
use std::path::PathBuf;

use rust_wfs::config::{LogFormat, Settings, CONFIG_ENV, DEFAULT_CONFIG_FILE, LEGACY_CONFIG_ENV};
use rust_wfs::WfsError;
use serial_test::serial;
use tempfile::NamedTempFile;

fn yaml(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write yaml");
    file
}

fn clear_env() {
    for key in [
        CONFIG_ENV,
        LEGACY_CONFIG_ENV,
        "WFS_LOGGING__LEVEL",
        "WFS_MEASUREMENT__ZERNIKE_ORDERS",
    ] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_missing_file_gives_defaults() {
    clear_env();
    let settings = Settings::load_from("/nonexistent/wfs.yaml").unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
#[serial]
fn test_yaml_overrides_defaults() {
    clear_env();
    let file = yaml(
        r#"
logging:
  level: debug
  format: json
  targets:
    VI: trace
library:
  path: /opt/thorlabs/libWFS_64.so
measurement:
  resolution_index: 2
  pupil_diameter_x_mm: 4.0
  pupil_diameter_y_mm: 4.0
  allow_auto_exposure: false
  zernike_orders: 6
"#,
    );

    let settings = Settings::load_from(file.path()).unwrap();

    assert_eq!(settings.logging.level, "debug");
    assert_eq!(settings.logging.format, LogFormat::Json);
    assert_eq!(settings.logging.targets.get("VI").map(String::as_str), Some("trace"));
    assert_eq!(
        settings.library.path,
        Some(PathBuf::from("/opt/thorlabs/libWFS_64.so"))
    );
    assert_eq!(settings.measurement.resolution_index, 2);
    assert_eq!(settings.measurement.pupil_diameter_x_mm, 4.0);
    assert!(!settings.measurement.allow_auto_exposure);
    assert_eq!(settings.measurement.zernike_orders, 6);
    // untouched keys keep their defaults
    assert_eq!(settings.measurement.intensity_limit, 10);
    assert!(settings.measurement.cancel_wavefront_tilt);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let file = yaml("measurement:\n  zernike_orders: 6\n");
    env::set_var("WFS_MEASUREMENT__ZERNIKE_ORDERS", "8");
    env::set_var("WFS_LOGGING__LEVEL", "warn");

    let settings = Settings::load_from(file.path());
    clear_env();

    let settings = settings.unwrap();
    assert_eq!(settings.measurement.zernike_orders, 8);
    assert_eq!(settings.logging.level, "warn");
}

#[test]
#[serial]
fn test_config_path_from_environment() {
    clear_env();
    assert_eq!(Settings::config_path(), PathBuf::from(DEFAULT_CONFIG_FILE));

    env::set_var(LEGACY_CONFIG_ENV, "/etc/wfs/legacy.yaml");
    assert_eq!(Settings::config_path(), PathBuf::from("/etc/wfs/legacy.yaml"));

    env::set_var(CONFIG_ENV, "/etc/wfs/wfs.yaml");
    assert_eq!(Settings::config_path(), PathBuf::from("/etc/wfs/wfs.yaml"));
    clear_env();
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    clear_env();
    let file = yaml("logging:\n  level: chatty\n");
    assert!(matches!(
        Settings::load_from(file.path()),
        Err(WfsError::ConfigValidation(_))
    ));

    let file = yaml("measurement:\n  zernike_orders: 1\n");
    assert!(matches!(
        Settings::load_from(file.path()),
        Err(WfsError::ConfigValidation(_))
    ));

    let file = yaml("measurement:\n  intensity_limit: many\n");
    assert!(matches!(Settings::load_from(file.path()), Err(WfsError::Config(_))));
}
