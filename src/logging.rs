//! Process-wide log output.
//!
//! Handle operations log on the `WFS` target and marshalling on `VI`.
//! `RUST_LOG`, when set, takes precedence over the configured levels.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{WfsError, WfsResult};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Filter directives for `config`: the base level, then one per target.
pub fn directives(config: &LoggingConfig) -> String {
    std::iter::once(config.level.to_ascii_lowercase())
        .chain(
            config
                .targets
                .iter()
                .map(|(target, level)| format!("{target}={}", level.to_ascii_lowercase())),
        )
        .collect::<Vec<_>>()
        .join(",")
}

fn filter(config: &LoggingConfig) -> WfsResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(directives(config)).map_err(|e| WfsError::Logging(e.to_string()))
}

/// Installs the global subscriber. Later calls do nothing.
pub fn init(config: &LoggingConfig) -> WfsResult<()> {
    INSTALLED
        .get_or_try_init(|| {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter(config)?)
                .with_target(true);
            match config.format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Text => builder.try_init(),
            }
            .map_err(|e| WfsError::Logging(e.to_string()))
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_list_targets_after_level() {
        let mut config = LoggingConfig::default();
        assert_eq!(directives(&config), "info");
        config.level = "WARN".to_string();
        config.targets.insert("VI".to_string(), "debug".to_string());
        config.targets.insert("WFS".to_string(), "trace".to_string());
        assert_eq!(directives(&config), "warn,VI=debug,WFS=trace");
        assert!(EnvFilter::try_new(directives(&config)).is_ok());
    }
}
