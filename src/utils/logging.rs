//! Structured logging setup backed by `tracing-subscriber`.
//!
//! `RUST_LOG` takes precedence over the configured level so operators can raise
//! verbosity for a single module (e.g. `RUST_LOG=mc_remote::transport=trace`).

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber described by `config`.
///
/// Returns a [`Error::ConfigError`] if a subscriber is already installed or the
/// log file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            Error::ConfigError("log_file_path must be specified when log_to_file is true".into())
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::ConfigError(format!("Failed to open log file {path}: {e}")))?;
        let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
        if config.json_format {
            builder.json().try_init()
        } else {
            builder.try_init()
        }
    } else if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::ConfigError(format!("Failed to install logger: {e}")))?;

    tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logging_needs_a_path() {
        let config = LoggingConfig {
            log_to_file: true,
            log_file_path: None,
            ..LoggingConfig::default()
        };
        assert!(matches!(init(&config), Err(Error::ConfigError(_))));
    }

    #[test]
    fn second_init_is_rejected() {
        let config = LoggingConfig::default();
        init(&config).unwrap();
        assert!(matches!(init(&config), Err(Error::ConfigError(_))));
    }
}
