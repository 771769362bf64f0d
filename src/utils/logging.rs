//! Structured logging setup.
//!
//! The engine itself only emits `tracing` events. Applications that do not
//! install their own subscriber can call [`init_logging`] with the
//! [`LoggingConfig`] section of the engine configuration.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber. `RUST_LOG` overrides the configured level.
///
/// Calling it again once a subscriber is installed is a no-op.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if !config.log_to_console {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    match installed {
        Ok(()) => {
            tracing::info!(app = %config.app_name, "Logging initialized");
            Ok(())
        }
        Err(e) if tracing::dispatcher::has_been_set() => {
            tracing::debug!(error = %e, "Global subscriber already installed");
            Ok(())
        }
        Err(e) => Err(ProtocolError::ConfigError(format!(
            "Failed to install logger: {e}"
        ))),
    }
}
