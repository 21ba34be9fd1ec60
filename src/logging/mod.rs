pub mod config;
mod filters;
mod formatter;

use std::io;

pub use config::{LogFormat, LoggingConfig};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ошибки настройки логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },
    #[error("Unknown log format '{0}' (expected pretty, compact or json)")]
    UnknownFormat(String),
    #[error("Failed to install global subscriber: {0}")]
    Init(String),
}

/// Устанавливает глобальный subscriber; логи пишутся в stderr.
pub fn init_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let layer = formatter::build_formatter_from_config(&config, io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = %config.format,
        "Logging system initialized"
    );
    Ok(())
}
