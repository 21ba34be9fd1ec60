use std::path::{Path, PathBuf};

use ::config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{LogFormat, LoggingConfig};

/// Префикс переменных окружения: `RDBSCAN_LOG_LEVEL`, `RDBSCAN_OUTPUT`, ...
pub const ENV_PREFIX: &str = "RDBSCAN";

/// Формат вывода записей в CLI.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Config file not found: {}", .0.display())]
    MissingFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_ansi: bool,
    pub output: OutputFormat,
    /// Дамп по умолчанию, если путь не передан явно
    pub dump_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: LogFormat::Compact,
            log_ansi: true,
            output: OutputFormat::Pretty,
            dump_path: None,
        }
    }
}

impl Settings {
    /// Значения по умолчанию, затем переменные окружения.
    pub fn load() -> Result<Self, SettingsError> {
        let cfg = Self::builder()?
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Значения по умолчанию, файл (формат по расширению), затем окружение.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SettingsError::MissingFile(path.to_path_buf()));
        }
        let cfg = Self::builder()?
            .add_source(File::from(path).required(true))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Настройки логирования для [`crate::logging::init_logging`].
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
            ansi: self.log_ansi,
            target: false,
        }
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let defaults = Self::default();
        Config::builder()
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", defaults.log_format.to_string())?
            .set_default("log_ansi", defaults.log_ansi)?
            .set_default("output", "pretty")
    }
}
