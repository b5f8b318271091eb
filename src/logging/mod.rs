//! # Logging System
//!
//! `env_logger` backend driven by a [`LogConfig`], plus feature-scoped
//! logging macros. Every subsystem logs under its own target
//! (`referral_intake::crm`, `referral_intake::store`, ...) so levels can be
//! tuned per feature.

pub mod config;
pub mod features;

pub use config::LogConfig;
pub use features::LogFeature;

use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Prefix shared by every feature target.
pub const TARGET_PREFIX: &str = "referral_intake";

/// Global logging configuration instance
static LOGGING_CONFIG: OnceCell<Arc<RwLock<LogConfig>>> = OnceCell::new();

/// Process-wide logging setup
pub struct LoggingSystem;

impl LoggingSystem {
    /// Initialize the logging system with a custom configuration
    pub async fn init_with_config(config: LogConfig) -> Result<(), LoggingError> {
        config.validate()?;

        let mut builder = env_logger::Builder::new();
        builder
            .parse_filters(&config.filter_directives())
            .format_target(config.console.include_module);
        if !config.console.include_timestamp {
            builder.format_timestamp(None);
        }

        let config_arc = Arc::new(RwLock::new(config));
        LOGGING_CONFIG
            .set(config_arc)
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        builder
            .try_init()
            .map_err(|e| LoggingError::Config(format!("Failed to install logger: {}", e)))?;

        Ok(())
    }

    /// Get the global logging configuration
    pub async fn get_config() -> Option<LogConfig> {
        match LOGGING_CONFIG.get() {
            Some(config_arc) => Some(config_arc.read().await.clone()),
            None => None,
        }
    }
}

/// Logging system errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logging system already initialized")]
    AlreadyInitialized,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to parse logging config: {0}")]
    Parse(String),
    #[error("Failed to serialize logging config: {0}")]
    Serialize(String),
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),
    #[error("Invalid log level '{1}' for feature '{0}'")]
    InvalidFeatureLevel(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_once() {
        let mut config = LogConfig::default();
        config.general.default_level = "WARN".to_string();
        LoggingSystem::init_with_config(config).await.unwrap();

        let active = LoggingSystem::get_config().await.unwrap();
        assert_eq!(active.general.default_level, "WARN");
        assert!(matches!(
            LoggingSystem::init_with_config(LogConfig::default()).await,
            Err(LoggingError::AlreadyInitialized)
        ));
    }
}
