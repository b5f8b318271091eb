//! Configuration management for the logging system
//!
//! Handles loading logging configuration from TOML files and environment
//! variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{LogFeature, LoggingError};

const VALID_LEVELS: [&str; 6] = ["OFF", "TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// Main logging configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// General logging settings
    pub general: GeneralConfig,
    /// Console output configuration
    pub console: ConsoleConfig,
    /// Feature-specific log levels, keyed by feature name (`crm`, `store`, ...)
    pub features: HashMap<String, String>,
}

/// General logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default log level for all modules
    pub default_level: String,
}

/// Console output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub include_timestamp: bool,
    /// Include the log target (`referral_intake::crm`, ...)
    pub include_module: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            console: ConsoleConfig::default(),
            features: Self::default_features(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_level: "INFO".to_string(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            include_timestamp: true,
            include_module: true,
        }
    }
}

impl LogConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoggingError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(LoggingError::Io)?;

        let mut config: LogConfig =
            toml::from_str(&content).map_err(|e| LoggingError::Parse(e.to_string()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("REFERRAL_LOG_LEVEL") {
            self.general.default_level = level.to_uppercase();
        }

        for (key, value) in std::env::vars() {
            if let Some(feature) = key.strip_prefix("REFERRAL_LOG_FEATURE_") {
                self.features
                    .insert(feature.to_lowercase(), value.to_uppercase());
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), LoggingError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| LoggingError::Serialize(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(LoggingError::Io)?;
        }

        std::fs::write(path, content).map_err(LoggingError::Io)?;
        Ok(())
    }

    /// Get default feature-specific log levels
    fn default_features() -> HashMap<String, String> {
        [
            (LogFeature::Crm, "INFO"),
            (LogFeature::Store, "WARN"),
            (LogFeature::Intake, "INFO"),
            (LogFeature::Notify, "INFO"),
        ]
        .into_iter()
        .map(|(feature, level)| (feature.config_key().to_string(), level.to_string()))
        .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), LoggingError> {
        if !VALID_LEVELS.contains(&self.general.default_level.as_str()) {
            return Err(LoggingError::InvalidLevel(
                self.general.default_level.clone(),
            ));
        }

        for (feature, level) in &self.features {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(LoggingError::InvalidFeatureLevel(
                    feature.clone(),
                    level.clone(),
                ));
            }
        }

        Ok(())
    }

    /// Builds an `env_logger` filter string such as
    /// `info,referral_intake::crm=debug`.
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.general.default_level.to_lowercase()];
        let mut features: Vec<_> = self.features.iter().collect();
        features.sort();
        for (feature, level) in features {
            directives.push(format!(
                "{}::{}={}",
                super::TARGET_PREFIX,
                feature,
                level.to_lowercase()
            ));
        }
        directives.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = LogConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.default_level, "INFO");
        assert_eq!(config.features.get("crm").map(String::as_str), Some("INFO"));
    }

    #[test]
    fn test_invalid_feature_level() {
        let mut config = LogConfig::default();
        config
            .features
            .insert("crm".to_string(), "LOUD".to_string());
        assert!(matches!(
            config.validate(),
            Err(LoggingError::InvalidFeatureLevel(feature, _)) if feature == "crm"
        ));
    }

    #[test]
    fn test_filter_directives() {
        let mut config = LogConfig::default();
        config.features.clear();
        config
            .features
            .insert("store".to_string(), "DEBUG".to_string());
        assert_eq!(
            config.filter_directives(),
            "info,referral_intake::store=debug"
        );
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logging.toml");

        let mut config = LogConfig::default();
        config.general.default_level = "WARN".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = LogConfig::from_file(&path).unwrap();
        assert_eq!(loaded.general.default_level, "WARN");
        assert_eq!(loaded.features, config.features);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let loaded: LogConfig = toml::from_str("[general]\ndefault_level = \"DEBUG\"\n").unwrap();
        assert_eq!(loaded.general.default_level, "DEBUG");
        assert!(loaded.console.include_timestamp);
        assert!(loaded.features.contains_key("notify"));
    }
}
