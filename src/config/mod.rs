//! # Configuration
//!
//! [`IntakeConfig`] is read from a JSON file and overlaid with environment
//! variables. Secrets (signing key, tokens, provider API keys) are normally
//! supplied only through the environment.

pub mod crm;
pub mod error;
pub mod notifications;

pub use crm::CrmConfig;
pub use error::{ConfigError, ConfigResult};
pub use notifications::{
    DestinationEntry, HouseManagerContact, NotificationConfig, ProviderEndpoint,
};

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::constants::{
    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, DEFAULT_PUBLIC_BASE_URL, DEFAULT_STORAGE_PATH,
};
use crate::logging::LogConfig;

/// Top-level configuration of the intake service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Directory of the local sled database
    pub storage_path: PathBuf,
    /// Base URL the consent and student-data links are built on
    pub public_base_url: String,
    pub crm: CrmConfig,
    pub notifications: NotificationConfig,
    pub logging: LogConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            crm: CrmConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl IntakeConfig {
    /// Overlays every section from environment variables.
    pub fn apply_env_vars(&mut self) {
        if let Ok(path) = env::var("REFERRAL_STORAGE_PATH") {
            self.storage_path = PathBuf::from(path);
        }
        if let Ok(url) = env::var("REFERRAL_PUBLIC_BASE_URL") {
            self.public_base_url = url;
        }
        self.crm.apply_env_vars();
        self.notifications.apply_env_vars();
        self.logging.apply_env_overrides();
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(ConfigError::validation(
                "storage_path",
                "Storage path is required",
            ));
        }
        let base = self.public_base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::validation(
                "public_base_url",
                format!("Expected an http(s) URL, got '{}'", base),
            ));
        }
        self.crm.validate()?;
        self.notifications.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Load the intake configuration.
///
/// The file is taken from `path`, else from the `REFERRAL_CONFIG`
/// environment variable, else from `config/referral_config.json`. A missing
/// file yields the defaults; an unreadable or invalid one is an error.
/// Environment overrides are applied in both cases.
pub fn load_intake_config(path: Option<&str>) -> ConfigResult<IntakeConfig> {
    let config_path = path
        .map(|p| p.to_string())
        .or_else(|| env::var(CONFIG_PATH_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = match std::fs::read_to_string(&config_path) {
        Ok(config_str) => serde_json::from_str::<IntakeConfig>(&config_str).map_err(|e| {
            log::error!("Failed to parse intake configuration {}: {}", config_path, e);
            ConfigError::Json(e)
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!(
                "No configuration at {}, using defaults",
                config_path
            );
            IntakeConfig::default()
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    config.apply_env_vars();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.json");
        let config = load_intake_config(path.to_str()).unwrap();
        assert_eq!(config.crm.case_object, "Referral__c");
        assert!(config.notifications.fallback_on_unverified_sender);
    }

    #[test]
    fn test_partial_file_is_merged_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("referral_config.json");
        std::fs::write(
            &path,
            r#"{
                "public_base_url": "https://intake.example.org",
                "crm": { "client_id": "3MVG9", "timeout_seconds": 15 },
                "notifications": {
                    "destinations": {
                        "north": { "organization_name": "North House" }
                    }
                }
            }"#,
        )
        .unwrap();

        let config = load_intake_config(path.to_str()).unwrap();
        assert_eq!(config.public_base_url, "https://intake.example.org");
        assert_eq!(config.crm.client_id, "3MVG9");
        assert_eq!(config.crm.timeout_seconds, 15);
        assert_eq!(config.crm.api_version, "v59.0");
        assert_eq!(
            config.notifications.destinations["north"].organization_name,
            "North House"
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_intake_config(path.to_str()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_base_url() {
        let config = IntakeConfig {
            public_base_url: "intake.example.org".to_string(),
            ..IntakeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { field, .. }) if field == "public_base_url"
        ));
    }
}
