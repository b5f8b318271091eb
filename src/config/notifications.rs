//! Notification provider and destination settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};
use crate::constants::{DEFAULT_ORGANIZATION_NAME, MAX_TIMEOUT_SECS};

/// A JSON-over-HTTP provider endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub endpoint: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Sender address (email) or sender id (SMS)
    pub sender: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

fn default_provider_timeout() -> u64 {
    10
}

impl fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key_masked())
            .field("sender", &self.sender)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl ProviderEndpoint {
    pub fn api_key_masked(&self) -> &'static str {
        match &self.api_key {
            Some(key) if !key.is_empty() => "***configured***",
            _ => "<not configured>",
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn validate(&self, field: &str) -> ConfigResult<()> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::validation(
                format!("{}.endpoint", field),
                "Endpoint is required",
            ));
        }
        if self.timeout_seconds == 0 || self.timeout_seconds > MAX_TIMEOUT_SECS {
            return Err(ConfigError::validation(
                format!("{}.timeout_seconds", field),
                format!("Timeout must be in 1..={} seconds", MAX_TIMEOUT_SECS),
            ));
        }
        Ok(())
    }
}

/// Contact of the house manager responsible for a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseManagerContact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Branding and routing for one destination key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationEntry {
    pub organization_name: String,
    #[serde(default)]
    pub house_manager: Option<HouseManagerContact>,
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// When false every provider is replaced by the log-only provider.
    pub enabled: bool,
    /// Primary email transport
    pub email: Option<ProviderEndpoint>,
    /// Secondary email transport, used after a sender-not-verified rejection
    pub email_fallback: Option<ProviderEndpoint>,
    pub sms: Option<ProviderEndpoint>,
    pub fallback_on_unverified_sender: bool,
    /// Organization name used for unknown destinations
    pub default_organization: String,
    pub destinations: HashMap<String, DestinationEntry>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            email: None,
            email_fallback: None,
            sms: None,
            fallback_on_unverified_sender: true,
            default_organization: DEFAULT_ORGANIZATION_NAME.to_string(),
            destinations: HashMap::new(),
        }
    }
}

impl NotificationConfig {
    /// Overlays provider API keys from the environment.
    pub fn apply_env_vars(&mut self) {
        if let Ok(enabled) = env::var("NOTIFICATIONS_ENABLED") {
            self.enabled = enabled.parse().unwrap_or(self.enabled);
        }
        if let Ok(key) = env::var("EMAIL_API_KEY") {
            if let Some(email) = self.email.as_mut() {
                email.api_key = Some(key);
            }
        }
        if let Ok(key) = env::var("EMAIL_FALLBACK_API_KEY") {
            if let Some(email) = self.email_fallback.as_mut() {
                email.api_key = Some(key);
            }
        }
        if let Ok(key) = env::var("SMS_API_KEY") {
            if let Some(sms) = self.sms.as_mut() {
                sms.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(email) = &self.email {
            email.validate("notifications.email")?;
        }
        if let Some(email) = &self.email_fallback {
            email.validate("notifications.email_fallback")?;
        }
        if let Some(sms) = &self.sms {
            sms.validate("notifications.sms")?;
        }
        if self.default_organization.trim().is_empty() {
            return Err(ConfigError::validation(
                "notifications.default_organization",
                "Default organization name is required",
            ));
        }
        Ok(())
    }
}
