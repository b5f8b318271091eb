//! CRM connection settings.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};
use crate::constants::{
    DEFAULT_CRM_API_VERSION, DEFAULT_CRM_CASE_OBJECT, DEFAULT_CRM_LOGIN_URL,
    DEFAULT_CRM_TIMEOUT_SECS, MAX_TIMEOUT_SECS,
};

/// CRM connection and credential settings.
///
/// Credentials are never serialized back out and never appear in `Debug`
/// output. They are usually supplied through environment variables (see
/// [`CrmConfig::apply_env_vars`]).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    /// Authorization server, e.g. `https://login.salesforce.com`
    pub login_url: String,
    /// Overrides the `aud` claim of the JWT assertion. Defaults to `login_url`.
    pub audience: Option<String>,
    /// Connected-app client id
    pub client_id: String,
    /// Service-account user the JWT assertion is issued for
    pub username: String,
    /// PEM file holding the RS256 signing key
    pub private_key_path: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// Long-lived token used without refresh. Degraded fallback only.
    #[serde(skip_serializing)]
    pub static_token: Option<String>,
    /// Instance URL that goes with `static_token`
    pub static_instance_url: Option<String>,
    pub api_version: String,
    /// API name of the case object
    pub case_object: String,
    /// Per-call deadline in seconds
    pub timeout_seconds: u64,
    /// Soft TTL of a cached session in minutes
    pub session_ttl_minutes: u32,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_CRM_LOGIN_URL.to_string(),
            audience: None,
            client_id: String::new(),
            username: String::new(),
            private_key_path: None,
            private_key: None,
            client_secret: None,
            refresh_token: None,
            static_token: None,
            static_instance_url: None,
            api_version: DEFAULT_CRM_API_VERSION.to_string(),
            case_object: DEFAULT_CRM_CASE_OBJECT.to_string(),
            timeout_seconds: DEFAULT_CRM_TIMEOUT_SECS,
            session_ttl_minutes: 50,
        }
    }
}

impl fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrmConfig")
            .field("login_url", &self.login_url)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("private_key", &mask(&self.private_key))
            .field("private_key_path", &self.private_key_path)
            .field("client_secret", &mask(&self.client_secret))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("static_token", &mask(&self.static_token))
            .field("static_instance_url", &self.static_instance_url)
            .field("api_version", &self.api_version)
            .field("case_object", &self.case_object)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("session_ttl_minutes", &self.session_ttl_minutes)
            .finish()
    }
}

fn mask(value: &Option<String>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "***configured***",
        _ => "<not configured>",
    }
}

fn non_empty_secret(value: &Option<String>) -> Option<SecretString> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::from(v.to_string()))
}

impl CrmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// `aud` claim of the bearer assertion.
    pub fn audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| self.login_url.trim_end_matches('/').to_string())
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}/services/oauth2/token",
            self.login_url.trim_end_matches('/')
        )
    }

    /// Signing key, inline or read from `private_key_path`.
    pub fn private_key(&self) -> Option<SecretString> {
        if let Some(key) = non_empty_secret(&self.private_key) {
            return Some(key);
        }
        let path = self.private_key_path.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(pem) if !pem.trim().is_empty() => Some(SecretString::from(pem)),
            Ok(_) => None,
            Err(e) => {
                log::warn!(
                    target: "referral_intake::crm",
                    "Could not read CRM private key from {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    pub fn client_secret(&self) -> Option<SecretString> {
        non_empty_secret(&self.client_secret)
    }

    pub fn refresh_token(&self) -> Option<SecretString> {
        non_empty_secret(&self.refresh_token)
    }

    pub fn static_token(&self) -> Option<SecretString> {
        non_empty_secret(&self.static_token)
    }

    /// Whether any credential path is configured at all.
    pub fn has_credentials(&self) -> bool {
        let jwt = !self.client_id.is_empty()
            && (non_empty_secret(&self.private_key).is_some() || self.private_key_path.is_some());
        let refresh = non_empty_secret(&self.refresh_token).is_some();
        let fixed = non_empty_secret(&self.static_token).is_some()
            && self.static_instance_url.is_some();
        jwt || refresh || fixed
    }

    /// Overlays settings and secrets from `CRM_*` environment variables.
    pub fn apply_env_vars(&mut self) {
        if let Ok(v) = env::var("CRM_LOGIN_URL") {
            self.login_url = v;
        }
        if let Ok(v) = env::var("CRM_CLIENT_ID") {
            self.client_id = v;
        }
        if let Ok(v) = env::var("CRM_USERNAME") {
            self.username = v;
        }
        if let Ok(v) = env::var("CRM_PRIVATE_KEY") {
            // Single-line env values carry escaped newlines.
            self.private_key = Some(v.replace("\\n", "\n"));
        }
        if let Ok(v) = env::var("CRM_PRIVATE_KEY_PATH") {
            self.private_key_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = env::var("CRM_CLIENT_SECRET") {
            self.client_secret = Some(v);
        }
        if let Ok(v) = env::var("CRM_REFRESH_TOKEN") {
            self.refresh_token = Some(v);
        }
        if let Ok(v) = env::var("CRM_STATIC_TOKEN") {
            self.static_token = Some(v);
        }
        if let Ok(v) = env::var("CRM_INSTANCE_URL") {
            self.static_instance_url = Some(v);
        }
        if let Ok(v) = env::var("CRM_TIMEOUT_SECONDS") {
            self.timeout_seconds = v.parse().unwrap_or(DEFAULT_CRM_TIMEOUT_SECS);
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.login_url.is_empty() {
            return Err(ConfigError::validation("crm.login_url", "Login URL is required"));
        }
        if self.api_version.is_empty() {
            return Err(ConfigError::validation(
                "crm.api_version",
                "API version is required",
            ));
        }
        if self.case_object.is_empty() {
            return Err(ConfigError::validation(
                "crm.case_object",
                "Case object name is required",
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "crm.timeout_seconds",
                "Timeout must be greater than 0",
            ));
        }
        if self.timeout_seconds > MAX_TIMEOUT_SECS {
            return Err(ConfigError::validation(
                "crm.timeout_seconds",
                format!("Timeout should not exceed {} seconds", MAX_TIMEOUT_SECS),
            ));
        }
        if self.session_ttl_minutes == 0 || self.session_ttl_minutes >= 60 {
            return Err(ConfigError::validation(
                "crm.session_ttl_minutes",
                "Session TTL must be between 1 and 59 minutes",
            ));
        }
        if non_empty_secret(&self.private_key).is_some() || self.private_key_path.is_some() {
            if self.client_id.is_empty() || self.username.is_empty() {
                return Err(ConfigError::validation(
                    "crm.client_id",
                    "JWT bearer auth needs both client_id and username",
                ));
            }
        }
        if non_empty_secret(&self.static_token).is_some() && self.static_instance_url.is_none() {
            return Err(ConfigError::validation(
                "crm.static_instance_url",
                "A static token needs its instance URL",
            ));
        }
        Ok(())
    }
}
