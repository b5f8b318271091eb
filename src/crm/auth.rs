//! CRM authentication strategies.
//!
//! Every way of getting a CRM credential implements [`AuthStrategy`]. The
//! session manager tries the configured strategies in order:
//!
//! * [`JwtBearerStrategy`] - RS256-signed assertion exchanged for a token
//! * [`RefreshTokenStrategy`] - OAuth refresh-token grant
//! * [`StaticTokenStrategy`] - long-lived token, never refreshed (degraded)

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::error::CrmCallError;
use super::session::{Clock, Credential};
use super::transport::CrmTransport;
use crate::config::CrmConfig;
use crate::constants::ASSERTION_LIFETIME_SECS;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Why a single strategy failed to produce a credential.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("could not sign assertion: {0}")]
    Signing(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(CrmCallError),

    #[error("identity check failed: {0}")]
    IdentityCheck(CrmCallError),

    #[error("strategy is not configured: {0}")]
    NotConfigured(String),
}

/// One way of obtaining a CRM credential.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Produces a fresh credential.
    async fn authenticate(&self) -> Result<Credential, AuthError>;

    /// Strategy name for logging.
    fn name(&self) -> &'static str;
}

/// Claims of the signed bearer assertion.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionClaims {
    /// Connected-app client id
    pub iss: String,
    /// Service account user name
    pub sub: String,
    /// Authorization server
    pub aud: String,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// JWT bearer flow: sign a short-lived assertion with the configured private
/// key, exchange it for an access token, then verify the token with an
/// identity call.
pub struct JwtBearerStrategy {
    client_id: String,
    subject: String,
    audience: String,
    token_url: String,
    private_key: SecretString,
    transport: Arc<dyn CrmTransport>,
    clock: Arc<dyn Clock>,
}

impl JwtBearerStrategy {
    pub fn new(
        client_id: impl Into<String>,
        subject: impl Into<String>,
        audience: impl Into<String>,
        token_url: impl Into<String>,
        private_key: SecretString,
        transport: Arc<dyn CrmTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            subject: subject.into(),
            audience: audience.into(),
            token_url: token_url.into(),
            private_key,
            transport,
            clock,
        }
    }

    /// Signs the assertion presented at the token endpoint.
    pub fn build_assertion(&self) -> Result<String, AuthError> {
        let claims = AssertionClaims {
            iss: self.client_id.clone(),
            sub: self.subject.clone(),
            aud: self.audience.clone(),
            exp: self.clock.now().timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

#[async_trait]
impl AuthStrategy for JwtBearerStrategy {
    async fn authenticate(&self) -> Result<Credential, AuthError> {
        let assertion = self.build_assertion()?;
        let grant = self
            .transport
            .request_token(
                &self.token_url,
                &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
            )
            .await
            .map_err(AuthError::TokenExchange)?;

        self.transport
            .identity(&grant.instance_url, &grant.access_token)
            .await
            .map_err(AuthError::IdentityCheck)?;

        Ok(Credential {
            access_token: grant.access_token,
            instance_url: grant.instance_url,
            refreshable: true,
        })
    }

    fn name(&self) -> &'static str {
        "jwt-bearer"
    }
}

/// OAuth refresh-token grant.
pub struct RefreshTokenStrategy {
    client_id: String,
    client_secret: Option<SecretString>,
    refresh_token: SecretString,
    token_url: String,
    transport: Arc<dyn CrmTransport>,
}

impl RefreshTokenStrategy {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Option<SecretString>,
        refresh_token: SecretString,
        token_url: impl Into<String>,
        transport: Arc<dyn CrmTransport>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            refresh_token,
            token_url: token_url.into(),
            transport,
        }
    }
}

#[async_trait]
impl AuthStrategy for RefreshTokenStrategy {
    async fn authenticate(&self) -> Result<Credential, AuthError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", self.refresh_token.expose_secret()),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }

        let grant = self
            .transport
            .request_token(&self.token_url, &form)
            .await
            .map_err(AuthError::TokenExchange)?;

        self.transport
            .identity(&grant.instance_url, &grant.access_token)
            .await
            .map_err(AuthError::IdentityCheck)?;

        Ok(Credential {
            access_token: grant.access_token,
            instance_url: grant.instance_url,
            refreshable: true,
        })
    }

    fn name(&self) -> &'static str {
        "refresh-token"
    }
}

/// A long-lived token used as-is. No refresh, no identity round trip.
pub struct StaticTokenStrategy {
    access_token: SecretString,
    instance_url: String,
}

impl StaticTokenStrategy {
    pub fn new(access_token: SecretString, instance_url: impl Into<String>) -> Self {
        Self {
            access_token,
            instance_url: instance_url.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for StaticTokenStrategy {
    async fn authenticate(&self) -> Result<Credential, AuthError> {
        if self.access_token.expose_secret().trim().is_empty() || self.instance_url.is_empty() {
            return Err(AuthError::NotConfigured(
                "static token and instance URL are both required".to_string(),
            ));
        }
        Ok(Credential {
            access_token: SecretString::from(self.access_token.expose_secret().to_string()),
            instance_url: self.instance_url.clone(),
            refreshable: false,
        })
    }

    fn name(&self) -> &'static str {
        "static-token"
    }
}

/// Builds the strategy chain described by `config`, in priority order:
/// JWT bearer when a private key is present, refresh token when one is
/// present, static token last.
pub fn strategies_from_config(
    config: &CrmConfig,
    transport: Arc<dyn CrmTransport>,
    clock: Arc<dyn Clock>,
) -> Vec<Arc<dyn AuthStrategy>> {
    let mut strategies: Vec<Arc<dyn AuthStrategy>> = Vec::new();

    if let Some(private_key) = config.private_key() {
        strategies.push(Arc::new(JwtBearerStrategy::new(
            config.client_id.clone(),
            config.username.clone(),
            config.audience(),
            config.token_url(),
            private_key,
            Arc::clone(&transport),
            Arc::clone(&clock),
        )));
    }

    if let Some(refresh_token) = config.refresh_token() {
        strategies.push(Arc::new(RefreshTokenStrategy::new(
            config.client_id.clone(),
            config.client_secret(),
            refresh_token,
            config.token_url(),
            Arc::clone(&transport),
        )));
    }

    if let (Some(token), Some(instance_url)) = (config.static_token(), &config.static_instance_url)
    {
        strategies.push(Arc::new(StaticTokenStrategy::new(
            token,
            instance_url.clone(),
        )));
    }

    strategies
}
