//! Email and SMS provider seams and the shipped implementations.
//!
//! * [`HttpEmailProvider`] / [`HttpSmsProvider`] - JSON over HTTP (`reqwest`)
//! * [`LogOnlyProvider`] - writes messages to the log, for development

use async_trait::async_trait;
use log::info;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{NotificationError, ProviderError, ProviderErrorCode};
use crate::config::ProviderEndpoint;

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// An outgoing text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub id: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, ProviderError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send(&self, message: &SmsMessage) -> Result<SendReceipt, ProviderError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SmsRequest<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AcceptedResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Shared JSON-over-HTTP plumbing.
struct HttpEndpoint {
    client: Client,
    endpoint: ProviderEndpoint,
}

impl HttpEndpoint {
    fn new(endpoint: ProviderEndpoint) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(endpoint.timeout())
            .build()
            .map_err(|e| {
                NotificationError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client, endpoint })
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<SendReceipt, ProviderError> {
        let mut request = self.client.post(&self.endpoint.endpoint).json(body);
        if let Some(key) = self.endpoint.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let accepted: AcceptedResponse = response
            .json()
            .await
            .unwrap_or(AcceptedResponse { id: None });
        Ok(SendReceipt {
            id: accepted.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        })
    }
}

async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<ErrorResponse>(&body).ok();

    let code = parsed
        .as_ref()
        .and_then(|p| p.code.as_deref())
        .and_then(ProviderErrorCode::from_code)
        .unwrap_or(match status {
            401 | 403 => ProviderErrorCode::Unauthorized,
            429 => ProviderErrorCode::RateLimited,
            _ => ProviderErrorCode::Rejected,
        });
    let message = parsed
        .and_then(|p| p.message)
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));
    ProviderError::new(code, message)
}

/// Email over a JSON HTTP API.
pub struct HttpEmailProvider {
    http: HttpEndpoint,
}

impl HttpEmailProvider {
    pub fn new(endpoint: ProviderEndpoint) -> Result<Self, NotificationError> {
        Ok(Self {
            http: HttpEndpoint::new(endpoint)?,
        })
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, ProviderError> {
        let body = EmailRequest {
            from: &self.http.endpoint.sender,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
        };
        self.http.post(&body).await
    }

    fn name(&self) -> &str {
        &self.http.endpoint.endpoint
    }
}

/// SMS over a JSON HTTP API.
pub struct HttpSmsProvider {
    http: HttpEndpoint,
}

impl HttpSmsProvider {
    pub fn new(endpoint: ProviderEndpoint) -> Result<Self, NotificationError> {
        Ok(Self {
            http: HttpEndpoint::new(endpoint)?,
        })
    }
}

#[async_trait]
impl SmsProvider for HttpSmsProvider {
    async fn send(&self, message: &SmsMessage) -> Result<SendReceipt, ProviderError> {
        let body = SmsRequest {
            from: &self.http.endpoint.sender,
            to: &message.to,
            text: &message.body,
        };
        self.http.post(&body).await
    }

    fn name(&self) -> &str {
        &self.http.endpoint.endpoint
    }
}

/// Logs every message instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyProvider;

#[async_trait]
impl EmailProvider for LogOnlyProvider {
    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, ProviderError> {
        info!(
            target: "referral_intake::notify",
            "[log-only email] to={} subject={:?}\n{}",
            message.to,
            message.subject,
            message.body
        );
        Ok(SendReceipt {
            id: format!("log-{}", Uuid::new_v4()),
        })
    }

    fn name(&self) -> &str {
        "log-only"
    }
}

#[async_trait]
impl SmsProvider for LogOnlyProvider {
    async fn send(&self, message: &SmsMessage) -> Result<SendReceipt, ProviderError> {
        info!(
            target: "referral_intake::notify",
            "[log-only sms] to={} {}",
            message.to,
            message.body
        );
        Ok(SendReceipt {
            id: format!("log-{}", Uuid::new_v4()),
        })
    }

    fn name(&self) -> &str {
        "log-only"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_only_provider_accepts_everything() {
        let provider = LogOnlyProvider;
        let receipt = EmailProvider::send(
            &provider,
            &EmailMessage {
                to: "parent@example.org".to_string(),
                subject: "Consent".to_string(),
                body: "Please sign".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(receipt.id.starts_with("log-"));
    }

    #[test]
    fn test_http_provider_builds() {
        let provider = HttpEmailProvider::new(ProviderEndpoint {
            endpoint: "https://mail.example.org/v1/send".to_string(),
            api_key: Some("key".to_string()),
            sender: "intake@example.org".to_string(),
            timeout_seconds: 5,
        })
        .unwrap();
        assert_eq!(provider.name(), "https://mail.example.org/v1/send");
    }
}
