//! HTTP transport to the CRM's REST API.
//!
//! [`CrmTransport`] is the seam between the sync client and the wire. The
//! production implementation, [`RestCrmTransport`], speaks the Salesforce
//! style REST dialect: OAuth token endpoint, `userinfo` identity check,
//! `sobjects` create/update and `ContentVersion` documents.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use super::error::{CrmCallError, CrmError, CrmResult};
use super::session::Session;

/// Access token and instance URL returned by a token endpoint.
pub struct TokenGrant {
    pub access_token: SecretString,
    pub instance_url: String,
}

/// A file to attach to a CRM record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub record_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub description: String,
    pub bytes: Vec<u8>,
}

/// Raw calls against the CRM.
#[async_trait]
pub trait CrmTransport: Send + Sync {
    /// POSTs a form-encoded grant to the token endpoint.
    async fn request_token(
        &self,
        token_url: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenGrant, CrmCallError>;

    /// Verifies that a freshly issued token is usable.
    async fn identity(
        &self,
        instance_url: &str,
        access_token: &SecretString,
    ) -> Result<(), CrmCallError>;

    /// Creates a record and returns its id.
    async fn create_record(
        &self,
        session: &Session,
        object: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, CrmCallError>;

    /// Updates named fields of an existing record.
    async fn update_record(
        &self,
        session: &Session,
        object: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), CrmCallError>;

    /// Uploads a document linked to a record and returns the document id.
    async fn upload_document(
        &self,
        session: &Session,
        document: &DocumentUpload,
    ) -> Result<String, CrmCallError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "errorCode")]
    error_code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ContentVersionRequest<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "PathOnClient")]
    path_on_client: &'a str,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "VersionData")]
    version_data: String,
    #[serde(rename = "FirstPublishLocationId")]
    first_publish_location_id: &'a str,
}

/// `reqwest`-based CRM transport.
pub struct RestCrmTransport {
    client: Client,
    api_version: String,
}

impl RestCrmTransport {
    /// Creates a transport whose requests time out after `timeout`.
    pub fn new(api_version: impl Into<String>, timeout: Duration) -> CrmResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("referral-intake/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CrmError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_version: api_version.into(),
        })
    }

    fn sobject_url(&self, session: &Session, object: &str) -> String {
        format!(
            "{}/services/data/{}/sobjects/{}",
            session.instance_url(),
            self.api_version,
            object
        )
    }

    fn authorized(builder: RequestBuilder, token: &SecretString) -> RequestBuilder {
        builder.bearer_auth(token.expose_secret())
    }

    async fn send(builder: RequestBuilder) -> Result<Response, CrmCallError> {
        builder.send().await.map_err(map_reqwest_error)
    }

    /// Turns a non-success response into a call error, reading the CRM's
    /// error body when there is one.
    async fn error_from_response(response: Response) -> CrmCallError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if let Ok(errors) = serde_json::from_str::<Vec<ApiErrorBody>>(&body) {
            if let Some(first) = errors.into_iter().next() {
                return CrmCallError::http(status, Some(first.error_code), first.message);
            }
        }
        if let Ok(oauth) = serde_json::from_str::<OAuthErrorBody>(&body) {
            let message = oauth
                .error_description
                .unwrap_or_else(|| oauth.error.clone());
            return CrmCallError::http(status, Some(oauth.error), message);
        }
        CrmCallError::http(status, None, truncate(&body, 500))
    }
}

#[async_trait]
impl CrmTransport for RestCrmTransport {
    async fn request_token(
        &self,
        token_url: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenGrant, CrmCallError> {
        debug!(target: "referral_intake::crm", "Requesting CRM token from {}", token_url);
        let response = Self::send(self.client.post(token_url).form(form)).await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let token: TokenResponse = response.json().await.map_err(map_reqwest_error)?;
        Ok(TokenGrant {
            access_token: SecretString::from(token.access_token),
            instance_url: token.instance_url,
        })
    }

    async fn identity(
        &self,
        instance_url: &str,
        access_token: &SecretString,
    ) -> Result<(), CrmCallError> {
        let url = format!(
            "{}/services/oauth2/userinfo",
            instance_url.trim_end_matches('/')
        );
        let response = Self::send(Self::authorized(self.client.get(&url), access_token)).await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn create_record(
        &self,
        session: &Session,
        object: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, CrmCallError> {
        let url = format!("{}/", self.sobject_url(session, object));
        let request = Self::authorized(self.client.post(&url), session.access_token()).json(fields);
        let response = Self::send(request).await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let created: CreateResponse = response.json().await.map_err(map_reqwest_error)?;
        if created.success == Some(false) {
            return Err(CrmCallError::transport(format!(
                "create reported failure: {}",
                Value::Array(created.errors)
            )));
        }
        Ok(created.id)
    }

    async fn update_record(
        &self,
        session: &Session,
        object: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), CrmCallError> {
        let url = format!("{}/{}", self.sobject_url(session, object), record_id);
        let request =
            Self::authorized(self.client.patch(&url), session.access_token()).json(fields);
        let response = Self::send(request).await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn upload_document(
        &self,
        session: &Session,
        document: &DocumentUpload,
    ) -> Result<String, CrmCallError> {
        let url = format!("{}/", self.sobject_url(session, "ContentVersion"));
        let body = ContentVersionRequest {
            title: &document.file_name,
            path_on_client: &document.file_name,
            description: &document.description,
            version_data: general_purpose::STANDARD.encode(&document.bytes),
            first_publish_location_id: &document.record_id,
        };
        let request = Self::authorized(self.client.post(&url), session.access_token()).json(&body);
        let response = Self::send(request).await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let created: CreateResponse = response.json().await.map_err(map_reqwest_error)?;
        Ok(created.id)
    }
}

fn map_reqwest_error(error: reqwest::Error) -> CrmCallError {
    if error.is_timeout() {
        CrmCallError::timeout(error.to_string())
    } else {
        CrmCallError::transport(error.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...[truncated]", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...[truncated]");
    }

    #[test]
    fn test_api_error_body_parses() {
        let body = r#"[{"message":"Session expired or invalid","errorCode":"INVALID_SESSION_ID"}]"#;
        let parsed: Vec<ApiErrorBody> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed[0].error_code, "INVALID_SESSION_ID");
    }

    #[test]
    fn test_transport_builds() {
        let transport = RestCrmTransport::new("v59.0", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.api_version, "v59.0");
    }
}
