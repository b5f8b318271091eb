//! In-memory test doubles for the CRM and notification seams.
//!
//! These are plain hand-written mocks: they record what they were asked to
//! do and replay scripted failures, so tests can assert call counts and
//! payloads without a network.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::crm::{
    AuthStrategy, Clock, CrmCallError, CrmSyncClient, CrmTransport, DocumentUpload,
    RefreshTokenStrategy, Session, SessionManager, TokenGrant,
};
use crate::notify::{
    EmailMessage, EmailProvider, ProviderError, ProviderErrorCode, SendReceipt, SmsMessage,
    SmsProvider,
};

pub const MOCK_INSTANCE_URL: &str = "https://mock.my.salesforce.com";
pub const MOCK_TOKEN_URL: &str = "https://login.mock.example/services/oauth2/token";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 2025-01-15T09:00:00Z
    pub fn fixed() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 15, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = lock(&self.now);
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// A record write seen by [`MockCrmTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub object: String,
    pub record_id: Option<String>,
    pub fields: Map<String, Value>,
    /// Access token the call was made with.
    pub token: String,
}

#[derive(Default)]
struct Script {
    token_failures: VecDeque<CrmCallError>,
    create_failures: VecDeque<CrmCallError>,
    update_failures: VecDeque<CrmCallError>,
    upload_failures: VecDeque<CrmCallError>,
    creates: Vec<RecordedWrite>,
    updates: Vec<RecordedWrite>,
    uploads: Vec<DocumentUpload>,
    token_delay: Duration,
    call_delay: Duration,
}

/// Scriptable in-memory CRM.
///
/// Every token request issues a new token (`token-1`, `token-2`, ...).
/// Created records get ids `a0R000000000001`, ... Failures queued with the
/// `fail_next_*` methods are returned by the next matching calls.
#[derive(Default)]
pub struct MockCrmTransport {
    script: Mutex<Script>,
    token_requests: AtomicUsize,
    identity_checks: AtomicUsize,
    record_ids: AtomicUsize,
    document_ids: AtomicUsize,
}

impl MockCrmTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_token(&self, error: CrmCallError) {
        lock(&self.script).token_failures.push_back(error);
    }

    pub fn fail_next_create(&self, error: CrmCallError) {
        lock(&self.script).create_failures.push_back(error);
    }

    pub fn fail_next_update(&self, error: CrmCallError) {
        lock(&self.script).update_failures.push_back(error);
    }

    pub fn fail_next_upload(&self, error: CrmCallError) {
        lock(&self.script).upload_failures.push_back(error);
    }

    /// Delay applied to every token request.
    pub fn set_token_delay(&self, delay: Duration) {
        lock(&self.script).token_delay = delay;
    }

    /// Delay applied to every record and document call.
    pub fn set_call_delay(&self, delay: Duration) {
        lock(&self.script).call_delay = delay;
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn identity_checks(&self) -> usize {
        self.identity_checks.load(Ordering::SeqCst)
    }

    /// Successful and failed create attempts that reached the transport.
    pub fn creates(&self) -> Vec<RecordedWrite> {
        lock(&self.script).creates.clone()
    }

    pub fn updates(&self) -> Vec<RecordedWrite> {
        lock(&self.script).updates.clone()
    }

    pub fn uploads(&self) -> Vec<DocumentUpload> {
        lock(&self.script).uploads.clone()
    }

    /// Calls against records and documents, excluding authentication.
    pub fn record_calls(&self) -> usize {
        let script = lock(&self.script);
        script.creates.len() + script.updates.len() + script.uploads.len()
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl CrmTransport for MockCrmTransport {
    async fn request_token(
        &self,
        _token_url: &str,
        _form: &[(&str, &str)],
    ) -> Result<TokenGrant, CrmCallError> {
        let n = self.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let (delay, failure) = {
            let mut script = lock(&self.script);
            (script.token_delay, script.token_failures.pop_front())
        };
        Self::pause(delay).await;
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(TokenGrant {
            access_token: SecretString::from(format!("token-{}", n)),
            instance_url: MOCK_INSTANCE_URL.to_string(),
        })
    }

    async fn identity(
        &self,
        _instance_url: &str,
        _access_token: &SecretString,
    ) -> Result<(), CrmCallError> {
        self.identity_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_record(
        &self,
        session: &Session,
        object: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, CrmCallError> {
        let (delay, failure) = {
            let mut script = lock(&self.script);
            script.creates.push(RecordedWrite {
                object: object.to_string(),
                record_id: None,
                fields: fields.clone(),
                token: session.access_token().expose_secret().to_string(),
            });
            (script.call_delay, script.create_failures.pop_front())
        };
        Self::pause(delay).await;
        if let Some(error) = failure {
            return Err(error);
        }
        let n = self.record_ids.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("a0R{:012}", n))
    }

    async fn update_record(
        &self,
        session: &Session,
        object: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), CrmCallError> {
        let (delay, failure) = {
            let mut script = lock(&self.script);
            script.updates.push(RecordedWrite {
                object: object.to_string(),
                record_id: Some(record_id.to_string()),
                fields: fields.clone(),
                token: session.access_token().expose_secret().to_string(),
            });
            (script.call_delay, script.update_failures.pop_front())
        };
        Self::pause(delay).await;
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn upload_document(
        &self,
        _session: &Session,
        document: &DocumentUpload,
    ) -> Result<String, CrmCallError> {
        let (delay, failure) = {
            let mut script = lock(&self.script);
            script.uploads.push(document.clone());
            (script.call_delay, script.upload_failures.pop_front())
        };
        Self::pause(delay).await;
        if let Some(error) = failure {
            return Err(error);
        }
        let n = self.document_ids.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("068{:012}", n))
    }
}

/// A refresh-token strategy wired to `transport`.
pub fn mock_strategy(transport: Arc<MockCrmTransport>) -> Arc<dyn AuthStrategy> {
    Arc::new(RefreshTokenStrategy::new(
        "mock-client",
        None,
        SecretString::from("mock-refresh-token".to_string()),
        MOCK_TOKEN_URL,
        transport,
    ))
}

/// A sync client talking to `transport` with a refreshable session.
pub fn mock_sync_client(
    transport: Arc<MockCrmTransport>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
) -> CrmSyncClient {
    let sessions = SessionManager::new(vec![mock_strategy(Arc::clone(&transport))], clock);
    CrmSyncClient::new(Arc::new(sessions), transport, "Referral__c", call_timeout)
}

/// Records every email and accepts it.
#[derive(Default)]
pub struct RecordingEmailProvider {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl EmailProvider for RecordingEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, ProviderError> {
        let mut sent = lock(&self.sent);
        sent.push(message.clone());
        Ok(SendReceipt {
            id: format!("email-{}", sent.len()),
        })
    }

    fn name(&self) -> &str {
        "recording-email"
    }
}

/// Records every text message and accepts it.
#[derive(Default)]
pub struct RecordingSmsProvider {
    sent: Mutex<Vec<SmsMessage>>,
}

impl RecordingSmsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl SmsProvider for RecordingSmsProvider {
    async fn send(&self, message: &SmsMessage) -> Result<SendReceipt, ProviderError> {
        let mut sent = lock(&self.sent);
        sent.push(message.clone());
        Ok(SendReceipt {
            id: format!("sms-{}", sent.len()),
        })
    }

    fn name(&self) -> &str {
        "recording-sms"
    }
}

/// Rejects every message with the same error code.
pub struct FailingProvider {
    code: ProviderErrorCode,
    attempts: AtomicUsize,
}

impl FailingProvider {
    pub fn new(code: ProviderErrorCode) -> Self {
        Self {
            code,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail(&self) -> ProviderError {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        ProviderError::new(self.code, "provider rejected the message")
    }
}

#[async_trait]
impl EmailProvider for FailingProvider {
    async fn send(&self, _message: &EmailMessage) -> Result<SendReceipt, ProviderError> {
        Err(self.fail())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[async_trait]
impl SmsProvider for FailingProvider {
    async fn send(&self, _message: &SmsMessage) -> Result<SendReceipt, ProviderError> {
        Err(self.fail())
    }

    fn name(&self) -> &str {
        "failing"
    }
}
