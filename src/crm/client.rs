//! Typed CRM operations with the session retry policy.

use futures::Future;
use std::sync::Arc;
use std::time::Duration;

use super::error::{CrmCallError, CrmOperation, CrmResult, FailureCause};
use super::mapping::{ConsentUpdate, NewCase, StudentDataUpdate};
use super::session::{Session, SessionManager};
use super::transport::{CrmTransport, DocumentUpload};
use crate::{log_crm_info, log_crm_warn};

/// CRM sync client.
///
/// Every operation obtains a session, runs the call under a deadline and,
/// when the CRM says the session is no longer valid, discards it and retries
/// exactly once with a fresh one. Nothing else is retried.
pub struct CrmSyncClient {
    sessions: Arc<SessionManager>,
    transport: Arc<dyn CrmTransport>,
    case_object: String,
    call_timeout: Duration,
}

impl CrmSyncClient {
    pub fn new(
        sessions: Arc<SessionManager>,
        transport: Arc<dyn CrmTransport>,
        case_object: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            transport,
            case_object: case_object.into(),
            call_timeout,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Creates the CRM case and returns its record id. Not idempotent.
    pub async fn create_case(&self, case: &NewCase) -> CrmResult<String> {
        let fields = case.to_fields();
        let record_id = self
            .execute(CrmOperation::CreateCase, |session| {
                let transport = Arc::clone(&self.transport);
                let object = self.case_object.as_str();
                let fields = &fields;
                async move { transport.create_record(&session, object, fields).await }
            })
            .await?;
        log_crm_info!(
            "Created CRM case {} for {}",
            record_id,
            case.referral_number
        );
        Ok(record_id)
    }

    pub async fn update_consent(&self, record_id: &str, update: &ConsentUpdate) -> CrmResult<()> {
        let fields = update.to_fields();
        self.update(CrmOperation::UpdateConsent, record_id, &fields)
            .await
    }

    pub async fn update_student_data(
        &self,
        record_id: &str,
        update: &StudentDataUpdate,
    ) -> CrmResult<()> {
        let fields = update.to_fields();
        self.update(CrmOperation::UpdateStudentData, record_id, &fields)
            .await
    }

    /// Attaches a file to the record and returns the document id.
    pub async fn upload_attachment(
        &self,
        record_id: &str,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
        description: &str,
    ) -> CrmResult<String> {
        let document = DocumentUpload {
            record_id: record_id.to_string(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            description: description.to_string(),
            bytes,
        };
        self.execute(CrmOperation::UploadAttachment, |session| {
            let transport = Arc::clone(&self.transport);
            let document = &document;
            async move { transport.upload_document(&session, document).await }
        })
        .await
    }

    async fn update(
        &self,
        operation: CrmOperation,
        record_id: &str,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> CrmResult<()> {
        self.execute(operation, |session| {
            let transport = Arc::clone(&self.transport);
            let object = self.case_object.as_str();
            async move {
                transport
                    .update_record(&session, object, record_id, fields)
                    .await
            }
        })
        .await
    }

    /// Runs `call` with the session retry policy.
    async fn execute<T, F, Fut>(&self, operation: CrmOperation, call: F) -> CrmResult<T>
    where
        F: Fn(Session) -> Fut,
        Fut: Future<Output = Result<T, CrmCallError>>,
    {
        let session = self.sessions.obtain().await?;
        match self.with_deadline(call(session.clone())).await {
            Ok(value) => Ok(value),
            Err(e) if e.cause() == FailureCause::SessionExpired => {
                log_crm_warn!(
                    "CRM rejected session {} during {}; re-authenticating once",
                    session.fingerprint(),
                    operation
                );
                self.sessions.invalidate(&session);
                let fresh = self.sessions.obtain().await?;
                self.with_deadline(call(fresh))
                    .await
                    .map_err(|e| e.into_operation_error(operation))
            }
            Err(e) => {
                log_crm_warn!("CRM {} failed: {}", operation, e);
                Err(e.into_operation_error(operation))
            }
        }
    }

    async fn with_deadline<T, Fut>(&self, call: Fut) -> Result<T, CrmCallError>
    where
        Fut: Future<Output = Result<T, CrmCallError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CrmCallError::timeout(format!(
                "no response within {:?}",
                self.call_timeout
            ))),
        }
    }
}
