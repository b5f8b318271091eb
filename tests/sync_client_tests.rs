//! CRM sync client retry policy and failure classification.

use chrono::{TimeZone, Utc};
use referral_intake::crm::mapping::FIELD_STATUS;
use referral_intake::crm::{
    Clock, ConsentUpdate, CrmCallError, CrmError, CrmOperation, CrmSyncClient, FailureCause,
};
use referral_intake::testing::{mock_sync_client, ManualClock, MockCrmTransport};
use referral_intake::referral::CounselorContact;
use referral_intake::ReferralStatus;
use std::sync::Arc;
use std::time::Duration;

const RECORD_ID: &str = "a0R000000000042";

fn client(transport: &Arc<MockCrmTransport>, call_timeout: Duration) -> CrmSyncClient {
    let clock = Arc::new(ManualClock::fixed());
    mock_sync_client(Arc::clone(transport), clock as Arc<dyn Clock>, call_timeout)
}

fn consent_update() -> ConsentUpdate {
    ConsentUpdate {
        status: ReferralStatus::ConsentSigned,
        parent_names: vec!["Miriam Cohen".to_string(), "David Cohen".to_string()],
        consented_at: Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap(),
    }
}

fn expired() -> CrmCallError {
    CrmCallError::http(
        401,
        Some("INVALID_SESSION_ID".into()),
        "Session expired or invalid",
    )
}

#[tokio::test]
async fn test_expired_session_is_retried_once_with_fresh_token() {
    let transport = Arc::new(MockCrmTransport::new());
    let crm = client(&transport, Duration::from_secs(5));
    transport.fail_next_update(expired());

    crm.update_consent(RECORD_ID, &consent_update()).await.unwrap();

    let updates = transport.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].token, "token-1");
    assert_eq!(updates[1].token, "token-2");
    assert_eq!(updates[1].record_id.as_deref(), Some(RECORD_ID));
    assert_eq!(updates[1].fields[FIELD_STATUS], "consent_signed");
    assert_eq!(transport.token_requests(), 2);

    // The fresh session is cached for the next call.
    crm.update_consent(RECORD_ID, &consent_update()).await.unwrap();
    assert_eq!(transport.updates()[2].token, "token-2");
    assert_eq!(transport.token_requests(), 2);
}

#[tokio::test]
async fn test_second_expiry_is_not_retried_again() {
    let transport = Arc::new(MockCrmTransport::new());
    let crm = client(&transport, Duration::from_secs(5));
    transport.fail_next_update(expired());
    transport.fail_next_update(expired());

    let err = crm
        .update_consent(RECORD_ID, &consent_update())
        .await
        .unwrap_err();
    assert_eq!(err.cause(), Some(FailureCause::SessionExpired));
    assert!(matches!(
        err,
        CrmError::OperationFailed {
            operation: CrmOperation::UpdateConsent,
            ..
        }
    ));
    assert_eq!(transport.updates().len(), 2);
}

#[tokio::test]
async fn test_rate_limit_is_not_retried() {
    let transport = Arc::new(MockCrmTransport::new());
    let crm = client(&transport, Duration::from_secs(5));
    transport.fail_next_update(CrmCallError::http(
        429,
        Some("REQUEST_LIMIT_EXCEEDED".into()),
        "TotalRequests Limit exceeded",
    ));

    let err = crm
        .update_consent(RECORD_ID, &consent_update())
        .await
        .unwrap_err();
    assert_eq!(err.cause(), Some(FailureCause::RateLimited));
    assert_eq!(transport.updates().len(), 1);
    assert_eq!(transport.token_requests(), 1);
}

#[tokio::test]
async fn test_schema_error_is_classified() {
    let transport = Arc::new(MockCrmTransport::new());
    let crm = client(&transport, Duration::from_secs(5));
    transport.fail_next_create(CrmCallError::http(
        400,
        Some("REQUIRED_FIELD_MISSING".into()),
        "Required fields are missing: [Counselor_Email__c]",
    ));

    let case = referral_intake::crm::NewCase {
        referral_number: "REF-202501-0001".to_string(),
        status: ReferralStatus::PendingConsent,
        consent_method: referral_intake::ConsentMethod::Digital,
        counselor: CounselorContact {
            name: "Dana Levi".to_string(),
            email: String::new(),
            mobile: "050-123-4567".to_string(),
            school_name: "Hillside High".to_string(),
        },
        parent: Default::default(),
        destination: None,
    };
    let err = crm.create_case(&case).await.unwrap_err();
    assert_eq!(err.cause(), Some(FailureCause::SchemaError));
    assert!(err.to_string().contains("REQUIRED_FIELD_MISSING"));

    // The next create succeeds and returns the record id.
    let record_id = crm.create_case(&case).await.unwrap();
    assert_eq!(record_id, "a0R000000000001");
}

#[tokio::test]
async fn test_slow_call_times_out() {
    let transport = Arc::new(MockCrmTransport::new());
    let crm = client(&transport, Duration::from_millis(50));
    transport.set_call_delay(Duration::from_millis(500));

    let err = crm
        .update_consent(RECORD_ID, &consent_update())
        .await
        .unwrap_err();
    assert_eq!(err.cause(), Some(FailureCause::Timeout));
    assert_eq!(transport.updates().len(), 1);
}

#[tokio::test]
async fn test_authentication_failure_is_surfaced() {
    let transport = Arc::new(MockCrmTransport::new());
    let crm = client(&transport, Duration::from_secs(5));
    transport.fail_next_token(CrmCallError::http(
        400,
        Some("invalid_grant".into()),
        "expired access/refresh token",
    ));

    let err = crm
        .update_consent(RECORD_ID, &consent_update())
        .await
        .unwrap_err();
    assert!(matches!(err, CrmError::AuthenticationUnavailable { .. }));
    assert!(transport.updates().is_empty());
}

#[tokio::test]
async fn test_upload_attachment_returns_document_id() {
    let transport = Arc::new(MockCrmTransport::new());
    let crm = client(&transport, Duration::from_secs(5));

    let document_id = crm
        .upload_attachment(
            RECORD_ID,
            b"%PDF".to_vec(),
            "consent.pdf",
            "application/pdf",
            "Consent proof",
        )
        .await
        .unwrap();
    assert_eq!(document_id, "068000000000001");

    let uploads = transport.uploads();
    assert_eq!(uploads[0].record_id, RECORD_ID);
    assert_eq!(uploads[0].description, "Consent proof");
}
