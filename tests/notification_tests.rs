//! Notification dispatcher channel fan-out and the email fallback.

use referral_intake::notify::{
    Channel, EmailProvider, EventKind, NotificationDispatcher, NotificationError,
    NotificationEvent, ProviderErrorCode, Recipient, RecipientRole, SmsProvider,
};
use referral_intake::testing::{FailingProvider, RecordingEmailProvider, RecordingSmsProvider};
use std::sync::Arc;

fn event() -> NotificationEvent {
    NotificationEvent::new(
        "REF-202501-0042",
        "North House",
        EventKind::ConsentRequested {
            consent_url: "https://intake.example.org/consent/REF-202501-0042".to_string(),
        },
    )
}

fn parent() -> Recipient {
    Recipient::new(RecipientRole::Parent)
        .email(Some("parent@example.org".to_string()))
        .phone(Some("052-111-2222".to_string()))
}

fn email_only(recipient: Recipient) -> Recipient {
    Recipient {
        phone: None,
        ..recipient
    }
}

#[tokio::test]
async fn test_fallback_used_when_sender_not_verified() {
    let primary = Arc::new(FailingProvider::new(ProviderErrorCode::SenderNotVerified));
    let fallback = Arc::new(RecordingEmailProvider::new());
    let dispatcher = NotificationDispatcher::new(Some(primary.clone() as Arc<dyn EmailProvider>), None)
        .with_email_fallback(fallback.clone());

    let report = dispatcher.dispatch(&event(), &[email_only(parent())]).await;

    assert!(report.is_clean());
    assert_eq!(report.delivered.len(), 1);
    assert!(report.delivered[0].via_fallback);
    assert_eq!(primary.attempts(), 1);
    let sent = fallback.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "parent@example.org");
    assert!(sent[0].subject.contains("REF-202501-0042"));
}

#[tokio::test]
async fn test_fallback_not_used_for_other_errors() {
    let primary = Arc::new(FailingProvider::new(ProviderErrorCode::Rejected));
    let fallback = Arc::new(RecordingEmailProvider::new());
    let dispatcher = NotificationDispatcher::new(Some(primary.clone() as Arc<dyn EmailProvider>), None)
        .with_email_fallback(fallback.clone());

    let report = dispatcher.dispatch(&event(), &[email_only(parent())]).await;

    assert!(fallback.sent().is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        &report.failures[0].error,
        NotificationError::Email(e) if e.code == ProviderErrorCode::Rejected
    ));
}

#[tokio::test]
async fn test_fallback_can_be_disabled() {
    let primary = Arc::new(FailingProvider::new(ProviderErrorCode::SenderNotVerified));
    let fallback = Arc::new(RecordingEmailProvider::new());
    let dispatcher = NotificationDispatcher::new(Some(primary as Arc<dyn EmailProvider>), None)
        .with_email_fallback(fallback.clone())
        .fallback_on_unverified_sender(false);

    let report = dispatcher.dispatch(&event(), &[email_only(parent())]).await;

    assert!(fallback.sent().is_empty());
    assert!(!report.is_clean());
    assert_eq!(report.failures[0].channel, Channel::Email);
}

#[tokio::test]
async fn test_missing_channel_is_reported() {
    let sms = Arc::new(RecordingSmsProvider::new());
    let dispatcher = NotificationDispatcher::new(None, Some(sms.clone() as Arc<dyn SmsProvider>));

    let report = dispatcher.dispatch(&event(), &[parent()]).await;

    assert_eq!(sms.sent().len(), 1);
    assert!(sms.sent()[0].body.contains("https://intake.example.org/consent/"));
    assert_eq!(report.delivered.len(), 1);
    assert_eq!(report.delivered[0].channel, Channel::Sms);
    assert_eq!(
        report.failures[0].error,
        NotificationError::ChannelUnavailable("email")
    );
}

#[tokio::test]
async fn test_sms_failure_does_not_block_email() {
    let email = Arc::new(RecordingEmailProvider::new());
    let sms = Arc::new(FailingProvider::new(ProviderErrorCode::InvalidRecipient));
    let dispatcher = NotificationDispatcher::new(
        Some(email.clone() as Arc<dyn EmailProvider>),
        Some(sms.clone() as Arc<dyn SmsProvider>),
    );
    let counselor = Recipient::new(RecipientRole::Counselor)
        .name("Dana Levi")
        .email(Some("dana@school.example".to_string()))
        .phone(Some("050-123-4567".to_string()));

    let report = dispatcher.dispatch(&event(), &[parent(), counselor]).await;

    assert_eq!(email.sent().len(), 2);
    assert_eq!(sms.attempts(), 2);
    assert_eq!(report.delivered.len(), 2);
    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .all(|f| f.channel == Channel::Sms && matches!(f.error, NotificationError::Sms(_))));
    assert!(report
        .failures
        .iter()
        .any(|f| f.recipient == "counselor Dana Levi"));
}

#[tokio::test]
async fn test_recipient_without_contact_is_skipped() {
    let email = Arc::new(RecordingEmailProvider::new());
    let dispatcher = NotificationDispatcher::new(Some(email.clone() as Arc<dyn EmailProvider>), None);
    let nobody = Recipient::new(RecipientRole::HouseManager)
        .email(Some("   ".to_string()))
        .phone(None);

    let report = dispatcher.dispatch(&event(), &[nobody]).await;

    assert!(report.is_clean());
    assert!(report.delivered.is_empty());
    assert!(email.sent().is_empty());
}

#[tokio::test]
async fn test_log_only_dispatcher_delivers_everything() {
    let report = NotificationDispatcher::log_only()
        .dispatch(&event(), &[parent()])
        .await;
    assert!(report.is_clean());
    assert_eq!(report.delivered.len(), 2);
}
