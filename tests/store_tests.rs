//! Referral store integration tests on a temporary sled database.

mod common;

use common::counselor;
use referral_intake::referral::{ConsentMethod, ParentContact, Priority, Referral, ReferralStatus};
use referral_intake::store::{ReferralPatch, ReferralStore, StoreError};
use std::sync::Arc;

fn temp_store() -> ReferralStore {
    let db = sled::Config::new()
        .temporary(true)
        .open()
        .expect("Failed to open temporary database");
    ReferralStore::new(db).expect("Failed to create referral store")
}

fn referral(number: &str) -> Referral {
    Referral::new(
        number.to_string(),
        ReferralStatus::PendingConsent,
        ConsentMethod::Digital,
        counselor(),
        ParentContact {
            email: Some("parent@example.org".to_string()),
            phone: None,
        },
        Some("north".to_string()),
    )
}

#[test]
fn test_partial_update_preserves_other_fields() {
    let store = temp_store();
    store.insert(referral("REF-202501-0001")).unwrap();

    store
        .update(
            "REF-202501-0001",
            &ReferralPatch::new().external_record_id("a0R000000000001"),
        )
        .unwrap();
    let updated = store
        .update(
            "REF-202501-0001",
            &ReferralPatch::new()
                .status(ReferralStatus::ConsentSigned)
                .priority(Priority::Medium),
        )
        .unwrap();

    assert_eq!(updated.status, ReferralStatus::ConsentSigned);
    assert_eq!(updated.priority, Some(Priority::Medium));
    assert_eq!(updated.external_record_id.as_deref(), Some("a0R000000000001"));
    assert_eq!(updated.destination.as_deref(), Some("north"));
    assert_eq!(updated.counselor, counselor());
    assert!(updated.updated_at >= updated.created_at);

    let read = store.get_by_referral_number("REF-202501-0001").unwrap();
    assert_eq!(read, updated);
}

#[test]
fn test_duplicate_insert_is_refused() {
    let store = temp_store();
    store.insert(referral("REF-202501-0002")).unwrap();

    let mut other = referral("REF-202501-0002");
    other.consent_method = ConsentMethod::Manual;
    let err = store.insert(other).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateReferralNumber(n) if n == "REF-202501-0002"));

    // The original is untouched.
    let stored = store.get_by_referral_number("REF-202501-0002").unwrap();
    assert_eq!(stored.consent_method, ConsentMethod::Digital);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_relinking_to_another_record_is_refused() {
    let store = temp_store();
    store.insert(referral("REF-202501-0003")).unwrap();
    store
        .update(
            "REF-202501-0003",
            &ReferralPatch::new().external_record_id("a0R000000000001"),
        )
        .unwrap();

    // The same id again is fine.
    store
        .update(
            "REF-202501-0003",
            &ReferralPatch::new().external_record_id("a0R000000000001"),
        )
        .unwrap();

    let err = store
        .update(
            "REF-202501-0003",
            &ReferralPatch::new()
                .external_record_id("a0R000000000002")
                .status(ReferralStatus::Completed),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::ExternalRecordConflict { ref existing, ref attempted, .. }
            if existing == "a0R000000000001" && attempted == "a0R000000000002"
    ));
    // Nothing from the refused patch was applied.
    assert_eq!(
        store.get_by_referral_number("REF-202501-0003").unwrap().status,
        ReferralStatus::PendingConsent
    );
}

#[tokio::test]
async fn test_concurrent_updates_are_not_lost() {
    let store = Arc::new(temp_store());
    store.insert(referral("REF-202501-0005")).unwrap();

    let status_writer = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || {
            for _ in 0..50 {
                store
                    .update(
                        "REF-202501-0005",
                        &ReferralPatch::new().status(ReferralStatus::ConsentSigned),
                    )
                    .unwrap();
            }
        })
    };
    let link_writer = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || {
            for _ in 0..50 {
                store
                    .update(
                        "REF-202501-0005",
                        &ReferralPatch::new().external_record_id("a0R000000000005"),
                    )
                    .unwrap();
            }
        })
    };
    status_writer.await.unwrap();
    link_writer.await.unwrap();

    let stored = store.get_by_referral_number("REF-202501-0005").unwrap();
    assert_eq!(stored.status, ReferralStatus::ConsentSigned);
    assert_eq!(stored.external_record_id.as_deref(), Some("a0R000000000005"));
}
