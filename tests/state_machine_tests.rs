//! Lifecycle rules across both consent paths.

use referral_intake::referral::state::apply;
use referral_intake::referral::{ConsentMethod, Priority, ReferralStatus, TransitionWarning, Trigger};

const ALL_STATUSES: [ReferralStatus; 4] = [
    ReferralStatus::PendingConsent,
    ReferralStatus::ConsentWithRep,
    ReferralStatus::ConsentSigned,
    ReferralStatus::Completed,
];

#[test]
fn test_digital_path_walkthrough() {
    let status = ReferralStatus::initial(ConsentMethod::Digital, false);
    assert_eq!(status, ReferralStatus::PendingConsent);

    let signed = apply(ConsentMethod::Digital, status, Trigger::ConsentSigned).unwrap();
    assert_eq!(signed.to, ReferralStatus::ConsentSigned);
    assert!(!signed.is_resubmission());

    let completed = apply(ConsentMethod::Digital, signed.to, Trigger::StudentDataSubmitted).unwrap();
    assert_eq!(completed.to, ReferralStatus::Completed);
    assert!(completed.warnings.is_empty());
}

#[test]
fn test_manual_path_without_proof_warns() {
    let status = ReferralStatus::initial(ConsentMethod::Manual, false);
    let completed = apply(ConsentMethod::Manual, status, Trigger::StudentDataSubmitted).unwrap();
    assert_eq!(completed.to, ReferralStatus::Completed);
    assert_eq!(completed.warnings, vec![TransitionWarning::MissingConsentProof]);
}

#[test]
fn test_manual_referrals_never_accept_digital_consent() {
    for status in ALL_STATUSES {
        assert!(apply(ConsentMethod::Manual, status, Trigger::ConsentSigned).is_err());
    }
}

#[test]
fn test_student_data_requires_consent() {
    let rejected = apply(
        ConsentMethod::Digital,
        ReferralStatus::PendingConsent,
        Trigger::StudentDataSubmitted,
    )
    .unwrap_err();
    assert_eq!(rejected.status, ReferralStatus::PendingConsent);
    assert!(rejected.to_string().contains("pending_consent"));
}

#[test]
fn test_completed_accepts_only_student_resubmission() {
    for method in [ConsentMethod::Digital, ConsentMethod::Manual] {
        let again = apply(method, ReferralStatus::Completed, Trigger::StudentDataSubmitted).unwrap();
        assert!(again.is_resubmission());
        assert!(again.warnings.is_empty());
        assert!(apply(method, ReferralStatus::Completed, Trigger::ConsentSigned).is_err());
    }
}

#[test]
fn test_no_transition_moves_backwards() {
    let rank = |s: ReferralStatus| match s {
        ReferralStatus::PendingConsent => 0,
        ReferralStatus::ConsentWithRep | ReferralStatus::ConsentSigned => 1,
        ReferralStatus::Completed => 2,
    };
    for method in [ConsentMethod::Digital, ConsentMethod::Manual] {
        for status in ALL_STATUSES {
            for trigger in [Trigger::ConsentSigned, Trigger::StudentDataSubmitted] {
                if let Ok(t) = apply(method, status, trigger) {
                    assert!(rank(t.to) >= rank(t.from), "{:?} went backwards", t);
                }
            }
        }
    }
}

#[test]
fn test_priority_boundaries() {
    assert_eq!(Priority::from_risk_level(0), Priority::Low);
    assert_eq!(Priority::from_risk_level(3), Priority::Low);
    assert_eq!(Priority::from_risk_level(4), Priority::Medium);
    assert_eq!(Priority::from_risk_level(6), Priority::Medium);
    assert_eq!(Priority::from_risk_level(7), Priority::High);
    assert_eq!(Priority::from_risk_level(10), Priority::High);
}
