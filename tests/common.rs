//! Common test fixtures for the referral intake integration tests
//!
//! Builds a `ReferralService` on a temporary sled database, the in-memory
//! CRM and recording notification providers.

#![allow(dead_code)]

use referral_intake::crm::Clock;
use referral_intake::intake::{
    ConsentPayload, CounselorSubmission, LinkBuilder, ProofUpload, StudentPayload,
};
use referral_intake::notify::{
    DestinationDirectory, EmailProvider, NotificationDispatcher, SmsProvider,
};
use referral_intake::referral::{ConsentMethod, CounselorContact, ParentContact, SignatureImage};
use referral_intake::testing::{
    mock_sync_client, ManualClock, MockCrmTransport, RecordingEmailProvider, RecordingSmsProvider,
};
use referral_intake::config::{DestinationEntry, HouseManagerContact};
use referral_intake::{ReferralService, ReferralStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "https://intake.example.org";

/// Shared fixture for intake flow tests
pub struct IntakeFixture {
    pub service: ReferralService,
    pub transport: Arc<MockCrmTransport>,
    pub email: Arc<RecordingEmailProvider>,
    pub sms: Arc<RecordingSmsProvider>,
    pub clock: Arc<ManualClock>,
}

impl IntakeFixture {
    /// Fixture with recording email and SMS providers
    pub fn new() -> Self {
        let email = Arc::new(RecordingEmailProvider::new());
        let sms = Arc::new(RecordingSmsProvider::new());
        let dispatcher = NotificationDispatcher::new(
            Some(email.clone() as Arc<dyn EmailProvider>),
            Some(sms.clone() as Arc<dyn SmsProvider>),
        );
        Self::build(dispatcher, email, sms)
    }

    /// Fixture with a custom dispatcher. The recording providers are unused.
    pub fn with_dispatcher(dispatcher: NotificationDispatcher) -> Self {
        Self::build(
            dispatcher,
            Arc::new(RecordingEmailProvider::new()),
            Arc::new(RecordingSmsProvider::new()),
        )
    }

    fn build(
        dispatcher: NotificationDispatcher,
        email: Arc<RecordingEmailProvider>,
        sms: Arc<RecordingSmsProvider>,
    ) -> Self {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("Failed to open temporary database");
        let store = ReferralStore::new(db).expect("Failed to create referral store");

        let transport = Arc::new(MockCrmTransport::new());
        let clock = Arc::new(ManualClock::fixed());
        let crm = mock_sync_client(
            Arc::clone(&transport),
            clock.clone() as Arc<dyn Clock>,
            Duration::from_secs(5),
        );

        let service = ReferralService::new(
            store,
            Arc::new(crm),
            Arc::new(dispatcher),
            directory(),
            LinkBuilder::new(BASE_URL),
        )
        .with_clock(clock.clone());

        Self {
            service,
            transport,
            email,
            sms,
            clock,
        }
    }
}

/// One destination with a house manager reachable by email.
pub fn directory() -> DestinationDirectory {
    let mut entries = HashMap::new();
    entries.insert(
        "north".to_string(),
        DestinationEntry {
            organization_name: "North House".to_string(),
            house_manager: Some(HouseManagerContact {
                name: "Avi Mizrahi".to_string(),
                email: Some("avi@north.example".to_string()),
                phone: None,
            }),
        },
    );
    DestinationDirectory::new("Youth Referral Program", entries)
}

pub fn counselor() -> CounselorContact {
    CounselorContact {
        name: "Dana Levi".to_string(),
        email: "dana@school.example".to_string(),
        mobile: "050-123-4567".to_string(),
        school_name: "Hillside High".to_string(),
    }
}

pub fn digital_submission() -> CounselorSubmission {
    CounselorSubmission {
        counselor: counselor(),
        parent: ParentContact {
            email: Some("parent@example.org".to_string()),
            phone: Some("052-111-2222".to_string()),
        },
        consent_method: ConsentMethod::Digital,
        destination: Some("north".to_string()),
        consent_proof: None,
    }
}

pub fn manual_submission(with_proof: bool) -> CounselorSubmission {
    CounselorSubmission {
        consent_method: ConsentMethod::Manual,
        consent_proof: with_proof.then(|| ProofUpload {
            file_name: "signed-consent.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4 consent".to_vec(),
        }),
        ..digital_submission()
    }
}

pub fn consent_payload() -> ConsentPayload {
    ConsentPayload {
        parent_names: vec!["Miriam Cohen".to_string()],
        signatures: vec![SignatureImage {
            signer_name: "Miriam Cohen".to_string(),
            // "signature" in base64
            image_data: "data:image/png;base64,c2lnbmF0dXJl".to_string(),
        }],
        consent_confirmed: true,
    }
}

pub fn student_payload(risk_level: i64) -> StudentPayload {
    StudentPayload {
        first_name: "Noa".to_string(),
        last_name: "Cohen".to_string(),
        date_of_birth: Some("2010-04-02".to_string()),
        grade: Some("9".to_string()),
        risk_level,
        notes: None,
    }
}
