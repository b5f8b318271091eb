//! Orchestration entry points.
//!
//! Each operation validates its input, asks the state machine for the next
//! status, persists locally, writes to the CRM and finally fires
//! notifications. The local write always happens before the CRM write.

use std::sync::Arc;

use serde::Serialize;

use super::links::LinkBuilder;
use super::payload::{decode_signature, ConsentPayload, CounselorSubmission, ProofUpload, StudentPayload};
use crate::config::IntakeConfig;
use crate::constants::REFERRAL_NUMBER_ATTEMPTS;
use crate::crm::{self, Clock, ConsentUpdate, CrmSyncClient, NewCase, StudentDataUpdate, SystemClock};
use crate::error::{ReferralError, ReferralResult};
use crate::notify::{
    Branding, DestinationDirectory, EventKind, NotificationDispatcher, NotificationEvent,
    Recipient, RecipientRole,
};
use crate::referral::state::{self, Trigger};
use crate::referral::{
    generate_referral_number, ConsentMethod, ConsentProof, ConsentRecord, Priority, Referral,
    ReferralStatus, TransitionWarning,
};
use crate::store::{ReferralPatch, ReferralStore, StoreError};
use crate::utils::ValidationUtils;
use crate::{log_intake_error, log_intake_info, log_intake_warn};

/// Result of [`ReferralService::initiate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitiateOutcome {
    pub referral_number: String,
    pub status: ReferralStatus,
    /// Parent consent link (digital) or student-data link (manual)
    pub next_url: String,
    /// False when the CRM case could not be created. The referral is
    /// stored locally either way.
    pub crm_synced: bool,
}

/// Result of [`ReferralService::submit_consent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentOutcome {
    pub student_form_url: String,
}

/// Result of [`ReferralService::submit_student_data`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentDataOutcome {
    pub success: bool,
    pub priority: Priority,
}

/// Result of [`ReferralService::link_missing_case`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkOutcome {
    pub external_record_id: String,
    /// False when the referral was already linked.
    pub created: bool,
}

/// The referral intake service.
pub struct ReferralService {
    store: ReferralStore,
    crm: Arc<CrmSyncClient>,
    notifier: Arc<NotificationDispatcher>,
    directory: DestinationDirectory,
    links: LinkBuilder,
    clock: Arc<dyn Clock>,
}

impl ReferralService {
    pub fn new(
        store: ReferralStore,
        crm: Arc<CrmSyncClient>,
        notifier: Arc<NotificationDispatcher>,
        directory: DestinationDirectory,
        links: LinkBuilder,
    ) -> Self {
        Self {
            store,
            crm,
            notifier,
            directory,
            links,
            clock: Arc::new(SystemClock),
        }
    }

    /// Overrides the clock used for referral numbers and consent timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Production wiring from configuration.
    pub fn from_config(config: &IntakeConfig) -> ReferralResult<Self> {
        let store = ReferralStore::open(&config.storage_path)?;
        let crm = crm::connect(&config.crm)?;
        let notifier = NotificationDispatcher::from_config(&config.notifications).map_err(|e| {
            ReferralError::Config(crate::config::ConfigError::validation(
                "notifications",
                e.to_string(),
            ))
        })?;
        Ok(Self::new(
            store,
            Arc::new(crm),
            Arc::new(notifier),
            DestinationDirectory::from_config(&config.notifications),
            LinkBuilder::new(config.public_base_url.clone()),
        ))
    }

    pub fn store(&self) -> &ReferralStore {
        &self.store
    }

    /// Reads a referral by number.
    pub fn get_referral(&self, referral_number: &str) -> ReferralResult<Referral> {
        ValidationUtils::require_valid_referral_number(referral_number)?;
        Ok(self.store.get_by_referral_number(referral_number)?)
    }

    /// Creates a referral from the counselor's form.
    ///
    /// The referral is always committed locally. A CRM failure is reported
    /// through `crm_synced = false` rather than as an error.
    pub async fn initiate(&self, submission: CounselorSubmission) -> ReferralResult<InitiateOutcome> {
        submission.validate()?;

        let status = ReferralStatus::initial(
            submission.consent_method,
            submission.consent_proof.is_some(),
        );
        let referral = self.insert_with_fresh_number(&submission, status)?;
        let number = referral.referral_number.clone();
        log_intake_info!(
            "Referral {} created ({} consent, status {})",
            number,
            referral.consent_method,
            status
        );

        let crm_synced = match self.create_case_once(&referral).await {
            Ok(record_id) => {
                if let Some(proof) = &submission.consent_proof {
                    self.upload_proof(&number, &record_id, proof).await;
                }
                true
            }
            Err(e) => {
                log_intake_warn!(
                    "Referral {} stored locally but the CRM case was not created: {}",
                    number,
                    e
                );
                false
            }
        };

        let next_url = match referral.consent_method {
            ConsentMethod::Digital => self.links.consent_url(&number),
            ConsentMethod::Manual => self.links.student_form_url(&number),
        };

        let branding = self.directory.resolve(referral.destination.as_deref());
        if referral.consent_method == ConsentMethod::Digital {
            let event = NotificationEvent::new(
                &number,
                &branding.organization_name,
                EventKind::ConsentRequested {
                    consent_url: next_url.clone(),
                },
            );
            self.notifier
                .dispatch(&event, &[parent_recipient(&referral)])
                .await;
        }
        let event = NotificationEvent::new(
            &number,
            &branding.organization_name,
            EventKind::ReferralCreated {
                next_url: next_url.clone(),
            },
        );
        self.notifier
            .dispatch(&event, &[counselor_recipient(&referral)])
            .await;

        Ok(InitiateOutcome {
            referral_number: number,
            status,
            next_url,
            crm_synced,
        })
    }

    /// Records the parent's digital consent.
    ///
    /// Resubmission on an already signed referral is accepted, so a caller
    /// can retry after a CRM failure.
    pub async fn submit_consent(
        &self,
        referral_number: &str,
        payload: ConsentPayload,
    ) -> ReferralResult<ConsentOutcome> {
        ValidationUtils::require_valid_referral_number(referral_number)?;
        payload.validate()?;

        let referral = self.store.get_by_referral_number(referral_number)?;
        let transition = state::apply(referral.consent_method, referral.status, Trigger::ConsentSigned)?;

        let consent = ConsentRecord {
            parent_names: payload.parent_names.clone(),
            signatures: payload.signatures.clone(),
            consented_at: self.clock.now(),
        };
        let referral = self.store.update(
            referral_number,
            &ReferralPatch::new()
                .status(transition.to)
                .consent(consent.clone()),
        )?;

        let record_id = self.require_record_id(&referral)?;
        self.crm
            .update_consent(
                &record_id,
                &ConsentUpdate {
                    status: transition.to,
                    parent_names: consent.parent_names.clone(),
                    consented_at: consent.consented_at,
                },
            )
            .await?;
        log_intake_info!("Consent for {} synced to CRM", referral_number);

        self.upload_signatures(referral_number, &record_id, &payload).await;

        let student_form_url = self.links.student_form_url(referral_number);
        let branding = self.directory.resolve(referral.destination.as_deref());
        let event = NotificationEvent::new(
            referral_number,
            &branding.organization_name,
            EventKind::ConsentSigned {
                student_form_url: student_form_url.clone(),
            },
        );
        self.notifier
            .dispatch(&event, &[counselor_recipient(&referral)])
            .await;

        Ok(ConsentOutcome { student_form_url })
    }

    /// Records student details and completes the referral.
    pub async fn submit_student_data(
        &self,
        referral_number: &str,
        payload: StudentPayload,
    ) -> ReferralResult<StudentDataOutcome> {
        ValidationUtils::require_valid_referral_number(referral_number)?;
        payload.validate()?;
        let student = payload.to_details()?;

        let referral = self.store.get_by_referral_number(referral_number)?;
        let transition = state::apply(
            referral.consent_method,
            referral.status,
            Trigger::StudentDataSubmitted,
        )?;
        let priority = Priority::from_risk_level(student.risk_level);
        let proof_missing = transition
            .warnings
            .contains(&TransitionWarning::MissingConsentProof)
            || (referral.status == ReferralStatus::Completed
                && referral.consent_method == ConsentMethod::Manual
                && referral.consent_proof.is_none());

        // Details are kept even when the CRM write fails. The status only
        // moves once the CRM has the data, so a retry still completes the
        // referral and fires its notifications.
        let first_completion = referral.status != ReferralStatus::Completed;
        let referral = self.store.update(
            referral_number,
            &ReferralPatch::new()
                .student(student.clone())
                .priority(priority),
        )?;

        let record_id = self.require_record_id(&referral)?;
        self.crm
            .update_student_data(
                &record_id,
                &StudentDataUpdate {
                    status: transition.to,
                    student: student.clone(),
                    priority,
                    consent_proof_missing: proof_missing,
                },
            )
            .await?;
        log_intake_info!(
            "Student data for {} synced to CRM (priority {})",
            referral_number,
            priority
        );
        let referral = self.store.update(
            referral_number,
            &ReferralPatch::new().status(transition.to),
        )?;

        if first_completion {
            let branding = self.directory.resolve(referral.destination.as_deref());
            let house_manager = house_manager_recipient(&branding);
            if proof_missing {
                self.warn_missing_proof(&referral, &branding, house_manager.as_ref())
                    .await;
            }

            let mut recipients = vec![counselor_recipient(&referral)];
            recipients.extend(house_manager);
            let event = NotificationEvent::new(
                referral_number,
                &branding.organization_name,
                EventKind::ReferralCompleted {
                    student_name: student.full_name(),
                    priority,
                },
            );
            self.notifier.dispatch(&event, &recipients).await;
        }

        Ok(StudentDataOutcome {
            success: true,
            priority,
        })
    }

    /// Creates the CRM case for a referral whose `initiate` could not reach
    /// the CRM. Already linked referrals are left alone.
    pub async fn link_missing_case(&self, referral_number: &str) -> ReferralResult<LinkOutcome> {
        ValidationUtils::require_valid_referral_number(referral_number)?;
        let referral = self.store.get_by_referral_number(referral_number)?;

        if let Some(existing) = &referral.external_record_id {
            return Ok(LinkOutcome {
                external_record_id: existing.clone(),
                created: false,
            });
        }

        let record_id = self.create_case_once(&referral).await?;
        if referral.consent_proof.is_some() {
            log_intake_warn!(
                "Referral {} has a consent proof that was never uploaded; the file must be attached in the CRM by hand",
                referral_number
            );
        }
        Ok(LinkOutcome {
            external_record_id: record_id,
            created: true,
        })
    }

    fn insert_with_fresh_number(
        &self,
        submission: &CounselorSubmission,
        status: ReferralStatus,
    ) -> ReferralResult<Referral> {
        let mut last_collision = None;
        for _ in 0..REFERRAL_NUMBER_ATTEMPTS {
            let mut referral = Referral::new(
                generate_referral_number(self.clock.now()),
                status,
                submission.consent_method,
                submission.counselor.clone(),
                submission.parent.clone(),
                submission
                    .destination
                    .clone()
                    .filter(|d| !d.trim().is_empty()),
            );
            referral.consent_proof = submission.consent_proof.as_ref().map(ProofUpload::metadata);

            match self.store.insert(referral) {
                Ok(stored) => return Ok(stored),
                Err(StoreError::DuplicateReferralNumber(number)) => {
                    last_collision = Some(number);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReferralError::DuplicateReferralNumber(
            last_collision.unwrap_or_default(),
        ))
    }

    /// Creates the CRM case unless the referral is already linked, then
    /// stores the record id.
    ///
    /// Two callers racing here can both create a case; the store refuses the
    /// second, different record id with `ExternalRecordConflict`.
    async fn create_case_once(&self, referral: &Referral) -> ReferralResult<String> {
        if let Some(existing) = &referral.external_record_id {
            return Ok(existing.clone());
        }

        let record_id = self.crm.create_case(&NewCase::from(referral)).await?;
        match self.store.update(
            &referral.referral_number,
            &ReferralPatch::new().external_record_id(record_id.clone()),
        ) {
            Ok(_) => Ok(record_id),
            Err(e) => {
                log_intake_error!(
                    "CRM case {} was created for {} but could not be linked locally: {}",
                    record_id,
                    referral.referral_number,
                    e
                );
                Err(e.into())
            }
        }
    }

    fn require_record_id(&self, referral: &Referral) -> ReferralResult<String> {
        referral.external_record_id.clone().ok_or_else(|| {
            log_intake_warn!(
                "Referral {} has no CRM record; not contacting the CRM",
                referral.referral_number
            );
            ReferralError::crm_record_missing(&referral.referral_number)
        })
    }

    async fn upload_proof(&self, referral_number: &str, record_id: &str, proof: &ProofUpload) {
        let uploaded = self
            .crm
            .upload_attachment(
                record_id,
                proof.bytes.clone(),
                &proof.file_name,
                &proof.mime_type,
                "Consent proof uploaded by counselor",
            )
            .await;

        match uploaded {
            Ok(document_id) => {
                let metadata = ConsentProof {
                    document_id: Some(document_id),
                    ..proof.metadata()
                };
                if let Err(e) = self
                    .store
                    .update(referral_number, &ReferralPatch::new().consent_proof(metadata))
                {
                    log_intake_warn!(
                        "Could not record consent proof document for {}: {}",
                        referral_number,
                        e
                    );
                }
            }
            Err(e) => log_intake_warn!(
                "Consent proof upload for {} failed: {}",
                referral_number,
                e
            ),
        }
    }

    async fn upload_signatures(&self, referral_number: &str, record_id: &str, payload: &ConsentPayload) {
        for (index, signature) in payload.signatures.iter().enumerate() {
            let Some((bytes, mime_type)) = decode_signature(signature) else {
                continue;
            };
            let extension = mime_type.rsplit('/').next().unwrap_or("png");
            let file_name = format!("{}-signature-{}.{}", referral_number, index + 1, extension);
            let description = format!("Parent consent signature: {}", signature.signer_name);
            if let Err(e) = self
                .crm
                .upload_attachment(record_id, bytes, &file_name, &mime_type, &description)
                .await
            {
                log_intake_warn!(
                    "Signature upload {} for {} failed: {}",
                    index + 1,
                    referral_number,
                    e
                );
            }
        }
    }

    async fn warn_missing_proof(
        &self,
        referral: &Referral,
        branding: &Branding,
        house_manager: Option<&Recipient>,
    ) {
        log_intake_warn!(
            "Referral {} completed without consent proof",
            referral.referral_number
        );
        let Some(house_manager) = house_manager else {
            return;
        };
        let event = NotificationEvent::new(
            &referral.referral_number,
            &branding.organization_name,
            EventKind::MissingConsentProof {
                school_name: referral.counselor.school_name.clone(),
            },
        );
        self.notifier
            .dispatch(&event, std::slice::from_ref(house_manager))
            .await;
    }
}

fn parent_recipient(referral: &Referral) -> Recipient {
    Recipient::new(RecipientRole::Parent)
        .email(referral.parent.email.clone())
        .phone(referral.parent.phone.clone())
}

fn counselor_recipient(referral: &Referral) -> Recipient {
    Recipient::new(RecipientRole::Counselor)
        .name(referral.counselor.name.clone())
        .email(Some(referral.counselor.email.clone()))
        .phone(Some(referral.counselor.mobile.clone()))
}

fn house_manager_recipient(branding: &Branding) -> Option<Recipient> {
    branding.house_manager.as_ref().map(|contact| {
        Recipient::new(RecipientRole::HouseManager)
            .name(contact.name.clone())
            .email(contact.email.clone())
            .phone(contact.phone.clone())
    })
}
