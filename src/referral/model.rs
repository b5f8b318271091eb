use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::{Priority, ReferralStatus};

/// How parental consent is collected. Fixed when the referral is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentMethod {
    /// Parent signs the online consent form.
    Digital,
    /// Counselor collects consent by other means, optionally with a proof file.
    Manual,
}

impl ConsentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentMethod::Digital => "digital",
            ConsentMethod::Manual => "manual",
        }
    }
}

impl fmt::Display for ConsentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counselor who submitted the referral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounselorContact {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub school_name: String,
}

/// Parent or guardian contact details. At least one channel is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A signature image captured by the consent form, stored as a data URL or
/// base64 payload exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureImage {
    pub signer_name: String,
    pub image_data: String,
}

/// Artifacts recorded when a parent signs the digital consent form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub parent_names: Vec<String>,
    pub signatures: Vec<SignatureImage>,
    pub consented_at: DateTime<Utc>,
}

/// Metadata of a manual-consent proof file. The bytes themselves only travel
/// to the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentProof {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    /// CRM document id, set once the upload succeeded.
    pub document_id: Option<String>,
}

/// Student information collected in the final step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDetails {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub grade: Option<String>,
    pub risk_level: u8,
    pub notes: Option<String>,
}

impl StudentDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The local referral aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub referral_number: String,
    pub status: ReferralStatus,
    pub consent_method: ConsentMethod,
    pub counselor: CounselorContact,
    pub parent: ParentContact,
    /// Destination key used for branding and house-manager lookup.
    pub destination: Option<String>,
    /// Reference to the CRM case record. Once set it is never cleared.
    pub external_record_id: Option<String>,
    pub consent: Option<ConsentRecord>,
    pub consent_proof: Option<ConsentProof>,
    pub student: Option<StudentDetails>,
    pub priority: Option<Priority>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Referral {
    /// Builds a fresh aggregate in the given initial status.
    pub fn new(
        referral_number: String,
        status: ReferralStatus,
        consent_method: ConsentMethod,
        counselor: CounselorContact,
        parent: ParentContact,
        destination: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            referral_number,
            status,
            consent_method,
            counselor,
            parent,
            destination,
            external_record_id: None,
            consent: None,
            consent_proof: None,
            student: None,
            priority: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the referral is already mirrored in the CRM.
    pub fn is_linked(&self) -> bool {
        self.external_record_id.is_some()
    }
}
