//! Inbound payloads of the intake entry points and their validation.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PROOF_BYTES, MAX_RISK_LEVEL};
use crate::error::{ReferralError, ReferralResult};
use crate::referral::{
    ConsentMethod, ConsentProof, CounselorContact, ParentContact, SignatureImage, StudentDetails,
};
use crate::utils::ValidationUtils;

/// A consent proof file uploaded by the counselor (manual consent only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofUpload {
    pub file_name: String,
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl ProofUpload {
    /// Metadata kept locally; the bytes only go to the CRM.
    pub fn metadata(&self) -> ConsentProof {
        ConsentProof {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.bytes.len(),
            document_id: None,
        }
    }
}

/// The counselor's referral form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounselorSubmission {
    pub counselor: CounselorContact,
    #[serde(default)]
    pub parent: ParentContact,
    pub consent_method: ConsentMethod,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub consent_proof: Option<ProofUpload>,
}

impl CounselorSubmission {
    pub fn validate(&self) -> ReferralResult<()> {
        ValidationUtils::require_non_empty_string(&self.counselor.name, "counselor name")?;
        ValidationUtils::require_valid_email(&self.counselor.email, "counselor email")?;
        ValidationUtils::require_valid_phone(&self.counselor.mobile, "counselor mobile")?;
        ValidationUtils::require_non_empty_string(&self.counselor.school_name, "school name")?;

        let parent_email = self.parent.email.as_deref().filter(|e| !e.trim().is_empty());
        let parent_phone = self.parent.phone.as_deref().filter(|p| !p.trim().is_empty());
        if parent_email.is_none() && parent_phone.is_none() {
            return Err(ReferralError::validation(
                "parent email or phone is required",
            ));
        }
        if let Some(email) = parent_email {
            ValidationUtils::require_valid_email(email, "parent email")?;
        }
        if let Some(phone) = parent_phone {
            ValidationUtils::require_valid_phone(phone, "parent phone")?;
        }

        if let Some(proof) = &self.consent_proof {
            if self.consent_method != ConsentMethod::Manual {
                return Err(ReferralError::validation(
                    "a consent proof file is only accepted for manual consent",
                ));
            }
            ValidationUtils::require_non_empty_string(&proof.file_name, "consent proof file name")?;
            ValidationUtils::require_non_empty_string(&proof.mime_type, "consent proof type")?;
            if proof.bytes.is_empty() {
                return Err(ReferralError::validation("consent proof file is empty"));
            }
            if proof.bytes.len() > MAX_PROOF_BYTES {
                return Err(ReferralError::validation(format!(
                    "consent proof file exceeds {} bytes",
                    MAX_PROOF_BYTES
                )));
            }
        }
        Ok(())
    }
}

/// The parent's digital consent form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentPayload {
    pub parent_names: Vec<String>,
    pub signatures: Vec<SignatureImage>,
    /// The "I agree" checkbox.
    pub consent_confirmed: bool,
}

impl ConsentPayload {
    pub fn validate(&self) -> ReferralResult<()> {
        if !self.consent_confirmed {
            return Err(ReferralError::validation("consent was not confirmed"));
        }
        ValidationUtils::require_non_empty_collection(&self.parent_names, "parent names")?;
        for name in &self.parent_names {
            ValidationUtils::require_non_empty_string(name, "parent name")?;
        }
        ValidationUtils::require_non_empty_collection(&self.signatures, "signatures")?;
        for signature in &self.signatures {
            ValidationUtils::require_non_empty_string(&signature.signer_name, "signer name")?;
            if decode_signature(signature).is_none() {
                return Err(ReferralError::validation(format!(
                    "signature of {} is not a valid image",
                    signature.signer_name
                )));
            }
        }
        Ok(())
    }
}

/// Student details submitted by the counselor or case worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPayload {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    pub risk_level: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl StudentPayload {
    pub fn validate(&self) -> ReferralResult<()> {
        ValidationUtils::require_non_empty_string(&self.first_name, "student first name")?;
        ValidationUtils::require_non_empty_string(&self.last_name, "student last name")?;
        ValidationUtils::require_in_range(
            self.risk_level,
            0,
            i64::from(MAX_RISK_LEVEL),
            "risk_level",
        )?;
        if let Some(dob) = self.date_of_birth.as_deref().filter(|d| !d.is_empty()) {
            if chrono::NaiveDate::parse_from_str(dob, "%Y-%m-%d").is_err() {
                return Err(ReferralError::validation(
                    "date of birth must be formatted YYYY-MM-DD",
                ));
            }
        }
        Ok(())
    }

    /// Converts a validated payload.
    pub fn to_details(&self) -> ReferralResult<StudentDetails> {
        let risk_level = u8::try_from(self.risk_level)
            .map_err(|_| ReferralError::validation("risk_level is out of range"))?;
        Ok(StudentDetails {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            date_of_birth: self.date_of_birth.clone().filter(|d| !d.is_empty()),
            grade: self.grade.clone().filter(|g| !g.is_empty()),
            risk_level,
            notes: self.notes.clone().filter(|n| !n.is_empty()),
        })
    }
}

/// Decodes a signature given as a data URL (`data:image/png;base64,...`)
/// or as bare base64. Returns the bytes and their mime type.
pub fn decode_signature(signature: &SignatureImage) -> Option<(Vec<u8>, String)> {
    let data = signature.image_data.trim();
    let (mime_type, payload) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (meta, payload) = rest.split_once(',')?;
            let mime_type = meta.strip_suffix(";base64")?;
            (mime_type.to_string(), payload)
        }
        None => ("image/png".to_string(), data),
    };
    let bytes = general_purpose::STANDARD.decode(payload).ok()?;
    if bytes.is_empty() {
        return None;
    }
    Some((bytes, mime_type))
}

mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counselor() -> CounselorContact {
        CounselorContact {
            name: "Dana Levi".to_string(),
            email: "dana@school.example".to_string(),
            mobile: "050-123-4567".to_string(),
            school_name: "Hillside High".to_string(),
        }
    }

    fn submission(method: ConsentMethod) -> CounselorSubmission {
        CounselorSubmission {
            counselor: counselor(),
            parent: ParentContact {
                email: Some("parent@example.org".to_string()),
                phone: None,
            },
            consent_method: method,
            destination: None,
            consent_proof: None,
        }
    }

    #[test]
    fn test_submission_requires_a_parent_channel() {
        let mut s = submission(ConsentMethod::Digital);
        assert!(s.validate().is_ok());
        s.parent = ParentContact::default();
        assert!(matches!(s.validate(), Err(ReferralError::Validation(_))));
    }

    #[test]
    fn test_proof_only_for_manual_consent() {
        let proof = ProofUpload {
            file_name: "consent.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: vec![1, 2, 3],
        };
        let mut s = submission(ConsentMethod::Digital);
        s.consent_proof = Some(proof.clone());
        assert!(s.validate().is_err());

        let mut s = submission(ConsentMethod::Manual);
        s.consent_proof = Some(proof);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_risk_level_range() {
        let mut payload = StudentPayload {
            first_name: "Noa".to_string(),
            last_name: "Cohen".to_string(),
            date_of_birth: Some("2010-04-02".to_string()),
            grade: None,
            risk_level: 10,
            notes: None,
        };
        assert!(payload.validate().is_ok());
        assert_eq!(payload.to_details().unwrap().risk_level, 10);

        payload.risk_level = 11;
        assert!(payload.validate().is_err());
        payload.risk_level = -1;
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_bad_date_of_birth() {
        let payload = StudentPayload {
            first_name: "Noa".to_string(),
            last_name: "Cohen".to_string(),
            date_of_birth: Some("02/04/2010".to_string()),
            grade: None,
            risk_level: 2,
            notes: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_decode_signature() {
        let data_url = SignatureImage {
            signer_name: "Miriam".to_string(),
            image_data: "data:image/jpeg;base64,aGVsbG8=".to_string(),
        };
        let (bytes, mime) = decode_signature(&data_url).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(mime, "image/jpeg");

        let bare = SignatureImage {
            signer_name: "Miriam".to_string(),
            image_data: "aGVsbG8=".to_string(),
        };
        assert_eq!(decode_signature(&bare).unwrap().1, "image/png");

        let broken = SignatureImage {
            signer_name: "Miriam".to_string(),
            image_data: "data:image/png;base64,***".to_string(),
        };
        assert!(decode_signature(&broken).is_none());
    }

    #[test]
    fn test_consent_requires_confirmation() {
        let payload = ConsentPayload {
            parent_names: vec!["Miriam Cohen".to_string()],
            signatures: vec![SignatureImage {
                signer_name: "Miriam Cohen".to_string(),
                image_data: "aGVsbG8=".to_string(),
            }],
            consent_confirmed: false,
        };
        assert!(payload.validate().is_err());
    }
}
