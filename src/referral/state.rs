//! Referral lifecycle state machine.
//!
//! Pure functions only: the orchestration layer asks this module what the
//! next status is and performs the I/O itself.
//!
//! ```text
//!   digital:  pending_consent --consent--> consent_signed --student data--> completed
//!   manual:   consent_signed   (proof attached)  --student data--> completed
//!             consent_with_rep (no proof)        --student data--> completed (+ warning)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::model::ConsentMethod;

/// Lifecycle status of a referral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    PendingConsent,
    ConsentWithRep,
    ConsentSigned,
    Completed,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::PendingConsent => "pending_consent",
            ReferralStatus::ConsentWithRep => "consent_with_rep",
            ReferralStatus::ConsentSigned => "consent_signed",
            ReferralStatus::Completed => "completed",
        }
    }

    /// Initial status for a new referral.
    ///
    /// Digital consent always starts by waiting for the parent. Manual consent
    /// counts as signed when the counselor attached a proof file, otherwise the
    /// counselor's representation of consent is recorded.
    pub fn initial(method: ConsentMethod, proof_attached: bool) -> Self {
        match (method, proof_attached) {
            (ConsentMethod::Digital, _) => ReferralStatus::PendingConsent,
            (ConsentMethod::Manual, true) => ReferralStatus::ConsentSigned,
            (ConsentMethod::Manual, false) => ReferralStatus::ConsentWithRep,
        }
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case priority derived from the student's risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// `>= 7` is High, `4..=6` is Medium, anything lower is Low.
    pub fn from_risk_level(risk_level: u8) -> Self {
        match risk_level {
            0..=3 => Priority::Low,
            4..=6 => Priority::Medium,
            _ => Priority::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to a referral and may move it forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Parent submitted the digital consent form with a valid signature.
    ConsentSigned,
    /// Student data was submitted.
    StudentDataSubmitted,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::ConsentSigned => f.write_str("consent signed"),
            Trigger::StudentDataSubmitted => f.write_str("student data submitted"),
        }
    }
}

/// Side conditions the caller must act on after an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionWarning {
    /// Completed on the manual path without any uploaded consent proof.
    MissingConsentProof,
}

/// Result of an accepted trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ReferralStatus,
    pub to: ReferralStatus,
    pub warnings: Vec<TransitionWarning>,
}

impl Transition {
    /// Resubmissions are accepted without moving the referral.
    pub fn is_resubmission(&self) -> bool {
        self.from == self.to
    }
}

/// A trigger that is not legal in the referral's current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply '{trigger}' to a {method} referral in status '{status}'")]
pub struct TransitionRejected {
    pub method: ConsentMethod,
    pub status: ReferralStatus,
    pub trigger: Trigger,
}

/// Computes the transition for `trigger` or rejects it.
pub fn apply(
    method: ConsentMethod,
    status: ReferralStatus,
    trigger: Trigger,
) -> Result<Transition, TransitionRejected> {
    use ReferralStatus::*;

    let accepted = |to: ReferralStatus, warnings: Vec<TransitionWarning>| Transition {
        from: status,
        to,
        warnings,
    };

    match (trigger, method, status) {
        (Trigger::ConsentSigned, ConsentMethod::Digital, PendingConsent) => {
            Ok(accepted(ConsentSigned, Vec::new()))
        }
        (Trigger::ConsentSigned, ConsentMethod::Digital, ConsentSigned) => {
            Ok(accepted(ConsentSigned, Vec::new()))
        }
        (Trigger::StudentDataSubmitted, _, ConsentSigned) => Ok(accepted(Completed, Vec::new())),
        (Trigger::StudentDataSubmitted, ConsentMethod::Manual, ConsentWithRep) => Ok(accepted(
            Completed,
            vec![TransitionWarning::MissingConsentProof],
        )),
        (Trigger::StudentDataSubmitted, _, Completed) => Ok(accepted(Completed, Vec::new())),
        _ => Err(TransitionRejected {
            method,
            status,
            trigger,
        }),
    }
}
