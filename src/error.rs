//! Error types for the referral intake entry points

use thiserror::Error;

use crate::config::ConfigError;
use crate::crm::CrmError;
use crate::referral::TransitionRejected;
use crate::store::StoreError;

/// Errors returned by the orchestration entry points
#[derive(Error, Debug)]
pub enum ReferralError {
    /// Malformed or missing input. Never retried.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No referral with this number exists
    #[error("Referral not found: {0}")]
    NotFound(String),

    /// The generated referral number is already taken
    #[error("Duplicate referral number: {0}")]
    DuplicateReferralNumber(String),

    /// The referral's current status does not allow the operation
    #[error("Operation rejected: {0}")]
    Rejected(#[from] TransitionRejected),

    /// The referral has no CRM case to write to
    #[error("Referral {0} has no CRM record; the CRM was not contacted")]
    CrmRecordMissing(String),

    /// CRM authentication or operation failure
    #[error(transparent)]
    Crm(#[from] CrmError),

    /// Local store failure
    #[error("Store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ReferralError {
    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(referral_number: impl Into<String>) -> Self {
        Self::NotFound(referral_number.into())
    }

    pub fn crm_record_missing(referral_number: impl Into<String>) -> Self {
        Self::CrmRecordMissing(referral_number.into())
    }
}

impl From<StoreError> for ReferralError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(number) => Self::NotFound(number),
            StoreError::DuplicateReferralNumber(number) => Self::DuplicateReferralNumber(number),
            other => Self::Store(other),
        }
    }
}

/// Result type for referral intake operations
pub type ReferralResult<T> = Result<T, ReferralError>;
