//! Error types for the local referral store

use thiserror::Error;

/// Errors returned by [`ReferralStore`](super::ReferralStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// A referral with this number already exists
    #[error("Referral number '{0}' already exists")]
    DuplicateReferralNumber(String),

    /// No referral with this number
    #[error("Referral '{0}' not found")]
    NotFound(String),

    /// The referral is already linked to a different CRM record
    #[error("Referral '{referral_number}' is already linked to CRM record '{existing}', refusing '{attempted}'")]
    ExternalRecordConflict {
        referral_number: String,
        existing: String,
        attempted: String,
    },

    /// Underlying sled failure
    #[error("Database {operation} failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sled::Error,
    },

    /// Stored bytes could not be (de)serialized
    #[error("Serialization failed for {context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Helper for converting sled errors in store operations
    pub fn from_sled(operation: &'static str) -> impl Fn(sled::Error) -> StoreError {
        move |source| StoreError::Database { operation, source }
    }

    /// Helper for converting serde errors in store operations
    pub fn from_serde(context: &str) -> impl Fn(serde_json::Error) -> StoreError + '_ {
        move |source| StoreError::Serialization {
            context: context.to_string(),
            source,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting() {
        let err = StoreError::from_sled("insert")(sled::Error::Unsupported("test".to_string()));
        assert!(err.to_string().starts_with("Database insert failed"));

        if let Err(json_err) = serde_json::from_str::<serde_json::Value>("invalid json") {
            let err = StoreError::from_serde("referral REF-202501-0001")(json_err);
            assert!(matches!(err, StoreError::Serialization { .. }));
        }
    }
}
