//! Error types for the CRM integration

use std::fmt;
use thiserror::Error;

/// The typed CRM operations exposed by the sync client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrmOperation {
    CreateCase,
    UpdateConsent,
    UpdateStudentData,
    UploadAttachment,
}

impl fmt::Display for CrmOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrmOperation::CreateCase => "create case",
            CrmOperation::UpdateConsent => "update consent",
            CrmOperation::UpdateStudentData => "update student data",
            CrmOperation::UploadAttachment => "upload attachment",
        };
        f.write_str(name)
    }
}

/// Why a CRM call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCause {
    /// The bearer token was rejected. Retried once with a fresh session.
    SessionExpired,
    RateLimited,
    /// The CRM rejected the payload (unknown field, missing required field, ...)
    SchemaError,
    /// The call did not finish before its deadline.
    Timeout,
    Unknown,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCause::SessionExpired => "session expired",
            FailureCause::RateLimited => "rate limited",
            FailureCause::SchemaError => "schema error",
            FailureCause::Timeout => "timeout",
            FailureCause::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

const SESSION_CODES: &[&str] = &["INVALID_SESSION_ID", "SESSION_EXPIRED"];
const RATE_LIMIT_CODES: &[&str] = &["REQUEST_LIMIT_EXCEEDED", "TOO_MANY_REQUESTS"];
const SCHEMA_CODES: &[&str] = &[
    "INVALID_FIELD",
    "INVALID_FIELD_FOR_INSERT_UPDATE",
    "REQUIRED_FIELD_MISSING",
    "FIELD_CUSTOM_VALIDATION_EXCEPTION",
    "INVALID_TYPE",
    "INVALID_TYPE_ON_FIELD_IN_RECORD",
    "JSON_PARSER_ERROR",
    "STRING_TOO_LONG",
    "MALFORMED_ID",
    "NOT_FOUND",
];

/// A single failed request against the CRM, as reported by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", self.describe())]
pub struct CrmCallError {
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// CRM-specific error code (`errorCode` / OAuth `error`)
    pub error_code: Option<String>,
    pub message: String,
    pub timed_out: bool,
}

impl CrmCallError {
    /// An error response from the CRM.
    pub fn http(status: u16, error_code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            error_code,
            message: message.into(),
            timed_out: false,
        }
    }

    /// The request ran past its deadline.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            status: None,
            error_code: None,
            message: message.into(),
            timed_out: true,
        }
    }

    /// Connection-level failure or an unreadable response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            error_code: None,
            message: message.into(),
            timed_out: false,
        }
    }

    /// Maps the response to a failure cause.
    pub fn cause(&self) -> FailureCause {
        if self.timed_out {
            return FailureCause::Timeout;
        }
        let code = self.error_code.as_deref().unwrap_or_default();
        if self.status == Some(401) || SESSION_CODES.contains(&code) {
            return FailureCause::SessionExpired;
        }
        if self.status == Some(429) || RATE_LIMIT_CODES.contains(&code) {
            return FailureCause::RateLimited;
        }
        if SCHEMA_CODES.contains(&code) {
            return FailureCause::SchemaError;
        }
        FailureCause::Unknown
    }

    /// Wraps the call error as a failure of `operation`.
    pub fn into_operation_error(self, operation: CrmOperation) -> CrmError {
        CrmError::OperationFailed {
            operation,
            cause: self.cause(),
            message: self.describe(),
        }
    }

    fn describe(&self) -> String {
        match (self.status, &self.error_code) {
            (Some(status), Some(code)) => format!("HTTP {} {}: {}", status, code, self.message),
            (Some(status), None) => format!("HTTP {}: {}", status, self.message),
            (None, _) if self.timed_out => format!("timed out: {}", self.message),
            (None, _) => self.message.clone(),
        }
    }
}

/// Errors surfaced by the CRM session manager and sync client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrmError {
    /// No configured credential path produced a usable session
    #[error("CRM authentication unavailable: {}", .reasons.join("; "))]
    AuthenticationUnavailable { reasons: Vec<String> },

    /// A CRM call failed and was not (or no longer) retried
    #[error("CRM {operation} failed ({cause}): {message}")]
    OperationFailed {
        operation: CrmOperation,
        cause: FailureCause,
        message: String,
    },

    /// The CRM integration is misconfigured
    #[error("CRM configuration error: {0}")]
    Configuration(String),
}

impl CrmError {
    pub fn authentication_unavailable(reason: impl Into<String>) -> Self {
        Self::AuthenticationUnavailable {
            reasons: vec![reason.into()],
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// The failure cause, for operation failures.
    pub fn cause(&self) -> Option<FailureCause> {
        match self {
            CrmError::OperationFailed { cause, .. } => Some(*cause),
            _ => None,
        }
    }
}

/// Result type for CRM operations
pub type CrmResult<T> = Result<T, CrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            CrmCallError::http(401, None, "Session expired or invalid").cause(),
            FailureCause::SessionExpired
        );
        assert_eq!(
            CrmCallError::http(400, Some("INVALID_SESSION_ID".into()), "bad").cause(),
            FailureCause::SessionExpired
        );
        assert_eq!(
            CrmCallError::http(429, None, "slow down").cause(),
            FailureCause::RateLimited
        );
        assert_eq!(
            CrmCallError::http(403, Some("REQUEST_LIMIT_EXCEEDED".into()), "limit").cause(),
            FailureCause::RateLimited
        );
        assert_eq!(
            CrmCallError::http(400, Some("INVALID_FIELD".into()), "No such column").cause(),
            FailureCause::SchemaError
        );
        assert_eq!(
            CrmCallError::timeout("after 20s").cause(),
            FailureCause::Timeout
        );
        assert_eq!(
            CrmCallError::http(403, Some("INSUFFICIENT_ACCESS".into()), "denied").cause(),
            FailureCause::Unknown
        );
        assert_eq!(
            CrmCallError::transport("connection refused").cause(),
            FailureCause::Unknown
        );
    }

    #[test]
    fn test_operation_error_message() {
        let err = CrmCallError::http(429, None, "slow down")
            .into_operation_error(CrmOperation::UpdateConsent);
        assert_eq!(err.cause(), Some(FailureCause::RateLimited));
        assert_eq!(
            err.to_string(),
            "CRM update consent failed (rate limited): HTTP 429: slow down"
        );
    }

    #[test]
    fn test_call_error_display() {
        let err: Box<dyn std::error::Error> = Box::new(CrmCallError::http(
            400,
            Some("INVALID_FIELD".into()),
            "No such column",
        ));
        assert_eq!(err.to_string(), "HTTP 400 INVALID_FIELD: No such column");
        assert!(err.source().is_none());
    }
}
