//! Validation helpers shared by the intake payloads
//!
//! Every helper returns `ReferralError::Validation` naming the offending field.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ReferralError, ReferralResult};
use crate::referral::is_valid_referral_number;

static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Validation utilities for common patterns
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validates that a string is not empty or whitespace
    pub fn require_non_empty_string(value: &str, field_name: &str) -> ReferralResult<()> {
        if value.trim().is_empty() {
            return Err(ReferralError::validation(format!(
                "{} cannot be empty",
                field_name
            )));
        }
        Ok(())
    }

    /// Validates that a collection is not empty
    pub fn require_non_empty_collection<T>(
        collection: &[T],
        field_name: &str,
    ) -> ReferralResult<()> {
        if collection.is_empty() {
            return Err(ReferralError::validation(format!(
                "{} cannot be empty",
                field_name
            )));
        }
        Ok(())
    }

    pub fn require_valid_email(value: &str, field_name: &str) -> ReferralResult<()> {
        Self::require_non_empty_string(value, field_name)?;
        let valid = EMAIL_PATTERN
            .as_ref()
            .map(|re| re.is_match(value.trim()))
            .unwrap_or(false);
        if !valid {
            return Err(ReferralError::validation(format!(
                "{} is not a valid email address",
                field_name
            )));
        }
        Ok(())
    }

    /// Accepts 7 to 15 digits with an optional leading `+` and common
    /// separators (spaces, dashes, parentheses).
    pub fn require_valid_phone(value: &str, field_name: &str) -> ReferralResult<()> {
        Self::require_non_empty_string(value, field_name)?;
        let trimmed = value.trim();
        let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let separators_ok = body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'));
        let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
        if !separators_ok || !(7..=15).contains(&digits) {
            return Err(ReferralError::validation(format!(
                "{} is not a valid phone number",
                field_name
            )));
        }
        Ok(())
    }

    /// Validates the `REF-YYYYMM-NNNN` format
    pub fn require_valid_referral_number(value: &str) -> ReferralResult<()> {
        if !is_valid_referral_number(value) {
            return Err(ReferralError::validation(format!(
                "'{}' is not a valid referral number",
                value
            )));
        }
        Ok(())
    }

    pub fn require_in_range(value: i64, min: i64, max: i64, field_name: &str) -> ReferralResult<()> {
        if value < min || value > max {
            return Err(ReferralError::validation(format!(
                "{} must be between {} and {}",
                field_name, min, max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_non_empty_string() {
        assert!(ValidationUtils::require_non_empty_string("valid", "test").is_ok());
        assert!(ValidationUtils::require_non_empty_string("", "test").is_err());
        assert!(ValidationUtils::require_non_empty_string("   ", "test").is_err());
    }

    #[test]
    fn test_require_valid_email() {
        assert!(ValidationUtils::require_valid_email("dana@school.example", "email").is_ok());
        assert!(ValidationUtils::require_valid_email("dana@school", "email").is_err());
        assert!(ValidationUtils::require_valid_email("not an email", "email").is_err());
    }

    #[test]
    fn test_require_valid_phone() {
        assert!(ValidationUtils::require_valid_phone("050-123-4567", "phone").is_ok());
        assert!(ValidationUtils::require_valid_phone("+972 50 123 4567", "phone").is_ok());
        assert!(ValidationUtils::require_valid_phone("12345", "phone").is_err());
        assert!(ValidationUtils::require_valid_phone("050-CALL-ME", "phone").is_err());
    }

    #[test]
    fn test_require_valid_referral_number() {
        assert!(ValidationUtils::require_valid_referral_number("REF-202501-0042").is_ok());
        let err = ValidationUtils::require_valid_referral_number("REF-2025-42").unwrap_err();
        assert!(matches!(err, ReferralError::Validation(_)));
    }

    #[test]
    fn test_require_in_range() {
        assert!(ValidationUtils::require_in_range(10, 0, 10, "risk_level").is_ok());
        assert!(ValidationUtils::require_in_range(11, 0, 10, "risk_level").is_err());
        assert!(ValidationUtils::require_in_range(-1, 0, 10, "risk_level").is_err());
    }
}
