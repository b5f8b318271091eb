//! Notification error types

use std::fmt;
use thiserror::Error;

/// Structured failure classes reported by providers.
///
/// Providers map their own responses onto these codes; the dispatcher never
/// inspects message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// The sender identity is not verified with the provider
    SenderNotVerified,
    InvalidRecipient,
    Unauthorized,
    RateLimited,
    /// Network failure or timeout
    Transport,
    /// Any other rejection
    Rejected,
}

impl ProviderErrorCode {
    /// Parses a provider error code string (`sender_not_verified`, ...).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().replace('-', "_").as_str() {
            "sender_not_verified" | "unverified_sender" | "from_address_not_verified" => {
                Some(Self::SenderNotVerified)
            }
            "invalid_recipient" | "invalid_to" | "invalid_phone_number" => {
                Some(Self::InvalidRecipient)
            }
            "unauthorized" | "invalid_api_key" | "forbidden" => Some(Self::Unauthorized),
            "rate_limited" | "too_many_requests" => Some(Self::RateLimited),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderErrorCode::SenderNotVerified => "sender not verified",
            ProviderErrorCode::InvalidRecipient => "invalid recipient",
            ProviderErrorCode::Unauthorized => "unauthorized",
            ProviderErrorCode::RateLimited => "rate limited",
            ProviderErrorCode::Transport => "transport",
            ProviderErrorCode::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A failed send, as reported by a provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Transport, message)
    }
}

/// Errors of the notification subsystem. Recorded and logged by the
/// dispatcher, never propagated to the intake entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("email delivery failed: {0}")]
    Email(ProviderError),

    #[error("SMS delivery failed: {0}")]
    Sms(ProviderError),

    /// No provider is configured for the channel
    #[error("no {0} provider configured")]
    ChannelUnavailable(&'static str),

    /// The notification provider could not be constructed
    #[error("notification configuration error: {0}")]
    Configuration(String),
}
