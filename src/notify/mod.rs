//! # Notification Module
//!
//! Best-effort email/SMS side effects of referral milestones. Nothing in
//! here can fail an intake operation.
//!
//! ## Components
//!
//! * `message` - Events, recipients and plain-text rendering
//! * `provider` - `EmailProvider` / `SmsProvider` seams with HTTP and log-only implementations
//! * `destination` - Destination branding and house-manager lookup
//! * `dispatcher` - Fan-out with the sender-not-verified email fallback
//! * `error` - Provider error codes and `NotificationError`

pub mod destination;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod provider;

pub use destination::{Branding, DestinationDirectory};
pub use dispatcher::{Channel, Delivery, DispatchReport, NotificationDispatcher, NotificationFailed};
pub use error::{NotificationError, ProviderError, ProviderErrorCode};
pub use message::{EventKind, NotificationEvent, Recipient, RecipientRole};
pub use provider::{
    EmailMessage, EmailProvider, HttpEmailProvider, HttpSmsProvider, LogOnlyProvider,
    SendReceipt, SmsMessage, SmsProvider,
};
