//! # Referral Intake Library
//!
//! Intake of youth-referral cases through a counselor, parent and case-worker
//! workflow. Every referral lives in a local store that drives the web flow,
//! and is mirrored into an external CRM that holds the authoritative case
//! record.
//!
//! ## Core Components
//!
//! * `referral` - The referral aggregate and its lifecycle state machine
//! * `store` - sled-backed local storage keyed by referral number
//! * `crm` - Session management, authentication strategies and the CRM sync client
//! * `notify` - Best-effort email/SMS notifications
//! * `intake` - Orchestration entry points (`initiate`, `submit_consent`, `submit_student_data`)
//! * `config` - JSON configuration with environment overrides
//! * `logging` - `env_logger` setup and feature-scoped logging macros
//! * `testing` - In-memory doubles for the CRM and notification providers
//!
//! ## Architecture
//!
//! An entry point validates its input and asks the state machine for the
//! target status. The local store is written first, so a case is never lost
//! when the CRM is unreachable. The CRM write follows, through a session
//! manager that refreshes credentials and retries once on an expired
//! session. Notifications go out last and can never fail the operation.

pub mod config;
pub mod constants;
pub mod crm;
pub mod error;
pub mod intake;
pub mod logging;
pub mod notify;
pub mod referral;
pub mod store;
pub mod testing;
pub mod utils;

// Re-export main types for convenience
pub use config::{load_intake_config, IntakeConfig};
pub use error::{ReferralError, ReferralResult};
pub use intake::{
    ConsentOutcome, ConsentPayload, CounselorSubmission, InitiateOutcome, ReferralService,
    StudentDataOutcome, StudentPayload,
};
pub use referral::{ConsentMethod, Priority, Referral, ReferralStatus};
pub use store::ReferralStore;
