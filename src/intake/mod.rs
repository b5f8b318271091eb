//! # Intake Module
//!
//! Orchestration entry points used by the web layer.
//!
//! ## Components
//!
//! * `service` - `ReferralService` with `initiate`, `submit_consent`, `submit_student_data` and `link_missing_case`
//! * `payload` - Inbound payloads and their validation
//! * `links` - Consent and student-form URLs

pub mod links;
pub mod payload;
pub mod service;

pub use links::LinkBuilder;
pub use payload::{ConsentPayload, CounselorSubmission, ProofUpload, StudentPayload};
pub use service::{ConsentOutcome, InitiateOutcome, LinkOutcome, ReferralService, StudentDataOutcome};
