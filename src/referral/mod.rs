//! # Referral Module
//!
//! The referral aggregate, its lifecycle state machine and referral number
//! handling.
//!
//! ## Components
//!
//! * `model` - The `Referral` aggregate and its contact/consent/student parts
//! * `state` - Legal statuses, transitions and derived priority
//! * `number` - `REF-YYYYMM-NNNN` generation and validation

pub mod model;
pub mod number;
pub mod state;

pub use model::{
    ConsentMethod, ConsentProof, ConsentRecord, CounselorContact, ParentContact, Referral,
    SignatureImage, StudentDetails,
};
pub use number::{generate_referral_number, is_valid_referral_number};
pub use state::{Priority, ReferralStatus, Transition, TransitionRejected, TransitionWarning, Trigger};
