//! Referral number generation and validation.
//!
//! Numbers look like `REF-202501-0427`: the year and month of creation
//! followed by a four digit suffix drawn from the operating system RNG.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::Rng;
use regex::Regex;

static REFERRAL_NUMBER_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^REF-\d{6}-\d{4}$").ok());

/// Generates a new referral number for the given creation time.
pub fn generate_referral_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = OsRng.gen_range(0..10_000);
    format!("REF-{}-{:04}", now.format("%Y%m"), suffix)
}

/// Returns true when `candidate` matches `^REF-\d{6}-\d{4}$`.
pub fn is_valid_referral_number(candidate: &str) -> bool {
    REFERRAL_NUMBER_RE
        .as_ref()
        .map(|re| re.is_match(candidate))
        .unwrap_or(false)
}
