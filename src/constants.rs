/// Common constants used across the referral intake crate.
///
/// These defaults are used for configuration when explicit values are not
/// provided.
use std::time::Duration;

/// Cached CRM sessions older than this are re-authenticated. Kept below the
/// provider's ~60 minute token lifetime.
pub const SESSION_SOFT_TTL: Duration = Duration::from_secs(50 * 60);

/// Lifetime of the signed JWT assertion exchanged at the token endpoint.
pub const ASSERTION_LIFETIME_SECS: i64 = 5 * 60;

/// Default per-call deadline for CRM requests.
pub const DEFAULT_CRM_TIMEOUT_SECS: u64 = 20;

/// Upper bound accepted for any configured network timeout.
pub const MAX_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_CRM_API_VERSION: &str = "v59.0";
pub const DEFAULT_CRM_CASE_OBJECT: &str = "Referral__c";
pub const DEFAULT_CRM_LOGIN_URL: &str = "https://login.salesforce.com";

pub const DEFAULT_CONFIG_PATH: &str = "config/referral_config.json";
pub const CONFIG_PATH_ENV: &str = "REFERRAL_CONFIG";
pub const DEFAULT_STORAGE_PATH: &str = "data/referrals";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

pub const DEFAULT_ORGANIZATION_NAME: &str = "Youth Referral Program";

/// Attempts made to find an unused referral number before giving up.
pub const REFERRAL_NUMBER_ATTEMPTS: usize = 5;

/// Inclusive upper bound of the risk score scale.
pub const MAX_RISK_LEVEL: u8 = 10;

/// Largest consent-proof file accepted at intake.
pub const MAX_PROOF_BYTES: usize = 10 * 1024 * 1024;
