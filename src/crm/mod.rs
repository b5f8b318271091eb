//! # CRM Module
//!
//! Keeps the external case-management system in sync with local referrals.
//!
//! ## Components
//!
//! * `session` - Session manager with soft TTL and single-flight refresh
//! * `auth` - Pluggable authentication strategies (JWT bearer, refresh token, static token)
//! * `transport` - The `CrmTransport` seam and its `reqwest` implementation
//! * `mapping` - Local aggregate to CRM field mapping
//! * `client` - Typed operations with the session retry policy
//! * `error` - Failure taxonomy and classification

pub mod auth;
pub mod client;
pub mod error;
pub mod mapping;
pub mod session;
pub mod transport;

use std::sync::Arc;

pub use auth::{AuthError, AuthStrategy, JwtBearerStrategy, RefreshTokenStrategy, StaticTokenStrategy};
pub use client::CrmSyncClient;
pub use error::{CrmCallError, CrmError, CrmOperation, CrmResult, FailureCause};
pub use mapping::{ConsentUpdate, NewCase, StudentDataUpdate};
pub use session::{Clock, Credential, Session, SessionManager, SystemClock};
pub use transport::{CrmTransport, DocumentUpload, RestCrmTransport, TokenGrant};

use crate::config::CrmConfig;

/// Wires a sync client for `config` on top of `transport`.
pub fn build_sync_client(
    config: &CrmConfig,
    transport: Arc<dyn CrmTransport>,
    clock: Arc<dyn Clock>,
) -> CrmSyncClient {
    let strategies = auth::strategies_from_config(config, Arc::clone(&transport), Arc::clone(&clock));
    let sessions = SessionManager::new(strategies, clock)
        .with_soft_ttl(chrono::Duration::minutes(config.session_ttl_minutes as i64));
    CrmSyncClient::new(
        Arc::new(sessions),
        transport,
        config.case_object.clone(),
        config.timeout(),
    )
}

/// Production wiring: `reqwest` transport and the wall clock.
pub fn connect(config: &CrmConfig) -> CrmResult<CrmSyncClient> {
    let transport = RestCrmTransport::new(config.api_version.clone(), config.timeout())?;
    Ok(build_sync_client(
        config,
        Arc::new(transport),
        Arc::new(SystemClock),
    ))
}
