//! CRM session management.
//!
//! [`SessionManager`] is a long-lived service object that owns the cached CRM
//! credential. It re-authenticates through the configured strategy chain
//! once the cached session passes its soft TTL, and guarantees that
//! concurrent callers share a single authentication attempt.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::auth::AuthStrategy;
use super::error::{CrmError, CrmResult};
use crate::constants::SESSION_SOFT_TTL;
use crate::{log_crm_debug, log_crm_info, log_crm_warn};

/// Source of the current time. Injected so TTL handling can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What an authentication strategy hands back on success.
pub struct Credential {
    pub access_token: SecretString,
    pub instance_url: String,
    /// False for long-lived static tokens, which are never refreshed.
    pub refreshable: bool,
}

/// An authenticated CRM session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    access_token: Arc<SecretString>,
    instance_url: String,
    issued_at: DateTime<Utc>,
    strategy: &'static str,
    refreshable: bool,
    generation: u64,
}

impl Session {
    pub fn new(
        credential: Credential,
        issued_at: DateTime<Utc>,
        strategy: &'static str,
        generation: u64,
    ) -> Self {
        Self {
            access_token: Arc::new(credential.access_token),
            instance_url: credential.instance_url.trim_end_matches('/').to_string(),
            issued_at,
            strategy,
            refreshable: credential.refreshable,
            generation,
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Base URL every CRM request is made against.
    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Name of the strategy that produced this session.
    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    pub fn is_refreshable(&self) -> bool {
        self.refreshable
    }

    /// Short, non-reversible token fingerprint that is safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.access_token.expose_secret().as_bytes());
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("instance_url", &self.instance_url)
            .field("issued_at", &self.issued_at)
            .field("strategy", &self.strategy)
            .field("refreshable", &self.refreshable)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

type SharedAuthentication = Shared<BoxFuture<'static, CrmResult<Session>>>;

#[derive(Default)]
struct SessionState {
    cached: Option<Session>,
    /// In-flight authentication and the ticket that identifies it.
    inflight: Option<(u64, SharedAuthentication)>,
}

/// Owns the cached CRM session.
pub struct SessionManager {
    strategies: Arc<Vec<Arc<dyn AuthStrategy>>>,
    clock: Arc<dyn Clock>,
    soft_ttl: chrono::Duration,
    state: Mutex<SessionState>,
    next_ticket: AtomicU64,
}

impl SessionManager {
    /// Strategies are tried in order; the first one that succeeds wins.
    pub fn new(strategies: Vec<Arc<dyn AuthStrategy>>, clock: Arc<dyn Clock>) -> Self {
        let soft_ttl = chrono::Duration::from_std(SESSION_SOFT_TTL)
            .unwrap_or_else(|_| chrono::Duration::minutes(50));
        Self {
            strategies: Arc::new(strategies),
            clock,
            soft_ttl,
            state: Mutex::new(SessionState::default()),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Overrides the soft TTL.
    pub fn with_soft_ttl(mut self, soft_ttl: chrono::Duration) -> Self {
        self.soft_ttl = soft_ttl;
        self
    }

    pub fn soft_ttl(&self) -> chrono::Duration {
        self.soft_ttl
    }

    /// Names of the configured strategies, in the order they are tried.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Returns a usable session, authenticating if the cache is empty or stale.
    pub async fn obtain(&self) -> CrmResult<Session> {
        let (ticket, flight) = {
            let mut state = self.lock_state();
            if let Some(session) = &state.cached {
                if self.is_fresh(session) {
                    return Ok(session.clone());
                }
                log_crm_debug!(
                    "Cached CRM session {} is past its soft TTL",
                    session.fingerprint()
                );
            }

            match &state.inflight {
                Some((ticket, flight)) => (*ticket, flight.clone()),
                None => {
                    let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
                    let flight = authenticate(
                        Arc::clone(&self.strategies),
                        Arc::clone(&self.clock),
                        ticket,
                    )
                    .boxed()
                    .shared();
                    state.inflight = Some((ticket, flight.clone()));
                    (ticket, flight)
                }
            }
        };

        let result = flight.await;

        let mut state = self.lock_state();
        if matches!(&state.inflight, Some((current, _)) if *current == ticket) {
            state.inflight = None;
            if let Ok(session) = &result {
                state.cached = Some(session.clone());
            }
        }
        result
    }

    /// Drops the cached session if it is still `session`. A newer session
    /// obtained by another caller in the meantime is kept.
    pub fn invalidate(&self, session: &Session) {
        let mut state = self.lock_state();
        if matches!(&state.cached, Some(cached) if cached.generation == session.generation) {
            log_crm_info!(
                "Discarding rejected CRM session {}",
                session.fingerprint()
            );
            state.cached = None;
        }
    }

    /// Whether a session is currently cached, fresh or not.
    pub fn has_cached_session(&self) -> bool {
        self.lock_state().cached.is_some()
    }

    fn is_fresh(&self, session: &Session) -> bool {
        if !session.refreshable {
            return true;
        }
        self.clock.now() - session.issued_at < self.soft_ttl
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs the strategy chain once.
async fn authenticate(
    strategies: Arc<Vec<Arc<dyn AuthStrategy>>>,
    clock: Arc<dyn Clock>,
    ticket: u64,
) -> CrmResult<Session> {
    if strategies.is_empty() {
        return Err(CrmError::authentication_unavailable(
            "no CRM credential strategy is configured",
        ));
    }

    let mut reasons = Vec::new();
    for strategy in strategies.iter() {
        match strategy.authenticate().await {
            Ok(credential) => {
                let session = Session::new(credential, clock.now(), strategy.name(), ticket);
                if session.refreshable {
                    log_crm_info!(
                        "Authenticated with CRM via {} (session {})",
                        strategy.name(),
                        session.fingerprint()
                    );
                } else {
                    log_crm_warn!(
                        "Using static CRM token (session {}); it will not be refreshed",
                        session.fingerprint()
                    );
                }
                return Ok(session);
            }
            Err(e) => {
                log_crm_warn!(
                    "CRM authentication via {} failed: {}",
                    strategy.name(),
                    e
                );
                reasons.push(format!("{}: {}", strategy.name(), e));
            }
        }
    }

    Err(CrmError::AuthenticationUnavailable { reasons })
}
