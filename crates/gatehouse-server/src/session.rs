//! Session side table.
//!
//! Per-session authentication state and listener sets, keyed by the id
//! carried in the session cookie.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use gatehouse_core::{AuthorizedContext, Credentials};
use parking_lot::RwLock;

use crate::auth::ListenerSet;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "GATEHOUSE_SESSION";

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Accept a client-supplied identifier if it is well formed.
    pub fn parse(value: &str) -> Option<Self> {
        uuid::Uuid::parse_str(value)
            .ok()
            .map(|id| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authorization result cached for a session.
#[derive(Debug)]
pub struct AuthenticatedSession {
    pub context: AuthorizedContext,
    pub credentials: Credentials,
}

/// State kept for one session.
pub struct SessionSlot {
    id: SessionId,
    last_activity: AtomicU64,
    authenticated: RwLock<Option<Arc<AuthenticatedSession>>>,
    listeners: RwLock<Option<Arc<ListenerSet>>>,
}

impl SessionSlot {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            last_activity: AtomicU64::new(now_timestamp()),
            authenticated: RwLock::new(None),
            listeners: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn touch(&self) {
        self.last_activity.store(now_timestamp(), Ordering::SeqCst);
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        let last = self.last_activity.load(Ordering::SeqCst);
        now_timestamp().saturating_sub(last) > timeout.as_secs()
    }

    /// The cached authorization, if this session has authenticated.
    pub fn authenticated(&self) -> Option<Arc<AuthenticatedSession>> {
        self.authenticated.read().clone()
    }

    /// Cache an authorization for this session.
    pub fn set_authenticated(&self, session: Arc<AuthenticatedSession>) {
        *self.authenticated.write() = Some(session);
    }

    /// The cached listener set, if one was built.
    pub fn listeners(&self) -> Option<Arc<ListenerSet>> {
        self.listeners.read().clone()
    }

    /// The cached listener set, building it with `init` on first use.
    ///
    /// If two requests race, both may build a set but only the first one
    /// stored is ever returned.
    pub fn listeners_or_try_init<E>(
        &self,
        init: impl FnOnce() -> Result<ListenerSet, E>,
    ) -> Result<Arc<ListenerSet>, E> {
        if let Some(listeners) = self.listeners.read().as_ref() {
            return Ok(listeners.clone());
        }

        let built = Arc::new(init()?);
        let mut guard = self.listeners.write();
        Ok(guard.get_or_insert(built).clone())
    }

    /// Drop all cached state.
    fn clear(&self) {
        *self.authenticated.write() = None;
        *self.listeners.write() = None;
    }
}

impl std::fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSlot")
            .field("id", &self.id)
            .field("authenticated", &self.authenticated.read().is_some())
            .finish()
    }
}

fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// All live sessions.
///
/// Sessions that never authenticated expire after the pending timeout,
/// authenticated ones after the regular idle timeout.
#[derive(Debug)]
pub struct SessionTable {
    sessions: DashMap<SessionId, Arc<SessionSlot>>,
    timeout: Duration,
    pending_timeout: Duration,
}

impl SessionTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            timeout,
            pending_timeout: timeout,
        }
    }

    /// Set the idle timeout for sessions that have not authenticated.
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }

    /// The slot for `id`, created if the session is new.
    pub fn slot(&self, id: &SessionId) -> Arc<SessionSlot> {
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(SessionSlot::new(id.clone())))
            .clone()
    }

    /// The slot for `id`, if the session exists.
    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionSlot>> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    /// End a session, discarding its cached state.
    pub fn invalidate(&self, id: &SessionId) -> bool {
        match self.sessions.remove(id) {
            Some((_, slot)) => {
                slot.clear();
                true
            }
            None => false,
        }
    }

    /// Discard sessions idle for longer than their timeout.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.sessions.len();

        self.sessions.retain(|_, slot| {
            let timeout = if slot.authenticated().is_some() {
                self.timeout
            } else {
                self.pending_timeout
            };
            let keep = !slot.is_expired(timeout);
            if !keep {
                slot.clear();
            }
            keep
        });

        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Background task to periodically clean up expired sessions.
pub async fn cleanup_task(table: Arc<SessionTable>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let cleaned = table.cleanup_expired();
        if cleaned > 0 {
            tracing::info!(cleaned, remaining = table.len(), "expired sessions removed");
        }
    }
}
