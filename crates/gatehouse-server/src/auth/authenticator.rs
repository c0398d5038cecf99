//! Per-request session authentication.

use std::collections::HashMap;
use std::sync::Arc;

use gatehouse_core::{AuthenticationProvider, AuthorizedContext, Credentials, Verdict};
use thiserror::Error;

use super::listener::{ListenerSet, SuccessOutcome};
use super::registry::ListenerRegistry;
use crate::session::{AuthenticatedSession, SessionId, SessionTable};

/// Access to the credential fields of an incoming request.
pub trait CredentialSource {
    /// Value of a submitted field such as `username` or `password`.
    fn credential_field(&self, name: &str) -> Option<String>;

    /// Address of the remote client, for logging.
    fn remote_addr(&self) -> Option<String> {
        None
    }
}

impl CredentialSource for HashMap<String, String> {
    fn credential_field(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Why an authentication attempt was denied. Never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The session's listeners could not be created.
    ListenersUnavailable,
    /// The provider failed while checking the credentials.
    ProviderFailed,
    /// No mapping entry exists for the username.
    UnknownUser,
    /// The entry exists but the password does not match.
    PasswordMismatch,
    /// Username or password was not supplied.
    MissingCredentials,
    /// A listener cancelled the authentication.
    Vetoed,
    /// A listener failed during the success notification.
    ListenerFailed,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            DenialReason::ListenersUnavailable => "listeners unavailable",
            DenialReason::ProviderFailed => "provider failed",
            DenialReason::UnknownUser => "unknown user",
            DenialReason::PasswordMismatch => "password mismatch",
            DenialReason::MissingCredentials => "missing credentials",
            DenialReason::Vetoed => "vetoed by listener",
            DenialReason::ListenerFailed => "listener failed",
        };
        f.write_str(reason)
    }
}

/// Authentication was denied.
#[derive(Debug, Clone, Copy, Error)]
#[error("access denied")]
pub struct Denied {
    reason: DenialReason,
}

impl Denied {
    fn new(reason: DenialReason) -> Self {
        Self { reason }
    }

    pub fn reason(&self) -> DenialReason {
        self.reason
    }
}

/// Authenticates requests and caches the result in the session.
pub struct SessionAuthenticator {
    provider: Arc<dyn AuthenticationProvider>,
    listeners: ListenerRegistry,
    sessions: Arc<SessionTable>,
}

impl SessionAuthenticator {
    pub fn new(
        provider: Arc<dyn AuthenticationProvider>,
        listeners: ListenerRegistry,
        sessions: Arc<SessionTable>,
    ) -> Self {
        Self {
            provider,
            listeners,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    pub fn provider(&self) -> &Arc<dyn AuthenticationProvider> {
        &self.provider
    }

    /// Run `operation` for the session, authenticating it first if needed.
    pub fn service<T>(
        &self,
        session: &SessionId,
        request: &dyn CredentialSource,
        operation: impl FnOnce(&AuthorizedContext) -> T,
    ) -> Result<T, Denied> {
        let authenticated = self.authenticate(session, request)?;
        Ok(operation(&authenticated.context))
    }

    /// Return the session's cached authorization, or authenticate the
    /// request's credentials and cache the result.
    ///
    /// Rejections are not cached: the next request tries again.
    pub fn authenticate(
        &self,
        session: &SessionId,
        request: &dyn CredentialSource,
    ) -> Result<Arc<AuthenticatedSession>, Denied> {
        let slot = self.sessions.slot(session);
        slot.touch();

        if let Some(authenticated) = slot.authenticated() {
            return Ok(authenticated);
        }

        let listeners = match self.listeners.listeners_for(&slot) {
            Ok(listeners) => listeners,
            Err(e) => {
                tracing::error!(
                    session = %session,
                    error = %e,
                    "failed to retrieve listeners, authentication canceled"
                );
                return Err(Denied::new(DenialReason::ListenersUnavailable));
            }
        };

        let credentials = Credentials {
            username: request.credential_field("username"),
            password: request.credential_field("password"),
            remote_addr: request.remote_addr(),
            session_id: Some(session.to_string()),
        };

        let configurations = match self.provider.check(&credentials) {
            Ok(Verdict::Authorized(configurations)) => configurations,
            Ok(Verdict::UnknownUser) => {
                return Err(self.reject(&listeners, &credentials, DenialReason::UnknownUser));
            }
            Ok(Verdict::PasswordMismatch) => {
                return Err(self.reject(&listeners, &credentials, DenialReason::PasswordMismatch));
            }
            Ok(Verdict::MissingCredentials) => {
                return Err(self.reject(&listeners, &credentials, DenialReason::MissingCredentials));
            }
            Err(e) => {
                tracing::error!(
                    username = %credentials.username_or_empty(),
                    provider = %self.provider.name(),
                    error = %e,
                    "error retrieving context for user"
                );
                listeners.notify_failure(&credentials);
                return Err(Denied::new(DenialReason::ProviderFailed));
            }
        };
        let context = AuthorizedContext::new(credentials.username_or_empty(), configurations);

        tracing::info!(
            username = %context.username,
            remote_addr = ?credentials.remote_addr,
            "user successfully authenticated"
        );

        match listeners.notify_success(&credentials) {
            SuccessOutcome::Allowed => {}
            SuccessOutcome::Vetoed { listener } => {
                tracing::info!(
                    username = %context.username,
                    listener = %listener,
                    "successful authentication canceled by hook"
                );
                return Err(Denied::new(DenialReason::Vetoed));
            }
            SuccessOutcome::Failed { listener, error } => {
                tracing::error!(
                    username = %context.username,
                    listener = %listener,
                    error = %error,
                    "successful authentication canceled by error in hook"
                );
                return Err(Denied::new(DenialReason::ListenerFailed));
            }
        }

        let authenticated = Arc::new(AuthenticatedSession {
            context,
            credentials,
        });
        slot.set_authenticated(authenticated.clone());

        Ok(authenticated)
    }

    /// Log a rejected attempt and notify the failure listeners.
    fn reject(
        &self,
        listeners: &ListenerSet,
        credentials: &Credentials,
        reason: DenialReason,
    ) -> Denied {
        tracing::warn!(
            username = %credentials.username_or_empty(),
            remote_addr = ?credentials.remote_addr,
            reason = %reason,
            "authentication attempt failed"
        );
        listeners.notify_failure(credentials);
        Denied::new(reason)
    }
}

impl std::fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("provider", &self.provider.name())
            .field("listeners", &self.listeners)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
