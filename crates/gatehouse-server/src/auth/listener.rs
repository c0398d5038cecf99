//! Authentication event listeners.
//!
//! Listeners observe authentication outcomes. Failure notifications are
//! informational: every listener is told, and errors are only logged.
//! Success notifications are a vote: any listener may cancel the login by
//! returning `false` or an error, and later listeners are not consulted.

use std::sync::Arc;

use gatehouse_core::Credentials;
use thiserror::Error;

/// Error raised by a listener.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Observer of authentication outcomes.
///
/// Both hooks have permissive defaults, so a listener only implements the
/// events it cares about.
pub trait AuthenticationListener: Send + Sync {
    /// Identifier used in log output.
    fn name(&self) -> &str;

    /// Called after the provider accepted the credentials.
    ///
    /// Returning `Ok(false)` or an error cancels the authentication.
    fn authentication_succeeded(&self, _credentials: &Credentials) -> Result<bool, ListenerError> {
        Ok(true)
    }

    /// Called after the provider rejected the credentials or failed.
    fn authentication_failed(&self, _credentials: &Credentials) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Result of notifying listeners of a successful authentication.
#[derive(Debug, Clone)]
pub enum SuccessOutcome {
    /// Every listener allowed the authentication.
    Allowed,
    /// A listener returned `false`.
    Vetoed { listener: String },
    /// A listener failed.
    Failed {
        listener: String,
        error: ListenerError,
    },
}

impl SuccessOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, SuccessOutcome::Allowed)
    }
}

/// Ordered listeners attached to one session.
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn AuthenticationListener>>,
}

impl ListenerSet {
    pub fn new(listeners: Vec<Arc<dyn AuthenticationListener>>) -> Self {
        Self { listeners }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Listener names in notification order.
    pub fn names(&self) -> Vec<&str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }

    /// Notify every listener of a failed authentication.
    pub fn notify_failure(&self, credentials: &Credentials) {
        for listener in &self.listeners {
            if let Err(e) = listener.authentication_failed(credentials) {
                tracing::error!(
                    listener = %listener.name(),
                    error = %e,
                    "error notifying authentication failure listener"
                );
            }
        }
    }

    /// Notify listeners of a successful authentication, stopping at the
    /// first one that cancels it.
    pub fn notify_success(&self, credentials: &Credentials) -> SuccessOutcome {
        for listener in &self.listeners {
            match listener.authentication_succeeded(credentials) {
                Ok(true) => continue,
                Ok(false) => {
                    return SuccessOutcome::Vetoed {
                        listener: listener.name().to_string(),
                    }
                }
                Err(error) => {
                    return SuccessOutcome::Failed {
                        listener: listener.name().to_string(),
                        error,
                    }
                }
            }
        }

        SuccessOutcome::Allowed
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Listener that writes every authentication event to the log.
#[derive(Debug, Default)]
pub struct AuditLogListener;

impl AuditLogListener {
    /// Identifier under which this listener is registered.
    pub const NAME: &'static str = "audit-log";
}

impl AuthenticationListener for AuditLogListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn authentication_succeeded(&self, credentials: &Credentials) -> Result<bool, ListenerError> {
        tracing::info!(
            target: "gatehouse_server::audit",
            username = %credentials.username_or_empty(),
            remote_addr = ?credentials.remote_addr,
            session = ?credentials.session_id,
            "authentication succeeded"
        );
        Ok(true)
    }

    fn authentication_failed(&self, credentials: &Credentials) -> Result<(), ListenerError> {
        tracing::warn!(
            target: "gatehouse_server::audit",
            username = %credentials.username_or_empty(),
            remote_addr = ?credentials.remote_addr,
            session = ?credentials.session_id,
            "authentication failed"
        );
        Ok(())
    }
}
