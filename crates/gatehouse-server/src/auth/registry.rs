//! Listener registration and per-session instantiation.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::listener::{AuditLogListener, AuthenticationListener, ListenerError, ListenerSet};
use crate::error::{Error, Result};
use crate::session::SessionSlot;

/// Creates a fresh listener instance.
pub type ListenerFactory = Arc<
    dyn Fn() -> std::result::Result<Arc<dyn AuthenticationListener>, ListenerError> + Send + Sync,
>;

/// Listener types available to configuration, keyed by identifier.
#[derive(Clone, Default)]
pub struct ListenerCatalog {
    factories: BTreeMap<String, ListenerFactory>,
}

impl ListenerCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding the built-in listeners.
    pub fn with_builtins() -> Self {
        Self::new().with_listener(AuditLogListener::NAME, || {
            Ok(Arc::new(AuditLogListener) as Arc<dyn AuthenticationListener>)
        })
    }

    /// Register a listener type.
    pub fn with_listener<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> std::result::Result<Arc<dyn AuthenticationListener>, ListenerError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
        self
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    /// Resolve configured identifiers into a registry.
    ///
    /// Unknown identifiers are a configuration error.
    pub fn resolve(&self, ids: &[String]) -> Result<ListenerRegistry> {
        let mut entries = Vec::with_capacity(ids.len());

        for id in ids {
            let factory = self.factories.get(id).ok_or_else(|| {
                Error::Config(format!(
                    "unknown event listener \"{}\" (available: {})",
                    id,
                    self.identifiers().join(", ")
                ))
            })?;
            entries.push((id.clone(), factory.clone()));
        }

        Ok(ListenerRegistry { entries })
    }
}

impl std::fmt::Debug for ListenerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.identifiers()).finish()
    }
}

/// The configured, ordered listener types.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    entries: Vec<(String, ListenerFactory)>,
}

impl ListenerRegistry {
    /// A registry with no listeners.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Configured identifiers in notification order.
    pub fn identifiers(&self) -> Vec<&str> {
        self.entries.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Create one instance of every configured listener.
    ///
    /// Fails as a whole if any listener cannot be created.
    pub fn instantiate(&self) -> Result<ListenerSet> {
        let mut listeners = Vec::with_capacity(self.entries.len());

        for (id, factory) in &self.entries {
            let listener = factory().map_err(|source| Error::Listener {
                listener: id.clone(),
                source,
            })?;
            listeners.push(listener);
        }

        Ok(ListenerSet::new(listeners))
    }

    /// The listener set of a session, created on first use.
    pub fn listeners_for(&self, slot: &SessionSlot) -> Result<Arc<ListenerSet>> {
        slot.listeners_or_try_init(|| {
            let listeners = self.instantiate()?;
            tracing::debug!(
                session = %slot.id(),
                listeners = ?listeners.names(),
                "session listeners created"
            );
            Ok(listeners)
        })
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.identifiers()).finish()
    }
}
