//! Session authentication for the Gatehouse server.
//!
//! A request is authenticated at most once per session. The configured
//! [`AuthenticationProvider`](gatehouse_core::AuthenticationProvider)
//! checks the submitted credentials, the session's event listeners are
//! notified of the outcome, and a successful result is cached in the
//! session table.
//!
//! # Configuration identifiers
//!
//! Providers and listeners are selected by identifier:
//!
//! ```text
//! GATEHOUSE_AUTH_PROVIDER="basic-file"
//! GATEHOUSE_EVENT_LISTENERS="audit-log"
//! ```

mod authenticator;
mod listener;
mod provider;
mod registry;

pub use authenticator::{CredentialSource, DenialReason, Denied, SessionAuthenticator};
pub use listener::{
    AuditLogListener, AuthenticationListener, ListenerError, ListenerSet, SuccessOutcome,
};
pub use provider::{ProviderFactory, ProviderRegistry};
pub use registry::{ListenerCatalog, ListenerFactory, ListenerRegistry};
