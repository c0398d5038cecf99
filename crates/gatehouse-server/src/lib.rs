//! Gatehouse Server - session authentication gateway.
//!
//! This crate wires a [`gatehouse_core`] authentication provider into a
//! per-session authentication flow with pluggable event listeners, and
//! exposes it over HTTP: login, the authorized connection list and logout.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod session;

pub use auth::{
    AuthenticationListener, CredentialSource, Denied, ListenerCatalog, ListenerRegistry,
    ProviderRegistry, SessionAuthenticator,
};
pub use config::{Args, ServerConfig};
pub use error::{AppError, Error, Result};
pub use session::{cleanup_task, SessionId, SessionTable};

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Session authenticator.
    pub authenticator: Arc<SessionAuthenticator>,
    /// Live sessions.
    pub sessions: Arc<SessionTable>,
    /// Server configuration.
    pub config: ServerConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(authenticator: SessionAuthenticator, config: ServerConfig) -> Self {
        let sessions = authenticator.sessions().clone();
        Self {
            authenticator: Arc::new(authenticator),
            sessions,
            config,
        }
    }

    /// Build the provider and listeners named by the configuration.
    ///
    /// Unknown identifiers and provider start-up failures are reported here,
    /// before the server accepts requests.
    pub fn from_config(
        config: ServerConfig,
        providers: &ProviderRegistry,
        listeners: &ListenerCatalog,
    ) -> Result<Self> {
        let registry = listeners.resolve(&config.event_listeners)?;
        let provider = providers.create(&config)?;

        tracing::info!(
            provider = %provider.name(),
            listeners = ?registry.identifiers(),
            "authentication configured"
        );

        let sessions = Arc::new(
            SessionTable::new(config.session_timeout)
                .with_pending_timeout(config.pending_session_timeout),
        );
        let authenticator = SessionAuthenticator::new(provider, registry, sessions);

        Ok(Self::new(authenticator, config))
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::routes())
        .merge(routes::login::routes())
        .merge(routes::configs::routes())
        .merge(routes::logout::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
