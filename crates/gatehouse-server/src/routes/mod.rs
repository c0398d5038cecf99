//! HTTP route handlers.

pub mod configs;
pub mod health;
pub mod login;
pub mod logout;

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use gatehouse_core::AuthorizedContext;

use crate::auth::CredentialSource;
use crate::error::AppError;
use crate::session::{SessionId, SessionTable, SESSION_COOKIE};
use crate::AppState;

/// The session a request belongs to.
pub(crate) struct RequestSession {
    pub id: SessionId,
    issued: bool,
}

impl RequestSession {
    /// Use the session named by the request's cookie, or issue a new one.
    ///
    /// Ids the server does not know are replaced, so clients cannot choose
    /// their own session id.
    pub fn resolve(headers: &HeaderMap, sessions: &SessionTable) -> Self {
        match session_cookie(headers) {
            Some(id) if sessions.get(&id).is_some() => Self { id, issued: false },
            _ => Self {
                id: SessionId::generate(),
                issued: true,
            },
        }
    }

    /// Attach the session cookie to a response if the session is new.
    pub fn apply(&self, mut response: Response, secure: bool) -> Response {
        if self.issued {
            let cookie = set_session_cookie(self.id.as_str(), secure);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        response
    }
}

/// `Set-Cookie` value carrying `value` as the session cookie.
pub(crate) fn set_session_cookie(value: &str, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Strict", SESSION_COOKIE, value);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Session id from the `Cookie` header, if present and well formed.
pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value.trim()))
}

/// Credential fields submitted with a request.
pub(crate) struct RequestCredentials {
    fields: HashMap<String, String>,
    remote_addr: Option<String>,
}

impl RequestCredentials {
    pub fn new(fields: HashMap<String, String>, remote: Option<ConnectInfo<SocketAddr>>) -> Self {
        Self {
            fields,
            remote_addr: remote.map(|ConnectInfo(addr)| addr.ip().to_string()),
        }
    }
}

impl CredentialSource for RequestCredentials {
    fn credential_field(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    fn remote_addr(&self) -> Option<String> {
        self.remote_addr.clone()
    }
}

/// Authenticate the request's session and run `operation` on success.
///
/// Authentication may stat, read and parse the user mapping, so it runs on
/// the blocking pool. Any denial becomes a bare 403.
pub(crate) async fn authenticated_service<F>(
    state: &AppState,
    headers: &HeaderMap,
    credentials: RequestCredentials,
    operation: F,
) -> Response
where
    F: FnOnce(&AuthorizedContext) -> Response + Send + 'static,
{
    let session = RequestSession::resolve(headers, &state.sessions);
    let authenticator = state.authenticator.clone();
    let id = session.id.clone();

    let result = tokio::task::spawn_blocking(move || {
        authenticator.service(&id, &credentials, operation)
    })
    .await;

    let response = match result {
        Ok(Ok(response)) => response,
        Ok(Err(denied)) => AppError::from(denied).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "authentication task failed");
            AppError::Forbidden.into_response()
        }
    };

    session.apply(response, state.config.secure_cookie)
}
