//! Logout endpoint.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};

use super::{session_cookie, set_session_cookie};
use crate::AppState;

/// Logout routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/logout", post(logout))
}

/// End the session and expire its cookie.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(id) = session_cookie(&headers) {
        if state.sessions.invalidate(&id) {
            tracing::info!(session = %id, "session ended");
        }
    }

    let expired = format!(
        "{}; Max-Age=0",
        set_session_cookie("", state.config.secure_cookie)
    );
    (StatusCode::NO_CONTENT, [(SET_COOKIE, expired)])
}
