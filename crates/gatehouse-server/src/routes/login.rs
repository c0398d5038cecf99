//! Login endpoint.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Router,
};

use super::{authenticated_service, RequestCredentials};
use crate::AppState;

/// Login routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Authenticate the session. Responds with an empty 200 on success.
async fn login(
    State(state): State<AppState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    form: Option<Form<HashMap<String, String>>>,
) -> Response {
    let fields = form.map(|Form(fields)| fields).unwrap_or_default();
    let credentials = RequestCredentials::new(fields, remote);

    authenticated_service(&state, &headers, credentials, |context| {
        tracing::info!(username = %context.username, "login was successful");
        StatusCode::OK.into_response()
    })
    .await
}
