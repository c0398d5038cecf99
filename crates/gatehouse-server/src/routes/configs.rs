//! Authorized connection list.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use gatehouse_core::AuthorizedContext;
use quick_xml::escape::escape;

use super::{authenticated_service, RequestCredentials};
use crate::AppState;

/// Connection list routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/configs", get(list_configs).post(list_configs_form))
}

async fn list_configs(
    State(state): State<AppState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(fields): Query<HashMap<String, String>>,
) -> Response {
    let credentials = RequestCredentials::new(fields, remote);
    authenticated_service(&state, &headers, credentials, configs_response).await
}

async fn list_configs_form(
    State(state): State<AppState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    form: Option<Form<HashMap<String, String>>>,
) -> Response {
    let fields = form.map(|Form(fields)| fields).unwrap_or_default();
    let credentials = RequestCredentials::new(fields, remote);
    authenticated_service(&state, &headers, credentials, configs_response).await
}

fn configs_response(context: &AuthorizedContext) -> Response {
    (
        StatusCode::OK,
        [(CACHE_CONTROL, "no-cache"), (CONTENT_TYPE, "text/xml")],
        render_configs(context),
    )
        .into_response()
}

/// Render the authorized connections as
/// `<configs><config id=".." protocol=".."/>...</configs>`, sorted by id.
pub fn render_configs(context: &AuthorizedContext) -> String {
    let mut xml = String::from("<configs>\n");

    for id in context.connection_names() {
        let protocol = context
            .configurations
            .get(id)
            .and_then(|config| config.protocol())
            .unwrap_or_default();

        xml.push_str(&format!(
            "<config id=\"{}\" protocol=\"{}\"/>\n",
            escape(id),
            escape(protocol)
        ));
    }

    xml.push_str("</configs>\n");
    xml
}
