// Application pages
//
// Every path of the route table is served here behind the page gate. The
// business screens themselves live in the front end; this endpoint returns
// the page descriptor the shell renders once access is granted.

use axum::{
    extract::Extension,
    http::Uri,
    middleware,
    response::{IntoResponse, Redirect, Response},
    Json, Router,
};
use bizdesk_core::{return_path_from_query, Identity, RouteDeclaration, LOGIN_PATH};
use serde::{Deserialize, Serialize};

use crate::auth::{page_gate, OptionalAuthUser, PageGate};

/// Descriptor of a page the viewer may see
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub guard: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<Identity>,
    /// Where the login page sends the user afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
}

/// Serve every declared page through the page gate
pub fn routes(gate: PageGate) -> Router {
    let auth = gate.auth.clone();
    Router::new()
        .fallback(render_page)
        .layer(middleware::from_fn_with_state(gate, page_gate))
        .with_state(auth)
}

async fn render_page(
    Extension(route): Extension<RouteDeclaration>,
    OptionalAuthUser(viewer): OptionalAuthUser,
    uri: Uri,
) -> Response {
    let on_login_page = route.path == LOGIN_PATH;
    let return_to = on_login_page.then(|| return_path_from_query(uri.query()));

    // Already signed in: the login page forwards to where the user was going
    if let (Some(return_to), Some(_)) = (&return_to, &viewer) {
        return Redirect::to(return_to.as_str()).into_response();
    }

    Json(PageView {
        path: uri.path().to_string(),
        title: route.title.clone(),
        guard: route.guard.to_string(),
        viewer: viewer.map(|user| user.identity),
        return_to: return_to.map(|path| path.to_string()),
    })
    .into_response()
}
