// HTTP enforcement of gate decisions
// Decision: Pages answer with redirects (303), APIs with status codes (401/403)
// Decision: An undetermined session is 503 + Retry-After on both surfaces

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use bizdesk_core::{
    decide, role_gate, GateDecision, RoleSet, RouteGuardRequest, RouteTable, SessionState,
};
use std::sync::Arc;

use super::middleware::{auth_method, resolve_session, AuthError, AuthState, AuthUser};

const RETRY_AFTER_SECS: u32 = 1;

/// State for the page gate: who is asking and what the routes demand.
#[derive(Clone)]
pub struct PageGate {
    pub auth: AuthState,
    pub routes: Arc<RouteTable>,
}

/// State for an API role guard.
#[derive(Clone)]
pub struct RoleGuard {
    pub auth: AuthState,
    pub roles: RoleSet,
}

fn retry_later() -> Response {
    let mut response = AuthError::unavailable("Session is still being verified").into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    response
}

/// Page response for a non-render decision. `None` means render.
pub fn page_response(decision: &GateDecision) -> Option<Response> {
    match decision {
        GateDecision::Render => None,
        GateDecision::Pending => Some(retry_later()),
        GateDecision::RedirectToLogin { .. } | GateDecision::RedirectToUnauthorized => decision
            .location()
            .map(|location| Redirect::to(&location).into_response()),
    }
}

/// API response for a non-render decision. `None` means proceed.
pub fn api_response(decision: &GateDecision) -> Option<Response> {
    match decision {
        GateDecision::Render => None,
        GateDecision::Pending => Some(retry_later()),
        GateDecision::RedirectToLogin { .. } => {
            Some(AuthError::unauthorized("Authentication required").into_response())
        }
        GateDecision::RedirectToUnauthorized => {
            Some(AuthError::forbidden("Insufficient role").into_response())
        }
    }
}

/// Make the resolved user available to handlers without a second lookup.
fn attach_user(request: &mut Request, session: &SessionState) {
    if let Some(identity) = session.identity() {
        let user = AuthUser {
            identity: identity.clone(),
            auth_method: auth_method(request.headers()),
        };
        request.extensions_mut().insert(user);
    }
}

fn requested_path(request: &Request) -> String {
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// Gate every page against the route table.
pub async fn page_gate(State(gate): State<PageGate>, mut request: Request, next: Next) -> Response {
    let path = requested_path(&request);
    let Some(route) = gate.routes.lookup(&path).cloned() else {
        return AuthError::not_found("Page not found").into_response();
    };

    let session = resolve_session(request.headers(), &gate.auth).await;
    let decision = decide(&session, &route.guard, &path);
    tracing::debug!(path = %path, route = %route.path, session = %session, ?decision, "Page gate");

    if let Some(response) = page_response(&decision) {
        return response;
    }

    attach_user(&mut request, &session);
    request.extensions_mut().insert(route);
    next.run(request).await
}

/// Restrict an API router to an allow-list of roles.
pub async fn require_roles(
    State(guard): State<RoleGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = resolve_session(request.headers(), &guard.auth).await;
    let decision = role_gate(
        &session,
        &RouteGuardRequest::new(requested_path(&request)).with_allowed_roles(guard.roles),
    );

    if let Some(response) = api_response(&decision) {
        return response;
    }

    attach_user(&mut request, &session);
    next.run(request).await
}
