// Access gates
//
// Pure decision functions: given the session state and what a route demands,
// say whether to render, wait, or redirect. Performing the redirect is left to
// the caller (HTTP middleware on the server, the navigator in the CLI).
//
// Decision: Denials are ordinary values, not errors.
// Decision: Fail closed. A role gate without an allow-list, or with an empty
// one, admits no authenticated identity.

use crate::redirect::{login_location, ReturnPath, UNAUTHORIZED_PATH};
use crate::role::RoleSet;
use crate::routes::RouteGuard;
use crate::session::SessionState;

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The session is still initializing. Show a neutral placeholder.
    Pending,
    /// Access granted.
    Render,
    /// Nobody is logged in. Go to the login page, then come back.
    RedirectToLogin { return_to: ReturnPath },
    /// Logged in, but the role is not on the route's allow-list.
    RedirectToUnauthorized,
}

impl GateDecision {
    /// Where to navigate, for redirect decisions.
    pub fn location(&self) -> Option<String> {
        match self {
            GateDecision::RedirectToLogin { return_to } => Some(login_location(return_to)),
            GateDecision::RedirectToUnauthorized => Some(UNAUTHORIZED_PATH.to_string()),
            GateDecision::Pending | GateDecision::Render => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            GateDecision::RedirectToLogin { .. } | GateDecision::RedirectToUnauthorized
        )
    }
}

/// One navigation attempt. Built per request and dropped after the decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuardRequest {
    /// Path (and optional query) the user asked for.
    pub requested_path: String,
    /// Allow-list for role-gated routes. Ignored by the auth gate.
    pub allowed_roles: Option<RoleSet>,
}

impl RouteGuardRequest {
    pub fn new(requested_path: impl Into<String>) -> Self {
        Self {
            requested_path: requested_path.into(),
            allowed_roles: None,
        }
    }

    pub fn with_allowed_roles(mut self, roles: RoleSet) -> Self {
        self.allowed_roles = Some(roles);
        self
    }

    fn login_redirect(&self) -> GateDecision {
        GateDecision::RedirectToLogin {
            return_to: ReturnPath::sanitize(&self.requested_path),
        }
    }
}

/// Gate for routes that only need a logged-in identity.
pub fn auth_gate(state: &SessionState, request: &RouteGuardRequest) -> GateDecision {
    match state {
        SessionState::Initializing => GateDecision::Pending,
        SessionState::Anonymous => request.login_redirect(),
        SessionState::Authenticated(_) => GateDecision::Render,
    }
}

/// Gate for routes restricted to an allow-list of roles.
pub fn role_gate(state: &SessionState, request: &RouteGuardRequest) -> GateDecision {
    match state {
        SessionState::Initializing => GateDecision::Pending,
        SessionState::Anonymous => request.login_redirect(),
        SessionState::Authenticated(identity) => {
            let allowed = request.allowed_roles.unwrap_or(RoleSet::EMPTY);
            if allowed.contains(identity.role) {
                GateDecision::Render
            } else {
                tracing::debug!(
                    username = %identity.username,
                    role = %identity.role,
                    path = %request.requested_path,
                    allowed = %allowed,
                    "Role not permitted"
                );
                GateDecision::RedirectToUnauthorized
            }
        }
    }
}

/// Evaluate the gate a route declares.
pub fn decide(state: &SessionState, guard: &RouteGuard, requested_path: &str) -> GateDecision {
    match guard {
        RouteGuard::Public => GateDecision::Render,
        RouteGuard::Authenticated => auth_gate(state, &RouteGuardRequest::new(requested_path)),
        RouteGuard::Roles { roles } => role_gate(
            state,
            &RouteGuardRequest::new(requested_path).with_allowed_roles(*roles),
        ),
    }
}
