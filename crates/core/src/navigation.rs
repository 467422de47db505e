// Navigator
//
// The routing shell the gates redirect through. Looks up the route a path
// belongs to, evaluates its gate against the current session and reports what
// to show. Rendering the outcome is the caller's business.

use std::sync::Arc;

use crate::error::Result;
use crate::gate::{decide, GateDecision};
use crate::identity::Identity;
use crate::redirect::{ReturnPath, LOGIN_PATH};
use crate::routes::{RouteDeclaration, RouteTable};
use crate::session::SessionStore;

/// What a navigation attempt resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// No route covers the path.
    NotFound { path: String },
    /// Session still initializing; show a placeholder and try again.
    Pending { path: String },
    /// The route may render.
    Render {
        path: String,
        route: RouteDeclaration,
    },
    /// The gate sent the user elsewhere.
    Redirect {
        path: String,
        location: String,
        decision: GateDecision,
    },
}

impl NavigationOutcome {
    /// The path that was requested.
    pub fn path(&self) -> &str {
        match self {
            NavigationOutcome::NotFound { path }
            | NavigationOutcome::Pending { path }
            | NavigationOutcome::Render { path, .. }
            | NavigationOutcome::Redirect { path, .. } => path,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            NavigationOutcome::Redirect { location, .. } => Some(location),
            _ => None,
        }
    }

    pub fn is_render(&self) -> bool {
        matches!(self, NavigationOutcome::Render { .. })
    }
}

/// Routing shell bound to one session store and one route table.
#[derive(Clone)]
pub struct Navigator {
    store: Arc<SessionStore>,
    routes: Arc<RouteTable>,
}

impl Navigator {
    pub fn new(store: Arc<SessionStore>, routes: Arc<RouteTable>) -> Self {
        Self { store, routes }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide against the current state. May return `Pending`.
    pub fn navigate(&self, path: &str) -> NavigationOutcome {
        let Some(route) = self.routes.lookup(path) else {
            tracing::debug!(path, "No route declared");
            return NavigationOutcome::NotFound {
                path: path.to_string(),
            };
        };

        let state = self.store.snapshot();
        let decision = decide(&state, &route.guard, path);
        tracing::debug!(path, route = %route.path, session = %state, ?decision, "Navigation decided");

        match decision {
            GateDecision::Pending => NavigationOutcome::Pending {
                path: path.to_string(),
            },
            GateDecision::Render => NavigationOutcome::Render {
                path: path.to_string(),
                route: route.clone(),
            },
            GateDecision::RedirectToLogin { .. } | GateDecision::RedirectToUnauthorized => {
                let location = decision.location().unwrap_or_else(|| LOGIN_PATH.to_string());
                NavigationOutcome::Redirect {
                    path: path.to_string(),
                    location,
                    decision,
                }
            }
        }
    }

    /// Wait for the session to settle, then decide. Never returns `Pending`.
    pub async fn navigate_settled(&self, path: &str) -> NavigationOutcome {
        self.store.ready().await;
        self.navigate(path)
    }

    /// Apply a successful login and continue to where the user was headed.
    pub fn complete_login(
        &self,
        identity: Identity,
        return_to: &ReturnPath,
    ) -> Result<NavigationOutcome> {
        self.store.login(identity)?;
        Ok(self.navigate(return_to.as_str()))
    }

    /// Drop the identity and land on the login page.
    pub fn logout(&self) -> Result<NavigationOutcome> {
        self.store.logout()?;
        Ok(self.navigate(LOGIN_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use uuid::Uuid;

    fn navigator() -> Navigator {
        Navigator::new(
            Arc::new(SessionStore::new()),
            Arc::new(RouteTable::business_default()),
        )
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        let nav = navigator();
        assert_eq!(
            nav.navigate("/payroll"),
            NavigationOutcome::NotFound {
                path: "/payroll".to_string()
            }
        );
    }

    #[test]
    fn test_public_route_renders_while_initializing() {
        let nav = navigator();
        assert!(nav.navigate("/login").is_render());
        assert!(matches!(
            nav.navigate("/customers"),
            NavigationOutcome::Pending { .. }
        ));
    }

    #[test]
    fn test_login_returns_to_requested_path() {
        let nav = navigator();
        nav.store().logout().unwrap();

        let outcome = nav.navigate("/customers");
        assert_eq!(outcome.location(), Some("/login?redirect=%2Fcustomers"));
        let NavigationOutcome::Redirect {
            decision: GateDecision::RedirectToLogin { return_to },
            ..
        } = outcome
        else {
            panic!("expected login redirect");
        };

        let identity = Identity::new(Uuid::nil(), "sam", Role::Sales);
        let outcome = nav.complete_login(identity, &return_to).unwrap();
        match outcome {
            NavigationOutcome::Render { path, route } => {
                assert_eq!(path, "/customers");
                assert_eq!(route.path, "/customers");
            }
            other => panic!("expected render, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_role_lands_on_unauthorized() {
        let nav = navigator();
        nav.store()
            .login(Identity::new(Uuid::nil(), "kim", Role::Cashier))
            .unwrap();

        let outcome = nav.navigate("/users");
        assert_eq!(outcome.location(), Some("/unauthorized"));
        assert!(nav.navigate("/unauthorized").is_render());
        assert!(nav.navigate("/cash-flow").is_render());
    }

    #[test]
    fn test_logout_lands_on_login() {
        let nav = navigator();
        nav.store()
            .login(Identity::new(Uuid::nil(), "root", Role::Admin))
            .unwrap();
        assert!(nav.navigate("/users").is_render());

        let outcome = nav.logout().unwrap();
        assert!(outcome.is_render());
        assert_eq!(outcome.path(), "/login");
        assert!(!nav.navigate("/users").is_render());
    }
}
