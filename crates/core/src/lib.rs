// Bizdesk access-control core
//
// This crate holds everything that decides who may see what, independent of
// the HTTP server and the CLI that drive it.
//
// Key design decisions:
// - Session state is an injectable SessionStore, never a global
// - Roles are a closed enum; route allow-lists are RoleSets
// - Gates are pure functions returning a GateDecision; redirects are values
// - Failure to validate credentials or a missing allow-list fails closed

pub mod error;
pub mod gate;
pub mod identity;
pub mod navigation;
pub mod redirect;
pub mod role;
pub mod routes;
pub mod session;

// Logging setup shared by the binaries
pub mod telemetry;

// Re-exports for convenience
pub use error::{CredentialError, Result, RouteConfigError, SessionError};
pub use gate::{auth_gate, decide, role_gate, GateDecision, RouteGuardRequest};
pub use identity::Identity;
pub use navigation::{NavigationOutcome, Navigator};
pub use redirect::{
    login_location, return_path_from_query, ReturnPath, LOGIN_PATH, RETURN_PARAM,
    UNAUTHORIZED_PATH,
};
pub use role::{Role, RoleParseError, RoleSet};
pub use routes::{RouteDeclaration, RouteGuard, RouteTable};
pub use session::{CredentialValidator, PersistedCredential, SessionState, SessionStore};
