// Authentication and access enforcement
// Decision: Token issuance (routes), request identity (middleware) and gate
//           enforcement (gate) are separate so API and page surfaces share them

pub mod config;
pub mod gate;
pub mod jwt;
pub mod middleware;
pub mod routes;

pub use config::{AdminConfig, AuthConfig, JwtConfig};
pub use gate::{page_gate, require_roles, PageGate, RoleGuard};
pub use middleware::{AuthError, AuthState, AuthUser, OptionalAuthUser};
pub use routes::{bootstrap_admin, routes};
