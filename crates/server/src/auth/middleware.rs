// Authentication extractors and per-request session resolution
// Decision: Bearer header (CLI, API clients) takes precedence over the access_token cookie (browser)
// Decision: The identity comes from the current user row, not the token claims,
//           so role changes and deletions take effect before the token expires

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use bizdesk_core::{Identity, SessionState};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{config::AuthConfig, jwt::JwtService};
use crate::storage::Database;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Error body returned by every auth-related rejection
#[derive(Debug, Clone, Serialize)]
pub struct AuthError {
    pub error: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl AuthError {
    fn new(status: StatusCode, message: &str) -> Self {
        Self {
            error: message.to_string(),
            status,
        }
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unavailable(message: &str) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// How the request carried its credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Bearer,
    Cookie,
}

/// Authenticated user context extracted from request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    pub auth_method: AuthMethod,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.identity.id
    }
}

/// Auth state shared across routes
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub jwt_service: Arc<JwtService>,
    pub db: Arc<Database>,
}

impl AuthState {
    pub fn new(config: AuthConfig, db: Arc<Database>) -> Self {
        let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
        Self {
            config,
            jwt_service,
            db,
        }
    }
}

/// Outcome of looking for credentials on a request
enum Lookup {
    Found(AuthUser),
    /// No credentials, or credentials that do not check out
    Rejected(&'static str),
    /// Credentials could not be checked against storage
    Unavailable,
}

/// Which credential `authenticate` would use for these headers.
pub fn auth_method(headers: &HeaderMap) -> AuthMethod {
    if bearer_token(headers).is_some() {
        AuthMethod::Bearer
    } else {
        AuthMethod::Cookie
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn lookup(headers: &HeaderMap, state: &AuthState) -> Lookup {
    let (token, auth_method) = if let Some(token) = bearer_token(headers) {
        (token.to_string(), AuthMethod::Bearer)
    } else if let Some(cookie) = CookieJar::from_headers(headers).get(ACCESS_TOKEN_COOKIE) {
        (cookie.value().to_string(), AuthMethod::Cookie)
    } else {
        return Lookup::Rejected("Authentication required");
    };

    let claims = match state.jwt_service.validate_access_token(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Access token rejected: {:#}", e);
            return Lookup::Rejected("Invalid or expired token");
        }
    };

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        return Lookup::Rejected("Invalid user ID in token");
    };

    match state.db.get_user(user_id).await {
        Ok(Some(user)) => Lookup::Found(AuthUser {
            identity: user.identity(),
            auth_method,
        }),
        Ok(None) => {
            tracing::debug!(user_id = %user_id, "Token subject no longer exists");
            Lookup::Rejected("User no longer exists")
        }
        Err(e) => {
            tracing::error!("Failed to load user {}: {}", user_id, e);
            Lookup::Unavailable
        }
    }
}

/// Authenticate a request from its headers.
pub async fn authenticate(headers: &HeaderMap, state: &AuthState) -> Result<AuthUser, AuthError> {
    match lookup(headers, state).await {
        Lookup::Found(user) => Ok(user),
        Lookup::Rejected(reason) => Err(AuthError::unauthorized(reason)),
        Lookup::Unavailable => Err(AuthError::unavailable("Session could not be verified")),
    }
}

/// Session state of a single request.
///
/// Requests without valid credentials are `Anonymous`. When storage cannot
/// be consulted the outcome is undetermined and the request stays
/// `Initializing`, which the gates never turn into rendered content.
pub async fn resolve_session(headers: &HeaderMap, state: &AuthState) -> SessionState {
    match lookup(headers, state).await {
        Lookup::Found(user) => SessionState::Authenticated(Arc::new(user.identity)),
        Lookup::Rejected(_) => SessionState::Anonymous,
        Lookup::Unavailable => SessionState::Initializing,
    }
}

/// Extractor for authenticated user. Rejects with 401 when not authenticated.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Set by the gate middleware when it already resolved the session
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        let auth_state = AuthState::from_ref(state);
        authenticate(&parts.headers, &auth_state).await
    }
}

/// Optional auth extractor - `None` when the request is anonymous
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuthUser(
            AuthUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::AuthConfig;
    use crate::storage::models::CreateUserRow;
    use axum::http::HeaderValue;
    use bizdesk_core::Role;

    async fn state_with_user(role: Role) -> (AuthState, Identity) {
        let state = AuthState::new(
            AuthConfig::for_testing("middleware-secret"),
            Arc::new(Database::new()),
        );
        let user = state
            .db
            .create_user(CreateUserRow {
                username: "nadia".to_string(),
                display_name: "Nadia".to_string(),
                email: None,
                role,
                password_hash: "unused".to_string(),
            })
            .await
            .unwrap();
        (state, user.identity())
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(AuthError::unauthorized("x").status, StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::forbidden("x").status, StatusCode::FORBIDDEN);
        assert_eq!(AuthError::conflict("x").status, StatusCode::CONFLICT);
        assert_eq!(
            AuthError::unavailable("x").status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_no_credentials_is_anonymous() {
        let (state, _) = state_with_user(Role::Sales).await;
        let headers = HeaderMap::new();

        assert_eq!(resolve_session(&headers, &state).await, SessionState::Anonymous);
        let err = authenticate(&headers, &state).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bearer_token_resolves_identity() {
        let (state, identity) = state_with_user(Role::Sales).await;
        let token = state.jwt_service.generate_access_token(identity.id).unwrap();

        let user = authenticate(&bearer(&token), &state).await.unwrap();
        assert_eq!(user.identity, identity);
        assert_eq!(user.auth_method, AuthMethod::Bearer);
    }

    #[tokio::test]
    async fn test_cookie_token_resolves_identity() {
        let (state, identity) = state_with_user(Role::Cashier).await;
        let token = state.jwt_service.generate_access_token(identity.id).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", ACCESS_TOKEN_COOKIE, token)).unwrap(),
        );

        let user = authenticate(&headers, &state).await.unwrap();
        assert_eq!(user.auth_method, AuthMethod::Cookie);
        assert_eq!(user.identity.role, Role::Cashier);
    }

    #[tokio::test]
    async fn test_current_role_wins_over_token_claims() {
        let (state, identity) = state_with_user(Role::Sales).await;
        let token = state.jwt_service.generate_access_token(identity.id).unwrap();
        state
            .db
            .update_user(
                identity.id,
                crate::storage::models::UpdateUser {
                    role: Some(Role::Storekeeper),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let session = resolve_session(&bearer(&token), &state).await;
        assert_eq!(session.identity().unwrap().role, Role::Storekeeper);
    }

    #[tokio::test]
    async fn test_deleted_user_is_anonymous() {
        let (state, identity) = state_with_user(Role::Admin).await;
        let token = state.jwt_service.generate_access_token(identity.id).unwrap();
        state.db.delete_user(identity.id).await.unwrap();

        assert_eq!(
            resolve_session(&bearer(&token), &state).await,
            SessionState::Anonymous
        );
    }

    #[tokio::test]
    async fn test_garbage_token_is_anonymous() {
        let (state, _) = state_with_user(Role::Admin).await;
        assert_eq!(
            resolve_session(&bearer("not.a.jwt"), &state).await,
            SessionState::Anonymous
        );
    }
}
