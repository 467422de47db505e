// Authentication HTTP routes
// Decision: /v1/auth/* prefix for all auth endpoints
// Decision: Tokens are returned in the body (CLI) and as cookies (browser)
// Decision: Refresh tokens rotate on every use

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use bizdesk_core::{Identity, ReturnPath, Role};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    config::AdminConfig,
    jwt::hash_token,
    middleware::{AuthError, AuthState, AuthUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
};
use crate::storage::{
    models::{CreateRefreshTokenRow, CreateUserRow, UserRow},
    password::{hash_password, verify_password},
    Database,
};

const REFRESH_COOKIE_PATH: &str = "/v1/auth";

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Path to return to after login. Unsafe values fall back to `/`.
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Refresh or logout request. The token may instead come from the cookie.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Issued session
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub identity: Identity,
    /// Sanitized path the client should navigate to next
    pub return_to: String,
}

/// Create auth routes
pub fn routes(state: AuthState) -> Router {
    Router::new()
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/refresh", post(refresh_token))
        .route("/v1/auth/logout", post(logout))
        .route("/v1/auth/me", get(get_current_user))
        .with_state(state)
}

/// POST /v1/auth/login - Login with username and password
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid username or password", body = crate::api::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AuthError> {
    let user = state
        .db
        .get_user_by_username(req.username.trim())
        .await
        .map_err(|e| {
            tracing::error!("Database error during login: {}", e);
            AuthError::internal("Login failed")
        })?;

    let Some(user) = user else {
        tracing::info!(username = %req.username, "Login rejected: unknown user");
        return Err(AuthError::unauthorized("Invalid username or password"));
    };

    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        tracing::error!("Password verification error: {}", e);
        AuthError::internal("Login failed")
    })?;
    if !valid {
        tracing::info!(username = %user.username, "Login rejected: wrong password");
        return Err(AuthError::unauthorized("Invalid username or password"));
    }

    let return_to = req
        .redirect
        .as_deref()
        .map(ReturnPath::sanitize)
        .unwrap_or_else(ReturnPath::root);

    tracing::info!(username = %user.username, role = %user.role, "User logged in");
    issue_session(&state, jar, &user, &return_to).await
}

/// POST /v1/auth/refresh - Exchange a refresh token for a new session
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Session refreshed", body = TokenResponse),
        (status = 401, description = "Invalid or expired refresh token", body = crate::api::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    State(state): State<AuthState>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> Result<(CookieJar, Json<TokenResponse>), AuthError> {
    let token = presented_refresh_token(&jar, body)
        .ok_or_else(|| AuthError::unauthorized("Refresh token required"))?;

    let claims = state
        .jwt_service
        .validate_refresh_token(&token)
        .map_err(|_| AuthError::unauthorized("Invalid refresh token"))?;

    let token_row = state
        .db
        .get_refresh_token_by_hash(&hash_token(&token))
        .await
        .map_err(|e| {
            tracing::error!("Database error during refresh: {}", e);
            AuthError::internal("Refresh failed")
        })?
        .ok_or_else(|| AuthError::unauthorized("Invalid refresh token"))?;

    if token_row.expires_at < Utc::now() {
        return Err(AuthError::unauthorized("Refresh token expired"));
    }

    // Rotation: the presented token is spent whatever happens next
    let _ = state.db.delete_refresh_token(token_row.id).await;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AuthError::unauthorized("Invalid user ID in token"))?;
    let user = state
        .db
        .get_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("Database error during refresh: {}", e);
            AuthError::internal("Refresh failed")
        })?
        .ok_or_else(|| AuthError::unauthorized("User not found"))?;

    tracing::debug!(username = %user.username, "Session refreshed");
    issue_session(&state, jar, &user, &ReturnPath::root()).await
}

/// POST /v1/auth/logout - Revoke the refresh token and clear cookies
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    request_body = RefreshTokenRequest,
    responses(
        (status = 204, description = "Logged out")
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AuthState>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> (StatusCode, CookieJar) {
    if let Some(token) = presented_refresh_token(&jar, body) {
        match state.db.get_refresh_token_by_hash(&hash_token(&token)).await {
            Ok(Some(row)) => {
                let _ = state.db.delete_refresh_token(row.id).await;
                tracing::debug!(user_id = %row.user_id, "Refresh token revoked");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to revoke refresh token: {}", e),
        }
    }

    let jar = jar
        .remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path(REFRESH_COOKIE_PATH));
    (StatusCode::NO_CONTENT, jar)
}

/// GET /v1/auth/me - Identity of the current session
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Current identity", body = Identity),
        (status = 401, description = "Not logged in", body = crate::api::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn get_current_user(user: AuthUser) -> Json<Identity> {
    Json(user.identity)
}

fn presented_refresh_token(
    jar: &CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> Option<String> {
    body.and_then(|Json(req)| req.refresh_token)
        .filter(|token| !token.is_empty())
        .or_else(|| {
            jar.get(REFRESH_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
}

/// Mint tokens for a user, store the refresh token hash and set cookies.
async fn issue_session(
    state: &AuthState,
    jar: CookieJar,
    user: &UserRow,
    return_to: &ReturnPath,
) -> Result<(CookieJar, Json<TokenResponse>), AuthError> {
    let identity = user.identity();
    let token_pair = state
        .jwt_service
        .generate_token_pair(identity.id)
        .map_err(|e| {
            tracing::error!("Token generation error: {}", e);
            AuthError::internal("Login failed")
        })?;

    let expires_at = Utc::now()
        + Duration::from_std(state.config.jwt.refresh_token_lifetime)
            .map_err(|_| AuthError::internal("Login failed"))?;

    state
        .db
        .create_refresh_token(CreateRefreshTokenRow {
            user_id: user.id,
            token_hash: hash_token(&token_pair.refresh_token),
            expires_at,
        })
        .await
        .map_err(|e| {
            tracing::error!("Failed to store refresh token: {}", e);
            AuthError::internal("Login failed")
        })?;

    let access_cookie = Cookie::build((ACCESS_TOKEN_COOKIE, token_pair.access_token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(token_pair.expires_in))
        .build();

    let refresh_cookie = Cookie::build((REFRESH_TOKEN_COOKIE, token_pair.refresh_token.clone()))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(
            state.jwt_service.refresh_token_lifetime_secs(),
        ))
        .build();

    Ok((
        jar.add(access_cookie).add(refresh_cookie),
        Json(TokenResponse {
            access_token: token_pair.access_token,
            refresh_token: token_pair.refresh_token,
            token_type: token_pair.token_type,
            expires_in: token_pair.expires_in,
            identity,
            return_to: return_to.to_string(),
        }),
    ))
}

/// Create the configured administrator unless a user of that name exists.
///
/// Returns the existing or newly created user.
pub async fn bootstrap_admin(db: &Database, admin: &AdminConfig) -> anyhow::Result<UserRow> {
    if let Some(existing) = db.get_user_by_username(&admin.username).await? {
        if existing.role != Role::Admin {
            tracing::warn!(
                username = %existing.username,
                role = %existing.role,
                "Bootstrap admin name belongs to a non-admin user"
            );
        }
        return Ok(existing);
    }

    let user = db
        .create_user(CreateUserRow {
            username: admin.username.clone(),
            display_name: "Administrator".to_string(),
            email: None,
            role: Role::Admin,
            password_hash: hash_password(&admin.password)?,
        })
        .await?;
    tracing::info!(username = %user.username, "Bootstrap admin created");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_config() -> AdminConfig {
        AdminConfig {
            username: "root".to_string(),
            password: "bootstrap-pass".to_string(),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let db = Database::new();
        let first = bootstrap_admin(&db, &admin_config()).await.unwrap();
        let second = bootstrap_admin(&db, &admin_config()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::Admin);
        assert_eq!(db.count_users().await.unwrap(), 1);
        assert!(verify_password("bootstrap-pass", &first.password_hash).unwrap());
    }

    #[test]
    fn test_body_token_takes_precedence_over_cookie() {
        let jar = CookieJar::new().add(Cookie::new(REFRESH_TOKEN_COOKIE, "from-cookie"));

        let from_body = presented_refresh_token(
            &jar,
            Some(Json(RefreshTokenRequest {
                refresh_token: Some("from-body".to_string()),
            })),
        );
        assert_eq!(from_body.as_deref(), Some("from-body"));

        let from_cookie = presented_refresh_token(&jar, None);
        assert_eq!(from_cookie.as_deref(), Some("from-cookie"));

        assert!(presented_refresh_token(&CookieJar::new(), None).is_none());
    }
}
