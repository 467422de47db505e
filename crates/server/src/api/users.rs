// Users API routes
// Decision: User management is admin-only, enforced by the role guard layer
// Decision: An admin cannot delete or demote themselves (no lockout)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use bizdesk_core::{Role, RoleSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::ListResponse;
use crate::auth::{require_roles, AuthError, AuthState, AuthUser, RoleGuard};
use crate::storage::{
    models::{CreateUserRow, UpdateUser, UserRow},
    DuplicateUsername,
    password::{check_password_strength, hash_password},
};

/// Roles allowed to manage users
pub const USER_ADMINS: RoleSet = RoleSet::of(&[Role::Admin]);

/// User as exposed by the API (never includes the password hash)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            email: row.email,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListUsersQuery {
    /// Filter by username, display name or email
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
    /// Defaults to the username
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Create users routes, restricted to [`USER_ADMINS`]
pub fn routes(state: AuthState) -> Router {
    let guard = RoleGuard {
        auth: state.clone(),
        roles: USER_ADMINS,
    };
    Router::new()
        .route("/v1/users", get(list_users).post(create_user))
        .route(
            "/v1/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn_with_state(guard, require_roles))
        .with_state(state)
}

fn storage_error(e: anyhow::Error) -> AuthError {
    if e.is::<DuplicateUsername>() {
        return AuthError::conflict("Username already exists");
    }
    tracing::error!("User storage error: {}", e);
    AuthError::internal("Internal server error")
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() || username.chars().any(char::is_whitespace) {
        return Err(AuthError::bad_request(
            "Username must be non-empty and contain no whitespace",
        ));
    }
    Ok(())
}

fn strong_password(password: &str) -> Result<String, AuthError> {
    check_password_strength(password).map_err(|e| AuthError::bad_request(&e.to_string()))?;
    hash_password(password).map_err(storage_error)
}

/// GET /v1/users - List users
#[utoipa::path(
    get,
    path = "/v1/users",
    params(
        ("search" = Option<String>, Query, description = "Filter by username, name or email")
    ),
    responses(
        (status = 200, description = "List of users", body = ListResponse<User>),
        (status = 401, description = "Not logged in", body = super::ErrorResponse),
        (status = 403, description = "Not an administrator", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AuthState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListResponse<User>>, AuthError> {
    let rows = state
        .db
        .list_users(query.search.as_deref())
        .await
        .map_err(storage_error)?;

    Ok(Json(ListResponse::new(
        rows.into_iter().map(User::from).collect(),
    )))
}

/// POST /v1/users - Create a user
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid username or weak password", body = super::ErrorResponse),
        (status = 409, description = "Username taken", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AuthState>,
    admin: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AuthError> {
    let username = req.username.trim().to_string();
    validate_username(&username)?;

    if state
        .db
        .get_user_by_username(&username)
        .await
        .map_err(storage_error)?
        .is_some()
    {
        return Err(AuthError::conflict("Username already exists"));
    }

    let password_hash = strong_password(&req.password)?;
    let row = state
        .db
        .create_user(CreateUserRow {
            display_name: req
                .display_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| username.clone()),
            username,
            email: req.email,
            role: req.role,
            password_hash,
        })
        .await
        .map_err(storage_error)?;

    tracing::info!(
        admin = %admin.identity.username,
        username = %row.username,
        role = %row.role,
        "User created"
    );
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /v1/users/:id - Get a user
#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "No such user", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AuthState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AuthError> {
    state
        .db
        .get_user(id)
        .await
        .map_err(storage_error)?
        .map(|row| Json(row.into()))
        .ok_or_else(|| AuthError::not_found("User not found"))
}

/// PATCH /v1/users/:id - Update profile, role or password
#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid change", body = super::ErrorResponse),
        (status = 404, description = "No such user", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AuthState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, AuthError> {
    if id == admin.id() && req.role.is_some_and(|role| role != Role::Admin) {
        return Err(AuthError::bad_request("Cannot change your own role"));
    }

    let password_changed = req.password.is_some();
    let password_hash = req.password.as_deref().map(strong_password).transpose()?;

    let row = state
        .db
        .update_user(
            id,
            UpdateUser {
                display_name: req.display_name,
                email: req.email,
                role: req.role,
                password_hash,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| AuthError::not_found("User not found"))?;

    if password_changed {
        let revoked = state
            .db
            .delete_user_refresh_tokens(id)
            .await
            .map_err(storage_error)?;
        tracing::info!(username = %row.username, revoked, "Password changed, sessions revoked");
    }

    tracing::info!(admin = %admin.identity.username, username = %row.username, "User updated");
    Ok(Json(row.into()))
}

/// DELETE /v1/users/:id - Delete a user and revoke their sessions
#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete yourself", body = super::ErrorResponse),
        (status = 404, description = "No such user", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AuthState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AuthError> {
    if id == admin.id() {
        return Err(AuthError::bad_request("Cannot delete yourself"));
    }

    if !state.db.delete_user(id).await.map_err(storage_error)? {
        return Err(AuthError::not_found("User not found"));
    }
    state
        .db
        .delete_user_refresh_tokens(id)
        .await
        .map_err(storage_error)?;

    tracing::info!(admin = %admin.identity.username, user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
