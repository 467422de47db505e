// OpenAPI specification generation
//
// Shared by the server (Swagger UI) and the export-openapi binary.

use crate::api;
use crate::api::ListResponse;
use crate::auth;
use bizdesk_core::{Identity, Role};
use utoipa::OpenApi;

/// OpenAPI documentation for the Bizdesk API
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::routes::login,
        auth::routes::refresh_token,
        auth::routes::logout,
        auth::routes::get_current_user,
        api::users::list_users,
        api::users::create_user,
        api::users::get_user,
        api::users::update_user,
        api::users::delete_user,
    ),
    components(
        schemas(
            Identity, Role,
            api::ErrorResponse,
            auth::routes::LoginRequest,
            auth::routes::RefreshTokenRequest,
            auth::routes::TokenResponse,
            api::users::User,
            api::users::ListUsersQuery,
            api::users::CreateUserRequest,
            api::users::UpdateUserRequest,
            ListResponse<api::users::User>,
        )
    ),
    tags(
        (name = "auth", description = "Login, token refresh and logout"),
        (name = "users", description = "User management (administrators only)")
    ),
    info(
        title = "Bizdesk API",
        version = "0.1.0",
        description = "Sessions and user management for the Bizdesk business application",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// The OpenAPI document as pretty-printed JSON
    pub fn to_json() -> serde_json::Result<String> {
        Self::openapi().to_pretty_json()
    }
}
