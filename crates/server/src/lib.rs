// Bizdesk server library
// Decision: Router assembly lives here so binaries and tests build the same app

// API routes and types (shared for OpenAPI generation)
pub mod api;

// Authentication and access enforcement
pub mod auth;

// Environment configuration
pub mod config;

// Storage layer
pub mod storage;

// OpenAPI spec generation
pub mod openapi;

use axum::{extract::State, routing::get, Json, Router};
use bizdesk_core::RouteTable;
use serde::Serialize;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{AuthState, PageGate};
use crate::openapi::ApiDoc;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    routes: usize,
}

async fn health(State(routes): State<Arc<RouteTable>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        routes: routes.len(),
    })
}

/// Assemble the application router.
///
/// API routes answer with status codes; every other path is treated as a
/// page and goes through the page gate against `route_table`.
pub fn build_router(auth_state: AuthState, route_table: Arc<RouteTable>) -> Router {
    let pages = api::pages::routes(PageGate {
        auth: auth_state.clone(),
        routes: route_table.clone(),
    });

    Router::new()
        .route("/health", get(health).with_state(route_table))
        .merge(auth::routes(auth_state.clone()))
        .merge(api::users::routes(auth_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback_service(pages)
}
