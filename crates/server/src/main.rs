// Bizdesk API server
// Decision: In-memory user store seeded with a bootstrap admin from the environment
// Decision: CORS only when origins are configured (same-origin by default)

use anyhow::{Context, Result};
use axum::http::{header, Method};
use bizdesk_core::telemetry::{init_telemetry, TelemetryConfig};
use bizdesk_server::{
    auth::{bootstrap_admin, AuthConfig, AuthState},
    build_router,
    config::ServerConfig,
    storage::Database,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; real environment variables win
    let _ = dotenvy::dotenv();

    // Configure via environment variables:
    // - OTEL_SERVICE_NAME: Service name (default: "bizdesk-server")
    // - OTEL_EXPORTER_OTLP_ENDPOINT: OTLP endpoint (with the `otel` feature)
    // - RUST_LOG: Log filter (default: "bizdesk_server=debug,tower_http=debug")
    let telemetry_config =
        TelemetryConfig::for_service("bizdesk-server", env!("CARGO_PKG_VERSION"))
            .with_default_filter("bizdesk_server=debug,bizdesk_core=info,tower_http=debug");

    // Keep the guard alive for the lifetime of the application
    let _telemetry_guard = init_telemetry(telemetry_config);

    tracing::info!("bizdesk-server starting...");

    let server_config = ServerConfig::from_env();
    let routes = Arc::new(server_config.load_routes()?);
    tracing::info!(
        routes = routes.len(),
        source = ?server_config.routes_file,
        "Route table loaded"
    );

    let auth_config = AuthConfig::from_env();
    let db = Arc::new(Database::new());

    match &auth_config.admin {
        Some(admin) => {
            bootstrap_admin(&db, admin)
                .await
                .context("Failed to create bootstrap admin")?;
        }
        None => tracing::warn!(
            "AUTH_ADMIN_USERNAME/AUTH_ADMIN_PASSWORD not set; no user can log in"
        ),
    }

    tracing::info!(
        access_token_secs = auth_config.jwt.access_token_lifetime.as_secs(),
        refresh_token_secs = auth_config.jwt.refresh_token_lifetime.as_secs(),
        cookie_secure = auth_config.cookie_secure,
        "Authentication configured"
    );

    let auth_state = AuthState::new(auth_config, db.clone());
    let app = build_router(auth_state, routes);

    let app = if server_config.cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
        app
    } else {
        tracing::info!(origins = ?server_config.cors_origins, "CORS origins configured");
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(server_config.cors_origins.clone()))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::ORIGIN,
                ])
                .allow_credentials(true),
        )
    };

    let app = app.layer(TraceLayer::new_for_http());

    // Expired refresh tokens are otherwise only removed when presented
    let sweeper_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match sweeper_db.delete_expired_refresh_tokens().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(removed = n, "Expired refresh tokens removed"),
                Err(e) => tracing::warn!("Refresh token sweep failed: {}", e),
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&server_config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server_config.bind_addr))?;
    tracing::info!("HTTP server listening on {}", server_config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
