// Server configuration from environment variables
// Decision: Route table comes from BIZDESK_ROUTES (YAML) when set, else the built-in table

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use bizdesk_core::RouteTable;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Only needed when the UI is served from a different origin than the API
    pub cors_origins: Vec<HeaderValue>,
    pub routes_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cors_origins: Vec::new(),
            routes_file: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        // Example: CORS_ALLOWED_ORIGINS="https://desk.example.com,https://admin.example.com"
        let cors_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|s| parse_origins(&s))
            .unwrap_or_default();

        let routes_file = std::env::var("BIZDESK_ROUTES")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            bind_addr,
            cors_origins,
            routes_file,
        }
    }

    pub fn load_routes(&self) -> Result<RouteTable> {
        match &self.routes_file {
            Some(path) => RouteTable::from_yaml_file(path)
                .with_context(|| format!("Failed to load route table from {}", path.display())),
            None => Ok(RouteTable::business_default()),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}
