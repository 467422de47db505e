// Authentication configuration loaded from environment variables.
// Decision: AUTH_ prefix for all auth config
// Decision: Missing AUTH_JWT_SECRET falls back to a random per-process secret

use std::time::Duration;

/// Bootstrap administrator, created on startup when no user of that name exists.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWTs
    pub secret: String,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_lifetime: Duration::from_secs(15 * 60),
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub admin: Option<AdminConfig>,
    /// Mark session cookies `Secure` (HTTPS only)
    pub cookie_secure: bool,
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("AUTH_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!(
                    "AUTH_JWT_SECRET not set, using a random secret; sessions will not survive a restart"
                );
                random_secret()
            });

        let jwt = JwtConfig {
            secret: jwt_secret,
            access_token_lifetime: env_secs("AUTH_JWT_ACCESS_TOKEN_LIFETIME")
                .unwrap_or(JwtConfig::default().access_token_lifetime),
            refresh_token_lifetime: env_secs("AUTH_JWT_REFRESH_TOKEN_LIFETIME")
                .unwrap_or(JwtConfig::default().refresh_token_lifetime),
        };

        let admin = match (
            std::env::var("AUTH_ADMIN_USERNAME"),
            std::env::var("AUTH_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                Some(AdminConfig { username, password })
            }
            _ => None,
        };

        let cookie_secure = std::env::var("AUTH_COOKIE_SECURE")
            .map(|s| parse_flag(&s))
            .unwrap_or(false);

        Self {
            jwt,
            admin,
            cookie_secure,
        }
    }

    /// Configuration for tests: fixed secret, no admin bootstrap.
    pub fn for_testing(secret: &str) -> Self {
        Self {
            jwt: JwtConfig {
                secret: secret.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn random_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .map(Duration::from_secs)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}
