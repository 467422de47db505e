// JWT token service for authentication
// Decision: HS256 (symmetric key)
// Decision: Access tokens are short-lived, refresh tokens are stored hashed

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::config::JwtConfig;

/// The `token_type` claim. An access token is never accepted as a refresh
/// token and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims of a session access token. Only the subject is trusted; the
/// user's current role is read from storage on every request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessTokenClaims {
    /// User ID
    pub sub: String,
    pub token_type: TokenKind,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub token_type: TokenKind,
    pub exp: i64,
    pub iat: i64,
    /// Random token ID; two refresh tokens minted in the same second still differ
    pub jti: String,
}

trait Typed {
    fn kind(&self) -> TokenKind;
}

impl Typed for AccessTokenClaims {
    fn kind(&self) -> TokenKind {
        self.token_type
    }
}

impl Typed for RefreshTokenClaims {
    fn kind(&self) -> TokenKind {
        self.token_type
    }
}

/// Both tokens of a fresh session
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Issues and checks the server's session tokens
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    keys: (EncodingKey, DecodingKey),
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let secret = config.secret.as_bytes();
        let keys = (
            EncodingKey::from_secret(secret),
            DecodingKey::from_secret(secret),
        );
        Self { config, keys }
    }

    /// `(issued_at, expires_at)` as unix seconds
    fn window(lifetime: std::time::Duration) -> Result<(i64, i64)> {
        let now = Utc::now();
        let exp = now + Duration::from_std(lifetime).context("Token lifetime out of range")?;
        Ok((now.timestamp(), exp.timestamp()))
    }

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys.0)
            .context("Failed to sign token")
    }

    fn verify<C: DeserializeOwned + Typed>(&self, token: &str, expected: TokenKind) -> Result<C> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let claims = decode::<C>(token, &self.keys.1, &validation)
            .with_context(|| format!("Invalid {:?} token", expected).to_lowercase())?
            .claims;
        if claims.kind() != expected {
            bail!("Expected a {:?} token, got {:?}", expected, claims.kind());
        }
        Ok(claims)
    }

    pub fn generate_access_token(&self, user_id: Uuid) -> Result<String> {
        let (iat, exp) = Self::window(self.config.access_token_lifetime)?;
        self.sign(&AccessTokenClaims {
            sub: user_id.to_string(),
            token_type: TokenKind::Access,
            exp,
            iat,
        })
    }

    /// Returns the encoded token and its `jti`.
    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<(String, String)> {
        let (iat, exp) = Self::window(self.config.refresh_token_lifetime)?;
        let jti = hex::encode(rand::thread_rng().gen::<[u8; 16]>());
        let token = self.sign(&RefreshTokenClaims {
            sub: user_id.to_string(),
            token_type: TokenKind::Refresh,
            exp,
            iat,
            jti: jti.clone(),
        })?;
        Ok((token, jti))
    }

    pub fn generate_token_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let (refresh_token, _) = self.generate_refresh_token(user_id)?;
        Ok(TokenPair {
            access_token: self.generate_access_token(user_id)?,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_lifetime_secs(),
        })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims> {
        self.verify(token, TokenKind::Access)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims> {
        self.verify(token, TokenKind::Refresh)
    }

    pub fn access_token_lifetime_secs(&self) -> i64 {
        self.config.access_token_lifetime.as_secs() as i64
    }

    pub fn refresh_token_lifetime_secs(&self) -> i64 {
        self.config.refresh_token_lifetime.as_secs() as i64
    }
}

/// Storage form of a refresh token: hex SHA-256
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn service() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            access_token_lifetime: StdDuration::from_secs(900),
            refresh_token_lifetime: StdDuration::from_secs(86400),
        })
    }

    #[test]
    fn test_access_token_carries_only_subject() {
        let service = service();
        let user_id = Uuid::now_v7();
        let token = service.generate_access_token(user_id).unwrap();

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.token_type, TokenKind::Access);
        assert_eq!(claims.sub, user_id.to_string());
        assert!(claims.exp > claims.iat);

        let payload = decode::<serde_json::Value>(
            &token,
            &DecodingKey::from_secret(b"test-secret-key-for-testing"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims;
        assert!(payload.get("role").is_none());
        assert!(payload.get("username").is_none());
    }

    #[test]
    fn test_refresh_token() {
        let service = service();
        let user_id = Uuid::now_v7();
        let (token, jti) = service.generate_refresh_token(user_id).unwrap();

        let claims = service.validate_refresh_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.jti, jti);
        assert_eq!(jti.len(), 32);
    }

    #[test]
    fn test_token_pair() {
        let pair = service().generate_token_pair(Uuid::now_v7()).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let service = service();
        let user_id = Uuid::now_v7();
        let (refresh, _) = service.generate_refresh_token(user_id).unwrap();
        let access = service.generate_access_token(user_id).unwrap();

        assert!(service.validate_access_token(&refresh).is_err());
        assert!(service.validate_refresh_token(&access).is_err());
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let token = service().generate_access_token(Uuid::now_v7()).unwrap();
        let other = JwtService::new(JwtConfig {
            secret: "another-secret".to_string(),
            ..Default::default()
        });
        assert!(other.validate_access_token(&token).is_err());
        assert!(other.validate_access_token("garbage").is_err());
    }

    #[test]
    fn test_hash_token() {
        let hash = hash_token("test-token-123");
        assert_eq!(hash, hash_token("test-token-123"));
        assert_ne!(hash, hash_token("test-token-124"));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
