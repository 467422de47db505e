// Client-side session
//
// The CLI owns one SessionStore per process. On startup the persisted
// credentials are validated against the server; until that finishes the
// store is Initializing and navigation waits for it.
//
// Decision: An expired access token is refreshed once during validation and
// the rotated tokens are written back to the credentials file.
// Decision: Credentials issued by a different server are ignored.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bizdesk_core::{
    CredentialError, CredentialValidator, Identity, NavigationOutcome, Navigator,
    PersistedCredential, ReturnPath, RouteTable, SessionState, SessionStore,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{Client, ClientError};
use crate::credentials::{CredentialsFile, StoredCredentials};

/// Session issued by the server on login or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub identity: Identity,
    pub return_to: String,
}

/// Validates persisted credentials through `/v1/auth/me`.
pub struct RemoteValidator {
    client: Client,
    rotated: Mutex<Option<TokenResponse>>,
}

impl RemoteValidator {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            rotated: Mutex::new(None),
        }
    }

    /// Tokens obtained by refreshing during validation, if any.
    pub fn take_rotated(&self) -> Option<TokenResponse> {
        self.rotated.lock().take()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Identity, CredentialError> {
        let response: TokenResponse = self
            .client
            .post(
                "/v1/auth/refresh",
                &json!({ "refresh_token": refresh_token }),
            )
            .await
            .map_err(|e| match e {
                ClientError::Unauthorized(_) => CredentialError::Expired,
                other => classify(other),
            })?;

        tracing::debug!(username = %response.identity.username, "Access token refreshed");
        let identity = response.identity.clone();
        *self.rotated.lock() = Some(response);
        Ok(identity)
    }
}

fn classify(error: ClientError) -> CredentialError {
    match error {
        ClientError::Http(e) => CredentialError::unreachable(e.to_string()),
        ClientError::Unauthorized(message) => CredentialError::rejected(message),
        ClientError::NotFound => CredentialError::rejected("session endpoint not found"),
        ClientError::Api { status, message } if status >= 500 => {
            CredentialError::unreachable(format!("server error {}: {}", status, message))
        }
        ClientError::Api { status, message } => {
            CredentialError::rejected(format!("{}: {}", status, message))
        }
    }
}

#[async_trait]
impl CredentialValidator for RemoteValidator {
    async fn validate(
        &self,
        credential: &PersistedCredential,
    ) -> std::result::Result<Identity, CredentialError> {
        let me = self
            .client
            .with_token(&credential.access_token)
            .get::<Identity>("/v1/auth/me")
            .await;

        match (me, &credential.refresh_token) {
            (Ok(identity), _) => Ok(identity),
            (Err(ClientError::Unauthorized(_)), Some(refresh_token)) => {
                self.refresh(refresh_token).await
            }
            (Err(ClientError::Unauthorized(_)), None) => Err(CredentialError::Expired),
            (Err(e), _) => Err(classify(e)),
        }
    }
}

/// The CLI's view of the application: session, routes and server.
pub struct Shell {
    navigator: Navigator,
    client: Client,
    credentials: CredentialsFile,
    access_token: Mutex<Option<String>>,
}

impl Shell {
    /// Build the session store and settle it from the credentials file.
    pub async fn start(
        client: Client,
        credentials: CredentialsFile,
        routes: RouteTable,
        validation_timeout: Duration,
    ) -> Result<Self> {
        let store = Arc::new(SessionStore::new().with_validation_timeout(validation_timeout));
        let shell = Self {
            navigator: Navigator::new(store.clone(), Arc::new(routes)),
            client,
            credentials,
            access_token: Mutex::new(None),
        };

        let stored = shell.load_stored();
        let validator = RemoteValidator::new(shell.client.clone());
        let state = store
            .init(&validator, stored.as_ref().map(StoredCredentials::persisted))
            .await?;

        match (validator.take_rotated(), stored) {
            (Some(rotated), _) => {
                if let Err(e) = shell.remember(&rotated) {
                    tracing::warn!(error = %e, "Refreshed session could not be saved");
                }
            }
            (None, Some(stored)) if state.is_authenticated() => {
                *shell.access_token.lock() = Some(stored.access_token);
            }
            (None, Some(_)) => {
                tracing::warn!("Saved session is no longer valid; run `bizdesk login`");
            }
            (None, None) => {}
        }

        Ok(shell)
    }

    /// Saved credentials for this server. Anything unusable starts the
    /// session anonymous.
    fn load_stored(&self) -> Option<StoredCredentials> {
        let loaded = match self.credentials.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read credentials file, starting signed out");
                return None;
            }
        };
        if let Some(reason) = loaded.corruption_error {
            tracing::warn!(
                path = %self.credentials.path().display(),
                reason = %reason,
                "Ignoring corrupted credentials file"
            );
            return None;
        }

        loaded.credentials.filter(|stored| {
            let same_server = stored.api_url.trim_end_matches('/') == self.client.base_url();
            if !same_server {
                tracing::debug!(
                    saved_for = %stored.api_url,
                    "Saved credentials belong to another server"
                );
            }
            same_server
        })
    }

    /// Persist a freshly issued session and use its access token.
    fn remember(&self, tokens: &TokenResponse) -> Result<()> {
        *self.access_token.lock() = Some(tokens.access_token.clone());
        self.credentials.save(&StoredCredentials::new(
            self.client.base_url(),
            &tokens.identity.username,
            tokens.access_token.clone(),
            Some(tokens.refresh_token.clone()),
        ))?;
        Ok(())
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn state(&self) -> SessionState {
        self.navigator.store().snapshot()
    }

    /// Client carrying the current session's token.
    pub fn authorized_client(&self) -> Client {
        match self.access_token.lock().as_deref() {
            Some(token) => self.client.with_token(token),
            None => self.client.clone(),
        }
    }

    /// Log in and navigate to where the user was headed.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        return_to: &ReturnPath,
    ) -> Result<NavigationOutcome> {
        let tokens: TokenResponse = self
            .client
            .post(
                "/v1/auth/login",
                &json!({
                    "username": username,
                    "password": password,
                    "redirect": return_to.as_str(),
                }),
            )
            .await
            .map_err(|e| match e {
                ClientError::Unauthorized(message) => anyhow::anyhow!(message),
                other => anyhow::Error::new(other).context("Login request failed"),
            })?;

        self.remember(&tokens)?;
        let outcome = self
            .navigator
            .complete_login(tokens.identity, &ReturnPath::sanitize(&tokens.return_to))?;
        Ok(outcome)
    }

    /// Revoke the server session (best effort), forget credentials, go to login.
    pub async fn logout(&self) -> Result<NavigationOutcome> {
        let stored = self.credentials.load().ok().and_then(|loaded| loaded.credentials);
        if let Some(refresh_token) = stored.and_then(|s| s.refresh_token) {
            if let Err(e) = self
                .client
                .post_no_content(
                    "/v1/auth/logout",
                    &json!({ "refresh_token": refresh_token }),
                )
                .await
            {
                tracing::warn!(error = %e, "Server logout failed, forgetting credentials anyway");
            }
        }

        *self.access_token.lock() = None;
        let outcome = self.navigator.logout()?;

        let removed = self
            .credentials
            .clear()
            .context("Failed to remove credentials file")?;
        tracing::debug!(removed, "Credentials cleared");
        Ok(outcome)
    }

    /// Navigate to `path` once the session has settled.
    pub async fn open(&self, path: &str) -> NavigationOutcome {
        self.navigator.navigate_settled(path).await
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.navigator.store().teardown();
    }
}
