// Session store
//
// Single source of truth for "who is logged in". State machine:
//
//   Initializing ──init──▶ Authenticated(identity) | Anonymous
//   Anonymous ──login──▶ Authenticated
//   Authenticated ──logout/expire──▶ Anonymous
//   any ──teardown──▶ Anonymous (final)
//
// Decision: Hold the state in a tokio watch channel. Every transition replaces
// the whole value under the channel's lock, so readers see either the old or
// the new state, never a mix. Subscribers are woken on each transition.
// Decision: Identities are shared as Arc<Identity> and never mutated in place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{CredentialError, Result, SessionError};
use crate::identity::Identity;

/// Default upper bound on credential validation during `init`.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Current state of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Persisted credentials are still being validated. Nothing is known yet.
    Initializing,
    /// A validated identity is logged in.
    Authenticated(Arc<Identity>),
    /// Nobody is logged in.
    Anonymous,
}

impl SessionState {
    /// True once the state is authoritative (not `Initializing`).
    pub fn is_settled(&self) -> bool {
        !matches!(self, SessionState::Initializing)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::Authenticated(identity) => {
                write!(f, "authenticated as {} ({})", identity.username, identity.role)
            }
            SessionState::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// Credential persisted between runs and validated on startup.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCredential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl PersistedCredential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl fmt::Debug for PersistedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedCredential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Validates a persisted credential against the remote authority.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(
        &self,
        credential: &PersistedCredential,
    ) -> std::result::Result<Identity, CredentialError>;
}

/// Process-wide session context.
///
/// Construct one per process (or per test) and share it through `Arc`.
pub struct SessionStore {
    state: watch::Sender<SessionState>,
    init_started: AtomicBool,
    torn_down: AtomicBool,
    validation_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create a store in `Initializing`.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Initializing);
        Self {
            state,
            init_started: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    /// Current state. Cheap: identities are reference counted.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The logged-in identity, if any.
    pub fn identity(&self) -> Option<Arc<Identity>> {
        match &*self.state.borrow() {
            SessionState::Authenticated(identity) => Some(identity.clone()),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state.borrow().is_settled()
    }

    /// Receiver woken on every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait until the store leaves `Initializing` and return the settled state.
    pub async fn ready(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(SessionState::is_settled).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so this only happens during drop.
            Err(_) => SessionState::Anonymous,
        };
        settled
    }

    /// Validate the persisted credential and settle the store.
    ///
    /// No credential, a rejected credential, a validator error or a timeout all
    /// settle to `Anonymous`. If a login already settled the store while the
    /// validation was in flight, the login wins.
    pub async fn init<V>(
        &self,
        validator: &V,
        credential: Option<PersistedCredential>,
    ) -> Result<SessionState>
    where
        V: CredentialValidator + ?Sized,
    {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(SessionError::TornDown);
        }
        if self
            .init_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::AlreadyInitialized);
        }

        let settled = match credential {
            None => {
                tracing::debug!("No persisted credential, session is anonymous");
                SessionState::Anonymous
            }
            Some(credential) => {
                let outcome =
                    tokio::time::timeout(self.validation_timeout, validator.validate(&credential))
                        .await
                        .unwrap_or(Err(CredentialError::TimedOut));
                match outcome {
                    Ok(identity) => {
                        tracing::info!(
                            user_id = %identity.id,
                            username = %identity.username,
                            role = %identity.role,
                            "Restored session from persisted credential"
                        );
                        SessionState::Authenticated(Arc::new(identity))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Persisted credential not accepted, session is anonymous");
                        SessionState::Anonymous
                    }
                }
            }
        };

        let applied = self.state.send_if_modified(|current| {
            if self.torn_down.load(Ordering::SeqCst) || current.is_settled() {
                return false;
            }
            *current = settled;
            true
        });
        if !applied {
            tracing::debug!("Session settled before validation finished, keeping current state");
        }

        Ok(self.snapshot())
    }

    /// Login succeeded: the identity becomes the session's identity.
    pub fn login(&self, identity: Identity) -> Result<()> {
        let identity = Arc::new(identity);
        self.transition(SessionState::Authenticated(identity.clone()))?;
        tracing::info!(
            user_id = %identity.id,
            username = %identity.username,
            role = %identity.role,
            "Session authenticated"
        );
        Ok(())
    }

    /// Logout: drop the identity.
    pub fn logout(&self) -> Result<()> {
        self.transition(SessionState::Anonymous)?;
        tracing::info!("Session logged out");
        Ok(())
    }

    /// Session expiry. Returns true if an identity was dropped.
    pub fn expire(&self) -> bool {
        let expired = self.state.send_if_modified(|current| {
            if !current.is_authenticated() {
                return false;
            }
            *current = SessionState::Anonymous;
            true
        });
        if expired {
            tracing::info!("Session expired");
        }
        expired
    }

    /// Final transition. The store stays anonymous afterwards.
    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
        self.state.send_replace(SessionState::Anonymous);
        tracing::debug!("Session store torn down");
    }

    fn transition(&self, next: SessionState) -> Result<()> {
        let mut rejected = false;
        self.state.send_if_modified(|current| {
            if self.torn_down.load(Ordering::SeqCst) {
                rejected = true;
                return false;
            }
            *current = next;
            true
        });
        if rejected {
            return Err(SessionError::TornDown);
        }
        Ok(())
    }
}
