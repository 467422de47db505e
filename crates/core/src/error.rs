// Error types for session handling and route configuration
//
// Access denials are not errors: they are GateDecision values. Only misuse of
// the session lifecycle, credential validation failures and bad route
// declarations surface here.

use thiserror::Error;

/// Result type alias for session store operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors from the session store lifecycle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// `init` was called on a store that already started initializing
    #[error("Session store already initialized")]
    AlreadyInitialized,

    /// The store was torn down and accepts no further transitions
    #[error("Session store has been torn down")]
    TornDown,
}

/// Errors from validating a persisted credential against the authority.
///
/// Every variant resolves the session to anonymous.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The authority rejected the credential
    #[error("Credential rejected: {0}")]
    Rejected(String),

    /// The credential is past its lifetime and could not be renewed
    #[error("Credential expired")]
    Expired,

    /// The authority could not be reached
    #[error("Authority unreachable: {0}")]
    Unreachable(String),

    /// Validation did not finish in time
    #[error("Credential validation timed out")]
    TimedOut,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CredentialError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        CredentialError::Rejected(msg.into())
    }

    pub fn unreachable(msg: impl Into<String>) -> Self {
        CredentialError::Unreachable(msg.into())
    }
}

/// Errors in route declarations
#[derive(Debug, Error)]
pub enum RouteConfigError {
    #[error("Route path must start with '/': {0}")]
    InvalidPath(String),

    #[error("Route declared more than once: {0}")]
    DuplicatePath(String),

    #[error("Failed to parse route declarations: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to read route declarations: {0}")]
    Io(#[from] std::io::Error),
}
