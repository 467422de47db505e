// Identity domain type
//
// The authenticated principal. Shared by the server (token claims, /me) and
// the CLI session store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::role::Role;

/// An authenticated user and the role that drives access decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Identity {
    /// Unique identifier of the user.
    pub id: Uuid,
    /// Login name. Unique across users.
    pub username: String,
    /// Human-readable name.
    pub display_name: String,
    /// Contact email, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Business role of the user.
    pub role: Role,
}

impl Identity {
    pub fn new(id: Uuid, username: impl Into<String>, role: Role) -> Self {
        let username = username.into();
        Self {
            id,
            display_name: username.clone(),
            username,
            email: None,
            role,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_builder() {
        let identity = Identity::new(Uuid::nil(), "maria", Role::Cashier)
            .with_display_name("Maria Lopez")
            .with_email("maria@example.com");

        assert_eq!(identity.username, "maria");
        assert_eq!(identity.display_name, "Maria Lopez");
        assert_eq!(identity.email.as_deref(), Some("maria@example.com"));
        assert!(!identity.is_admin());
    }

    #[test]
    fn test_identity_serialization() {
        let identity = Identity::new(Uuid::nil(), "root", Role::Admin);
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["display_name"], "root");
        assert!(json.get("email").is_none());

        let back: Identity = serde_json::from_value(json).unwrap();
        assert_eq!(back, identity);
    }
}
