// In-memory user and refresh-token storage
// Decision: Use parking_lot for thread-safe access
// Decision: UUIDs generated via uuid v7 (time-ordered)
//
// Business data lives elsewhere; this store only holds what sessions need.
// Data is lost on restart.

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use super::models::*;

/// A user with this username (case-insensitive) already exists
#[derive(Debug, Error)]
#[error("Username already exists: {0}")]
pub struct DuplicateUsername(pub String);

#[derive(Default)]
pub struct InMemoryDatabase {
    users: RwLock<HashMap<Uuid, UserRow>>,
    refresh_tokens: RwLock<HashMap<Uuid, RefreshTokenRow>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    // ============================================
    // Users
    // ============================================

    /// Create a user. Usernames are unique (case-insensitive).
    pub async fn create_user(&self, input: CreateUserRow) -> Result<UserRow> {
        let mut users = self.users.write();
        if users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&input.username))
        {
            return Err(DuplicateUsername(input.username).into());
        }

        let now = Self::now();
        let id = Uuid::now_v7();
        let row = UserRow {
            id,
            username: input.username,
            display_name: input.display_name,
            email: input.email,
            role: input.role,
            password_hash: input.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        Ok(self.users.read().get(&id).cloned())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> Result<Option<UserRow>> {
        let mut users = self.users.write();
        if let Some(user) = users.get_mut(&id) {
            if let Some(display_name) = input.display_name {
                user.display_name = display_name;
            }
            if let Some(email) = input.email {
                user.email = Some(email);
            }
            if let Some(role) = input.role {
                user.role = role;
            }
            if let Some(password_hash) = input.password_hash {
                user.password_hash = password_hash;
            }
            user.updated_at = Self::now();
            return Ok(Some(user.clone()));
        }
        Ok(None)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        Ok(self.users.write().remove(&id).is_some())
    }

    /// Users ordered by username, optionally filtered by username, name or email.
    pub async fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRow>> {
        let users = self.users.read();
        let mut result: Vec<_> = match search {
            Some(query) if !query.trim().is_empty() => {
                let pattern = query.trim().to_lowercase();
                users
                    .values()
                    .filter(|u| {
                        u.username.to_lowercase().contains(&pattern)
                            || u.display_name.to_lowercase().contains(&pattern)
                            || u.email
                                .as_deref()
                                .is_some_and(|e| e.to_lowercase().contains(&pattern))
                    })
                    .cloned()
                    .collect()
            }
            _ => users.values().cloned().collect(),
        };
        result.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(result)
    }

    pub async fn count_users(&self) -> Result<usize> {
        Ok(self.users.read().len())
    }

    // ============================================
    // Refresh tokens
    // ============================================

    pub async fn create_refresh_token(
        &self,
        input: CreateRefreshTokenRow,
    ) -> Result<RefreshTokenRow> {
        let id = Uuid::now_v7();
        let row = RefreshTokenRow {
            id,
            user_id: input.user_id,
            token_hash: input.token_hash,
            expires_at: input.expires_at,
            created_at: Self::now(),
        };
        self.refresh_tokens.write().insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRow>> {
        Ok(self
            .refresh_tokens
            .read()
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    pub async fn delete_refresh_token(&self, id: Uuid) -> Result<bool> {
        Ok(self.refresh_tokens.write().remove(&id).is_some())
    }

    pub async fn delete_expired_refresh_tokens(&self) -> Result<u64> {
        let now = Self::now();
        let mut tokens = self.refresh_tokens.write();
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - tokens.len()) as u64)
    }

    pub async fn delete_user_refresh_tokens(&self, user_id: Uuid) -> Result<u64> {
        let mut tokens = self.refresh_tokens.write();
        let before = tokens.len();
        tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }
}
