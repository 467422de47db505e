// Persisted credentials
// Decision: One JSON file per user, BIZDESK_CREDENTIALS or ~/.bizdesk/credentials.json
// Decision: A corrupted file is reported, not fatal; the session starts anonymous

use bizdesk_core::PersistedCredential;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CREDENTIALS_ENV: &str = "BIZDESK_CREDENTIALS";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Cannot locate credentials file: set {CREDENTIALS_ENV} or HOME")]
    NoLocation,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode credentials: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What is written to disk after a successful login.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub schema_version: u32,
    /// Server that issued the tokens
    pub api_url: String,
    pub username: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl StoredCredentials {
    pub fn new(
        api_url: &str,
        username: &str,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            api_url: api_url.to_string(),
            username: username.to_string(),
            access_token,
            refresh_token,
            saved_at: Utc::now(),
        }
    }

    pub fn persisted(&self) -> PersistedCredential {
        let credential = PersistedCredential::new(self.access_token.clone());
        match &self.refresh_token {
            Some(refresh) => credential.with_refresh_token(refresh.clone()),
            None => credential,
        }
    }
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("saved_at", &self.saved_at)
            .finish_non_exhaustive()
    }
}

/// Result of loading credentials - distinguishes "not found" from corruption.
#[derive(Debug, Default)]
pub struct LoadResult {
    pub credentials: Option<StoredCredentials>,
    /// Present if the file exists but cannot be read as credentials
    pub corruption_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CredentialsFile {
    path: PathBuf,
}

impl CredentialsFile {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location from the environment.
    pub fn from_env() -> Result<Self, CredentialsError> {
        if let Some(path) = std::env::var_os(CREDENTIALS_ENV).filter(|p| !p.is_empty()) {
            return Ok(Self::at(path));
        }
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .ok_or(CredentialsError::NoLocation)?;
        Ok(Self::at(
            Path::new(&home).join(".bizdesk").join("credentials.json"),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CredentialsError {
        CredentialsError::Io {
            path: self.path.clone(),
            source,
        }
    }

    pub fn load(&self) -> Result<LoadResult, CredentialsError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoadResult::default()),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_str::<StoredCredentials>(&raw) {
            Ok(credentials) if credentials.schema_version == SCHEMA_VERSION => Ok(LoadResult {
                credentials: Some(credentials),
                corruption_error: None,
            }),
            Ok(credentials) => Ok(LoadResult {
                credentials: None,
                corruption_error: Some(format!(
                    "unsupported schema version {}",
                    credentials.schema_version
                )),
            }),
            Err(e) => Ok(LoadResult {
                credentials: None,
                corruption_error: Some(e.to_string()),
            }),
        }
    }

    /// Write atomically (temp file + rename), readable by the owner only.
    pub fn save(&self, credentials: &StoredCredentials) -> Result<(), CredentialsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(credentials)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        restrict_permissions(&tmp).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    /// Remove the file. Returns whether there was one.
    pub fn clear(&self) -> Result<bool, CredentialsError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredCredentials {
        StoredCredentials::new(
            "http://localhost:9000",
            "sam",
            "access".to_string(),
            Some("refresh".to_string()),
        )
    }

    #[test]
    fn test_missing_file_is_not_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let file = CredentialsFile::at(dir.path().join("credentials.json"));

        let result = file.load().unwrap();
        assert!(result.credentials.is_none());
        assert!(result.corruption_error.is_none());
        assert!(!file.clear().unwrap());
    }

    #[test]
    fn test_save_creates_directories_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = CredentialsFile::at(dir.path().join("nested").join("credentials.json"));
        file.save(&sample()).unwrap();

        let loaded = file.load().unwrap().credentials.unwrap();
        assert_eq!(loaded.username, "sam");
        assert_eq!(loaded.persisted().refresh_token.as_deref(), Some("refresh"));
        assert!(!dir.path().join("nested").join("credentials.json.tmp").exists());

        assert!(file.clear().unwrap());
        assert!(file.load().unwrap().credentials.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let file = CredentialsFile::at(dir.path().join("credentials.json"));
        file.save(&sample()).unwrap();

        let mode = std::fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = CredentialsFile::at(&path).load().unwrap();
        assert!(result.credentials.is_none());
        assert!(result.corruption_error.is_some());
    }

    #[test]
    fn test_unknown_schema_version_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let mut value = serde_json::to_value(sample()).unwrap();
        value["schema_version"] = serde_json::json!(99);
        std::fs::write(&path, value.to_string()).unwrap();

        let result = CredentialsFile::at(&path).load().unwrap();
        assert!(result.credentials.is_none());
        assert!(result
            .corruption_error
            .unwrap()
            .contains("schema version 99"));
    }

    #[test]
    fn test_debug_hides_tokens() {
        let debug = format!("{:?}", sample());
        assert!(debug.contains("sam"));
        assert!(!debug.contains("access"));
        assert!(!debug.contains("refresh"));
    }
}
