use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::claims::{AccessClaims, ClaimsError};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Access tokens this close to expiry are treated as expired, so a request
/// does not leave with a token that lapses in transit.
const EXPIRY_LEEWAY_SECS: i64 = 10;

/// Who the access token says the user is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    /// Staff flag; grants the API key and API log views.
    pub is_privileged: bool,
}

/// The live credential pair plus what was decoded from the access token.
#[derive(Clone)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl fmt::Debug for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionData")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("identity", &self.identity)
            .finish()
    }
}

impl SessionData {
    /// Build a session from a fresh token pair. `fallback` supplies identity
    /// fields the access token does not carry.
    pub fn from_tokens(
        access_token: String,
        refresh_token: String,
        fallback: Option<&Identity>,
    ) -> Result<Self, ClaimsError> {
        let claims = AccessClaims::decode(&access_token)?;
        Ok(Self {
            expires_at: claims.expires_at()?,
            identity: claims.identity(fallback)?,
            access_token,
            refresh_token,
        })
    }

    /// Swap in a refreshed access token, re-decoding identity and expiry.
    /// A rotated refresh token replaces the old one when the backend sends it.
    pub fn refreshed(
        &self,
        access_token: String,
        rotated_refresh: Option<String>,
    ) -> Result<Self, ClaimsError> {
        Self::from_tokens(
            access_token,
            rotated_refresh.unwrap_or_else(|| self.refresh_token.clone()),
            Some(&self.identity),
        )
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }

    pub fn to_stored(&self) -> StoredTokens {
        StoredTokens {
            access: self.access_token.clone(),
            refresh: self.refresh_token.clone(),
            username: Some(self.identity.name.clone()),
            saved_at: Utc::now(),
        }
    }
}

/// On-disk form of the token pair.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub username: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// Persists the token pair between runs.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load tokens from disk
    pub fn load(&self) -> Result<Option<StoredTokens>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let tokens: StoredTokens =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(tokens))
    }

    /// Save tokens to disk
    pub fn save(&self, tokens: &StoredTokens) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    /// Remove the session file; a missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .context("Failed to restrict session file permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::tests::token_with;
    use serde_json::json;

    fn token_expiring_in(secs: i64, staff: bool) -> String {
        token_with(json!({
            "exp": (Utc::now() + Duration::seconds(secs)).timestamp(),
            "username": "analyst",
            "is_staff": staff,
        }))
    }

    #[test]
    fn test_from_tokens_decodes_identity_and_expiry() {
        let access = token_expiring_in(3600, true);
        let session = SessionData::from_tokens(access.clone(), "r1".into(), None).expect("session");
        assert_eq!(session.access_token, access);
        assert_eq!(session.identity.name, "analyst");
        assert!(session.identity.is_privileged);
        assert!(!session.is_expired());
        assert!(session.minutes_until_expiry() >= 59);
    }

    #[test]
    fn test_expiry_includes_leeway() {
        let session =
            SessionData::from_tokens(token_expiring_in(EXPIRY_LEEWAY_SECS / 2, false), "r".into(), None)
                .expect("session");
        assert!(session.is_expired());

        let session = SessionData::from_tokens(token_expiring_in(-60, false), "r".into(), None)
            .expect("session");
        assert!(session.is_expired());
        assert_eq!(session.minutes_until_expiry(), 0);
    }

    #[test]
    fn test_refreshed_keeps_or_rotates_refresh_token() {
        let session = SessionData::from_tokens(token_expiring_in(-60, false), "r1".into(), None)
            .expect("session");

        let kept = session
            .refreshed(token_expiring_in(600, false), None)
            .expect("refreshed");
        assert_eq!(kept.refresh_token, "r1");
        assert!(!kept.is_expired());

        let rotated = session
            .refreshed(token_expiring_in(600, false), Some("r2".into()))
            .expect("refreshed");
        assert_eq!(rotated.refresh_token, "r2");
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let session = SessionData::from_tokens(token_expiring_in(600, false), "secret-refresh".into(), None)
            .expect("session");
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("analyst"));
    }

    #[test]
    fn test_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(&dir.path().join("nested"));
        assert!(store.load().expect("load").is_none());

        let session = SessionData::from_tokens(token_expiring_in(600, false), "r1".into(), None)
            .expect("session");
        store.save(&session.to_stored()).expect("save");

        let loaded = store.load().expect("load").expect("tokens present");
        assert_eq!(loaded.access, session.access_token);
        assert_eq!(loaded.refresh, "r1");
        assert_eq!(loaded.username.as_deref(), Some("analyst"));

        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
        store.clear().expect("clear is idempotent");
    }

    #[test]
    fn test_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        std::fs::write(store.path(), "{not json").expect("write");
        assert!(store.load().is_err());
    }
}
