//! Decoding of the self-describing access token.
//!
//! The client never verifies the signature; the backend does that on every
//! request. Decoding here only reads the claims the console needs: expiry,
//! subject and the staff flag.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Identity;
use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum ClaimsError {
    #[error("access token is not a three-part JWT")]
    Malformed,

    #[error("access token payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("access token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("access token has no subject claim")]
    MissingSubject,

    #[error("access token expiry {0} is out of range")]
    BadExpiry(i64),
}

impl From<ClaimsError> for ApiError {
    fn from(err: ClaimsError) -> Self {
        ApiError::InvalidResponse(format!("unusable access token: {err}"))
    }
}

/// Claims carried by the access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub exp: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub is_staff: Option<bool>,
}

impl AccessClaims {
    /// Decode the payload segment of a JWT without verifying it.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let mut parts = token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
            _ => return Err(ClaimsError::Malformed),
        };

        // Some issuers keep the padding; the URL-safe no-pad engine rejects it.
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, ClaimsError> {
        DateTime::from_timestamp(self.exp, 0).ok_or(ClaimsError::BadExpiry(self.exp))
    }

    /// Subject shown to the user: `username`, then `user_id`, then `sub`.
    pub fn subject(&self) -> Option<String> {
        if let Some(name) = self.username.as_ref().filter(|n| !n.is_empty()) {
            return Some(name.clone());
        }
        match &self.user_id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
        self.sub.clone().filter(|s| !s.is_empty())
    }

    /// Build the identity from the claims, using `fallback` for anything the
    /// token does not carry.
    pub fn identity(&self, fallback: Option<&Identity>) -> Result<Identity, ClaimsError> {
        let name = self
            .subject()
            .or_else(|| fallback.map(|f| f.name.clone()))
            .ok_or(ClaimsError::MissingSubject)?;
        let is_privileged = self
            .is_staff
            .or_else(|| fallback.map(|f| f.is_privileged))
            .unwrap_or(false);
        Ok(Identity { name, is_privileged })
    }
}
