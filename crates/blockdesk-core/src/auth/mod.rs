pub mod claims;
pub mod credentials;
pub mod manager;
pub mod session;

use std::fmt;
use std::sync::Arc;

pub use claims::{AccessClaims, ClaimsError};
pub use credentials::CredentialStore;
pub use manager::{RequestAttempt, SessionManager, SessionState};
pub use session::{Identity, SessionData, SessionStore, StoredTokens};

/// How outgoing requests authenticate.
///
/// A request carries either the session's bearer token or a long-lived API
/// key, never both.
#[derive(Clone)]
pub enum Credential {
    Session(Arc<SessionManager>),
    ApiKey(String),
}

impl Credential {
    pub fn session(&self) -> Option<&Arc<SessionManager>> {
        match self {
            Credential::Session(manager) => Some(manager),
            Credential::ApiKey(_) => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Session(manager) => f
                .debug_tuple("Session")
                .field(&manager.base_url())
                .finish(),
            Credential::ApiKey(_) => f.debug_tuple("ApiKey").field(&"<redacted>").finish(),
        }
    }
}
