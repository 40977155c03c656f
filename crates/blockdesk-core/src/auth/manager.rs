//! Session lifecycle: login, silent refresh, retry-once on rejection, logout.
//!
//! One `SessionManager` owns the credential pair for the whole client. It is
//! shared behind an `Arc` by the API client and the console. Refresh is
//! serialized by `refresh_gate`: when several requests find the access token
//! stale at the same time, the first one refreshes and the rest wait on the
//! gate, then pick up the token it stored.

use std::fmt;
use std::future::Future;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::client::build_http_client;
use crate::api::ApiError;

use super::session::{Identity, SessionData, SessionStore};

const LOGIN_PATH: &str = "/login/";
const REFRESH_PATH: &str = "/token/refresh/";

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
}

#[derive(Clone)]
enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated(SessionData),
    /// Holds the session being replaced so `logout` can still find it.
    Refreshing(SessionData),
}

impl AuthState {
    fn phase(&self) -> SessionState {
        match self {
            AuthState::Unauthenticated => SessionState::Unauthenticated,
            AuthState::Authenticating => SessionState::Authenticating,
            AuthState::Authenticated(_) => SessionState::Authenticated,
            AuthState::Refreshing(_) => SessionState::Refreshing,
        }
    }

    fn session(&self) -> Option<&SessionData> {
        match self {
            AuthState::Authenticated(s) | AuthState::Refreshing(s) => Some(s),
            AuthState::Unauthenticated | AuthState::Authenticating => None,
        }
    }
}

/// Which attempt of a request this is, and with which bearer it was sent.
///
/// Call sites pass this by value instead of flagging the request itself, so
/// a request can go through at most one refresh-and-retry cycle.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestAttempt {
    token: String,
    retries: u8,
}

impl RequestAttempt {
    pub const MAX_RETRIES: u8 = 1;

    pub fn first(token: String) -> Self {
        Self { token, retries: 0 }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }

    pub fn is_retry(&self) -> bool {
        self.retries >= Self::MAX_RETRIES
    }

    fn retry_with(&self, token: String) -> Self {
        Self {
            token,
            retries: self.retries + 1,
        }
    }
}

impl fmt::Debug for RequestAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAttempt")
            .field("token", &"<redacted>")
            .field("retries", &self.retries)
            .finish()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    is_staff: Option<bool>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

pub struct SessionManager {
    http: Client,
    base_url: String,
    store: Option<SessionStore>,
    state: RwLock<AuthState>,
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    /// Create a manager talking to `base_url` (e.g. `http://localhost:8000/api`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self::with_client(build_http_client()?, base_url))
    }

    /// Create a manager sharing an existing connection pool.
    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            store: None,
            state: RwLock::new(AuthState::Unauthenticated),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Persist tokens through `store` and restore them with [`Self::restore`].
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The connection pool; clone is cheap.
    pub fn http_client(&self) -> &Client {
        &self.http
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Queries =====

    pub async fn state(&self) -> SessionState {
        self.state.read().await.phase()
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.state.read().await.session().map(|s| s.identity.clone())
    }

    /// True while a session exists (including mid-refresh).
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.session().is_some()
    }

    pub async fn is_privileged(&self) -> bool {
        self.state
            .read()
            .await
            .session()
            .map(|s| s.identity.is_privileged)
            .unwrap_or(false)
    }

    pub async fn minutes_until_expiry(&self) -> Option<i64> {
        self.state
            .read()
            .await
            .session()
            .map(|s| s.minutes_until_expiry())
    }

    // ===== Lifecycle =====

    /// Restore a persisted session. An expired access token is refreshed
    /// once; anything unusable leaves the manager unauthenticated.
    pub async fn restore(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };

        let tokens = match store.load() {
            Ok(Some(tokens)) => tokens,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session file");
                self.forget();
                return false;
            }
        };

        let fallback = tokens.username.clone().map(|name| Identity {
            name,
            is_privileged: false,
        });
        match SessionData::from_tokens(tokens.access, tokens.refresh, fallback.as_ref()) {
            Ok(session) => *self.state.write().await = AuthState::Authenticated(session),
            Err(e) => {
                warn!(error = %e, "Discarding persisted session with unusable access token");
                self.forget();
                return false;
            }
        }

        match self.ensure_valid_credential().await {
            Ok(_) => {
                info!("Restored persisted session");
                true
            }
            Err(e) => {
                warn!(error = %e, "Persisted session could not be restored");
                self.logout().await;
                false
            }
        }
    }

    /// Authenticate with username and password.
    ///
    /// A rejected login leaves whatever state existed before untouched and is
    /// never retried.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, ApiError> {
        let previous = {
            let mut state = self.state.write().await;
            let previous = state.clone();
            if matches!(previous, AuthState::Unauthenticated) {
                *state = AuthState::Authenticating;
            }
            previous
        };

        debug!(username, "Sending login request");
        let result = self.request_login(username, password).await;

        let mut state = self.state.write().await;
        match result {
            Ok(session) => {
                let identity = session.identity.clone();
                self.persist(&session);
                *state = AuthState::Authenticated(session);
                info!(user = %identity.name, privileged = identity.is_privileged, "Login successful");
                Ok(identity)
            }
            Err(err) => {
                if matches!(*state, AuthState::Authenticating) {
                    *state = previous;
                }
                warn!(error = %err, "Login failed");
                Err(err)
            }
        }
    }

    /// Clear all credential state. Always succeeds; calling it twice is fine.
    pub async fn logout(&self) {
        let was = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, AuthState::Unauthenticated).phase()
        };
        self.forget();
        if was != SessionState::Unauthenticated {
            info!("Session cleared");
        }
    }

    // ===== Credentials for outgoing requests =====

    /// Access token to attach to the next request.
    ///
    /// An unexpired cached token is returned without touching the network.
    /// An expired one triggers a single shared refresh.
    pub async fn ensure_valid_credential(&self) -> Result<String, ApiError> {
        let stale = {
            let state = self.state.read().await;
            match &*state {
                AuthState::Authenticated(s) if !s.is_expired() => {
                    return Ok(s.access_token.clone());
                }
                AuthState::Authenticated(s) | AuthState::Refreshing(s) => s.access_token.clone(),
                AuthState::Unauthenticated | AuthState::Authenticating => {
                    return Err(ApiError::NoCredential);
                }
            }
        };

        debug!("Access token expired, refreshing before request");
        self.refresh_after(&stale).await
    }

    /// Resolve a token rejection for the request described by `attempt`.
    ///
    /// On a first attempt this refreshes (sharing any refresh already in
    /// flight) and calls `reissue` exactly once with the new bearer. A retry
    /// that is rejected again, or a failed refresh, ends the session.
    pub async fn handle_auth_rejection<T, F, Fut>(
        &self,
        attempt: RequestAttempt,
        rejection: ApiError,
        reissue: F,
    ) -> Result<T, ApiError>
    where
        F: FnOnce(RequestAttempt) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if !rejection.is_token_rejection() {
            return Err(rejection);
        }

        if attempt.is_retry() {
            warn!(retries = attempt.retries(), "Refreshed credential rejected, ending session");
            self.logout().await;
            return Err(rejection);
        }

        let token = self.refresh_after(attempt.token()).await?;

        debug!("Reissuing rejected request with refreshed credential");
        match reissue(attempt.retry_with(token)).await {
            Err(err) if err.is_token_rejection() => {
                warn!("Refreshed credential rejected, ending session");
                self.logout().await;
                Err(err)
            }
            other => other,
        }
    }

    // ===== Internals =====

    /// Refresh unless someone already replaced `stale` while we waited. A
    /// replacement is handed back as-is, even inside the expiry leeway.
    async fn refresh_after(&self, stale: &str) -> Result<String, ApiError> {
        let _gate = self.refresh_gate.lock().await;

        let current = {
            let mut state = self.state.write().await;
            let session = match state.session() {
                Some(s) => s.clone(),
                None => return Err(ApiError::NoCredential),
            };
            if session.access_token != stale {
                debug!("Access token already refreshed by a concurrent request");
                return Ok(session.access_token);
            }
            *state = AuthState::Refreshing(session.clone());
            session
        };

        info!("Refreshing access token");
        let result = self.request_refresh(&current).await;

        let mut state = self.state.write().await;
        let still_ours = matches!(
            &*state,
            AuthState::Refreshing(s) if s.refresh_token == current.refresh_token
        );
        if !still_ours {
            // Logged out (or logged in again) while the refresh was in flight.
            debug!("Session changed during refresh, discarding result");
            return match &*state {
                AuthState::Authenticated(s) if !s.is_expired() => Ok(s.access_token.clone()),
                _ => Err(ApiError::NoCredential),
            };
        }

        match result {
            Ok(session) => {
                let token = session.access_token.clone();
                self.persist(&session);
                info!(
                    user = %session.identity.name,
                    minutes_left = session.minutes_until_expiry(),
                    "Access token refreshed"
                );
                *state = AuthState::Authenticated(session);
                Ok(token)
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, ending session");
                *state = AuthState::Unauthenticated;
                drop(state);
                self.forget();
                Err(ApiError::RefreshFailed(err.to_string()))
            }
        }
    }

    async fn request_login(&self, username: &str, password: &str) -> Result<SessionData, ApiError> {
        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_login_status(status, &body));
        }

        let body: LoginResponse = response.json().await?;
        let fallback = body.username.map(|name| Identity {
            name,
            is_privileged: body.is_staff.unwrap_or(false),
        });
        Ok(SessionData::from_tokens(body.access, body.refresh, fallback.as_ref())?)
    }

    async fn request_refresh(&self, current: &SessionData) -> Result<SessionData, ApiError> {
        let response = self
            .http
            .post(self.endpoint(REFRESH_PATH))
            .json(&RefreshRequest {
                refresh: &current.refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let body: RefreshResponse = response.json().await?;
        Ok(current.refreshed(body.access, body.refresh)?)
    }

    fn persist(&self, session: &SessionData) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&session.to_stored()) {
                warn!(error = %e, "Failed to persist session");
            }
        }
    }

    fn forget(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to remove persisted session");
            }
        }
    }
}
