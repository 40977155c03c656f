//! API client for the blocklist backend.
//!
//! Every request is described by an immutable [`Call`]. The credential is
//! resolved each time the call is dispatched, so a request rejected for an
//! expired token can be sent again with the refreshed one without touching
//! the call itself.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{Credential, RequestAttempt, SessionManager};
use crate::models::audit::AuditLogResponse;
use crate::models::{
    ApiKey, ApiLogEntry, AuditEntry, BlockOutcome, BlocklistEntry, IndicatorChange, IndicatorType,
    NewApiKey, UnblockOutcome,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Build the shared connection pool.
pub fn build_http_client() -> Result<Client, ApiError> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| ApiError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// A request, independent of how it is authenticated.
#[derive(Debug, Clone)]
pub struct Call {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<serde_json::Value>,
}

impl Call {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("failed to encode request body: {e}")))?;
        Ok(Self {
            body: Some(body),
            ..Self::new(Method::POST, path)
        })
    }

    pub fn with_query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Authorization header for one dispatch.
#[derive(Clone, Copy)]
enum AuthScheme<'a> {
    Anonymous,
    Bearer(&'a str),
    ApiKey(&'a str),
}

impl AuthScheme<'_> {
    fn header_value(&self) -> Result<Option<header::HeaderValue>, ApiError> {
        let value = match self {
            AuthScheme::Anonymous => return Ok(None),
            AuthScheme::Bearer(token) => format!("Bearer {token}"),
            AuthScheme::ApiKey(key) => format!("ApiKey {key}"),
        };
        header::HeaderValue::from_str(&value).map(Some).map_err(|_| {
            ApiError::Configuration("credential contains characters not allowed in a header".into())
        })
    }
}

/// API client for the blocklist backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl ApiClient {
    /// Client authenticating with the session's bearer token.
    pub fn from_session(session: Arc<SessionManager>) -> Self {
        Self {
            client: session.http_client().clone(),
            base_url: session.base_url().to_string(),
            credential: Credential::Session(session),
        }
    }

    /// Client authenticating with a long-lived API key.
    pub fn with_api_key(base_url: impl Into<String>, key: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential: Credential::ApiKey(key.into()),
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn session(&self) -> Option<&Arc<SessionManager>> {
        self.credential.session()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ===== Dispatch =====

    /// Send `call` once with the given header. Rate-limited responses are
    /// retried with exponential backoff; other failures become `ApiError`.
    async fn dispatch(&self, call: &Call, auth: AuthScheme<'_>) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, call.path);
        let auth_header = auth.header_value()?;
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            debug!(method = %call.method, path = %call.path, "Sending request");
            let mut request = self.client.request(call.method.clone(), &url);
            if let Some(value) = &auth_header {
                request = request.header(header::AUTHORIZATION, value.clone());
            }
            if !call.query.is_empty() {
                request = request.query(&call.query);
            }
            if let Some(body) = &call.body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(path = %call.path, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
    }

    /// Resolve the credential and send `call`, refreshing and retrying once
    /// if the backend rejects the session's token.
    async fn execute(&self, call: &Call) -> Result<reqwest::Response, ApiError> {
        let session = match &self.credential {
            Credential::ApiKey(key) => return self.dispatch(call, AuthScheme::ApiKey(key)).await,
            Credential::Session(session) => session,
        };

        let attempt = RequestAttempt::first(session.ensure_valid_credential().await?);
        let first = self.dispatch(call, AuthScheme::Bearer(attempt.token())).await;
        match first {
            Err(rejection) if rejection.is_token_rejection() => {
                debug!(path = %call.path, "Token rejected by backend");
                session
                    .handle_auth_rejection(attempt, rejection, |retry| async move {
                        self.dispatch(call, AuthScheme::Bearer(retry.token())).await
                    })
                    .await
            }
            other => other,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, call: Call) -> Result<T, ApiError> {
        let response = self.execute(&call).await?;
        Ok(response.json().await?)
    }

    // ===== Blocklist =====

    /// Combined blocklist, newest first, optionally limited to one type.
    pub async fn fetch_blocklist(
        &self,
        filter: Option<IndicatorType>,
    ) -> Result<Vec<BlocklistEntry>, ApiError> {
        let mut call = Call::get("/blocklist/");
        if let Some(kind) = filter {
            call = call.with_query("indicator_type", kind.as_str());
        }
        self.send_json(call).await
    }

    pub async fn fetch_audit_log(
        &self,
        filter: Option<IndicatorType>,
    ) -> Result<Vec<AuditEntry>, ApiError> {
        let mut call = Call::get("/logs/");
        if let Some(kind) = filter {
            call = call.with_query("indicator_type", kind.as_str());
        }
        let response: AuditLogResponse = self.send_json(call).await?;
        Ok(response.into_entries())
    }

    pub async fn block_indicators(
        &self,
        kind: IndicatorType,
        indicators: &[String],
        reason: &str,
    ) -> Result<BlockOutcome, ApiError> {
        let call = Call::post("/block/", &IndicatorChange::new(kind, indicators, reason))?;
        self.send_json(call).await
    }

    pub async fn unblock_indicators(
        &self,
        kind: IndicatorType,
        indicators: &[String],
        reason: &str,
    ) -> Result<UnblockOutcome, ApiError> {
        let call = Call::post("/unblock/", &IndicatorChange::new(kind, indicators, reason))?;
        self.send_json(call).await
    }

    /// Authenticated JSON list of one type's indicators.
    pub async fn fetch_indicators(&self, kind: IndicatorType) -> Result<Vec<String>, ApiError> {
        self.send_json(Call::get(kind.list_path())).await
    }

    /// Plain-text list of one type's indicators. Sent without any credential.
    pub async fn fetch_raw_blocklist(&self, kind: IndicatorType) -> Result<String, ApiError> {
        let response = self
            .dispatch(&Call::get(kind.raw_path()), AuthScheme::Anonymous)
            .await?;
        Ok(response.text().await?)
    }

    // ===== API keys =====

    pub async fn list_api_keys(&self) -> Result<Vec<ApiKey>, ApiError> {
        self.send_json(Call::get("/api-keys/")).await
    }

    pub async fn create_api_key(&self, name: &str, read_only: bool) -> Result<ApiKey, ApiError> {
        let body = NewApiKey {
            name: name.to_string(),
            read_only,
        };
        self.send_json(Call::post("/api-keys/", &body)?).await
    }

    pub async fn delete_api_key(&self, id: i64) -> Result<(), ApiError> {
        self.execute(&Call::delete(format!("/api-keys/{id}/"))).await?;
        Ok(())
    }

    pub async fn regenerate_api_key(&self, id: i64) -> Result<ApiKey, ApiError> {
        let call = Call::post(format!("/api-keys/{id}/regenerate/"), &serde_json::json!({}))?;
        self.send_json(call).await
    }

    // ===== API logs =====

    pub async fn fetch_api_logs(&self) -> Result<Vec<ApiLogEntry>, ApiError> {
        self.send_json(Call::get("/api-logs/")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_builders() {
        let call = Call::get("/blocklist/").with_query("indicator_type", "ip");
        assert_eq!(call.method(), &Method::GET);
        assert_eq!(call.path(), "/blocklist/");
        assert_eq!(call.query, vec![("indicator_type", "ip".to_string())]);
        assert!(call.body.is_none());

        let call = Call::post("/api-keys/", &json!({"name": "n"})).unwrap();
        assert_eq!(call.method(), &Method::POST);
        assert_eq!(call.body, Some(json!({"name": "n"})));
    }

    #[test]
    fn test_auth_scheme_headers() {
        assert!(AuthScheme::Anonymous.header_value().unwrap().is_none());
        assert_eq!(
            AuthScheme::Bearer("abc").header_value().unwrap().unwrap(),
            "Bearer abc"
        );
        assert_eq!(
            AuthScheme::ApiKey("k3y").header_value().unwrap().unwrap(),
            "ApiKey k3y"
        );
        assert!(matches!(
            AuthScheme::ApiKey("bad\nkey").header_value(),
            Err(ApiError::Configuration(_))
        ));
    }

    #[test]
    fn test_api_key_client_has_no_session() {
        let client = ApiClient::with_api_key("http://localhost:8000/api/", "k").unwrap();
        assert!(client.session().is_none());
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert!(!format!("{client:?}").contains("\"k\""));
    }
}
