use serde::Deserialize;
use thiserror::Error;

/// Machine-readable code the backend attaches to a 401 when the bearer
/// token is expired or otherwise unusable. Only this code triggers refresh.
pub const TOKEN_NOT_VALID_CODE: &str = "token_not_valid";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Access token expired or invalid")]
    TokenExpired,

    #[error("Session expired - please log in again ({0})")]
    RefreshFailed(String),

    #[error("No credential available - please log in")]
    NoCredential,

    #[error("Unable to reach server: {0}")]
    NetworkUnavailable(#[source] reqwest::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shape used by the backend (`detail` for DRF errors, `error`
/// for the hand-written views).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    detail: Option<String>,
    error: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Classify a failed resource response.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .detail
            .or(parsed.error)
            .unwrap_or_else(|| Self::truncate_body(body));

        match status.as_u16() {
            401 if parsed.code.as_deref() == Some(TOKEN_NOT_VALID_CODE) => ApiError::TokenExpired,
            401 => ApiError::Unauthorized(message),
            400 => ApiError::BadRequest(message),
            403 => ApiError::PermissionDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// Classify a failed login response. Any 400/401 means the backend
    /// rejected the credentials.
    pub fn from_login_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            400 | 401 => ApiError::InvalidCredentials,
            _ => Self::from_status(status, body),
        }
    }

    /// True for the one rejection that refresh-and-retry can resolve.
    pub fn is_token_rejection(&self) -> bool {
        matches!(self, ApiError::TokenExpired)
    }

    /// True when the session is gone and the user has to log in again.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            ApiError::RefreshFailed(_) | ApiError::NoCredential | ApiError::TokenExpired
        )
    }

    /// True for failures that may succeed if the same request is sent again.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::NetworkUnavailable(_) | ApiError::RateLimited)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkUnavailable(err)
        }
    }
}
