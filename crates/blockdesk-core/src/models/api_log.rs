use serde::{Deserialize, Serialize};

use crate::utils::contains_ignore_case;

/// One request recorded by the backend's API call logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub status_code: u16,
    /// Formatted by the backend, e.g. `"0.0123s"`.
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, alias = "ip_address")]
    pub ip: Option<String>,
    #[serde(default)]
    pub query_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub request_body: Option<serde_json::Value>,
    #[serde(default)]
    pub response_size: u64,
}

/// Status code bucket, used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Redirect,
    ClientError,
    ServerError,
}

impl ApiLogEntry {
    pub fn status_class(&self) -> StatusClass {
        match self.status_code {
            0..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirect,
            400..=499 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    pub fn user_display(&self) -> &str {
        self.user.as_deref().unwrap_or("anonymous")
    }

    pub fn matches_search(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        contains_ignore_case(&self.path, query)
            || contains_ignore_case(&self.method, query)
            || self.status_code.to_string().contains(query)
            || self.user.as_deref().is_some_and(|u| contains_ignore_case(u, query))
            || self.api_key.as_deref().is_some_and(|k| contains_ignore_case(k, query))
            || self.ip.as_deref().is_some_and(|ip| contains_ignore_case(ip, query))
    }
}
