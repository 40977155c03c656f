//! Core library for the blocklist admin console.
//!
//! - [`auth`]: the session manager, token decoding and persistence
//! - [`api`]: the REST client and its error taxonomy
//! - [`models`]: wire models for blocklist, audit, API key and API log data
//! - [`routes`]: which views a session may open
//! - [`config`]: on-disk configuration and environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod routes;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{Credential, Identity, RequestAttempt, SessionManager, SessionState, SessionStore};
pub use config::Config;
