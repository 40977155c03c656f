//! REST client for the blocklist backend.
//!
//! Requests authenticate either with the session's bearer token or with a
//! long-lived API key. Token rejections are handed to the
//! [`SessionManager`](crate::auth::SessionManager), which refreshes once and
//! reissues the request.

pub mod client;
pub mod error;

pub use client::{ApiClient, Call};
pub use error::ApiError;
