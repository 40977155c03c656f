#![allow(dead_code)]

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use blockdesk_core::auth::SessionManager;
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Unsigned JWT-shaped access token. `id` keeps otherwise identical tokens apart.
pub fn access_token(id: &str, expires_in_secs: i64, staff: bool) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = json!({
        "token_type": "access",
        "exp": Utc::now().timestamp() + expires_in_secs,
        "jti": id,
        "user_id": 1,
        "username": "analyst",
        "is_staff": staff,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2ln")
}

pub fn token_not_valid() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "detail": "Given token not valid for any token type",
        "code": "token_not_valid",
        "messages": []
    }))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Mount a login endpoint handing out `access` and log in through it.
pub async fn logged_in(server: &MockServer, access: &str) -> Arc<SessionManager> {
    Mock::given(method("POST"))
        .and(path("/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": access,
            "refresh": "refresh-1",
            "username": "analyst",
            "is_staff": false
        })))
        .mount(server)
        .await;

    let session = SessionManager::new(server.uri()).expect("session manager");
    session.login("analyst", "hunter2").await.expect("login");
    Arc::new(session)
}
