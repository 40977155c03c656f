//! Session lifecycle against a fake backend.

mod common;

use std::time::Duration;

use blockdesk_core::api::{ApiClient, ApiError};
use blockdesk_core::auth::{SessionManager, SessionState, SessionStore, StoredTokens};
use chrono::Utc;
use common::{access_token, bearer, logged_in, token_not_valid};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

fn refresh_endpoint() -> MockBuilder {
    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .and(body_json(json!({"refresh": "refresh-1"})))
}

fn refresh_mock(access: &str) -> Mock {
    refresh_endpoint().respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": access})))
}

#[tokio::test]
async fn test_login_sets_identity_from_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/"))
        .and(body_json(json!({"username": "analyst", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": access_token("a", 3600, true),
            "refresh": "refresh-1",
            "username": "analyst",
            "is_staff": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = SessionManager::new(server.uri()).unwrap();
    let identity = session.login("analyst", "hunter2").await.unwrap();

    assert_eq!(identity.name, "analyst");
    assert!(identity.is_privileged);
    assert_eq!(session.state().await, SessionState::Authenticated);
    assert!(session.is_privileged().await);
}

#[tokio::test]
async fn test_invalid_login_leaves_session_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})))
        .mount(&server)
        .await;

    let session = SessionManager::new(server.uri()).unwrap();
    let err = session.login("analyst", "wrong").await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidCredentials));
    assert_eq!(session.state().await, SessionState::Unauthenticated);
    assert!(matches!(
        session.ensure_valid_credential().await,
        Err(ApiError::NoCredential)
    ));
}

#[tokio::test]
async fn test_valid_token_is_returned_without_network() {
    let server = MockServer::start().await;
    let access = access_token("a", 3600, false);
    let session = logged_in(&server, &access).await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    for _ in 0..5 {
        assert_eq!(session.ensure_valid_credential().await.unwrap(), access);
    }
    // Only the login went out.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_refresh() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("old", -60, false)).await;
    let fresh = access_token("new", 3600, false);

    refresh_endpoint()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": fresh}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .and(header("authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(10)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session.clone());
    let results = futures::future::join_all((0..10).map(|_| client.fetch_blocklist(None))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(session.state().await, SessionState::Authenticated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_short_lived_refreshed_token_is_shared() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("old", -60, false)).await;
    // Lands inside the expiry leeway as soon as it arrives.
    let fresh = access_token("new", 5, false);

    refresh_endpoint()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": fresh}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .and(header("authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(5)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session.clone());
    let results = futures::future::join_all((0..5).map(|_| client.fetch_blocklist(None))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(session.state().await, SessionState::Authenticated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rejections_share_one_refresh() {
    let server = MockServer::start().await;
    let old = access_token("old", 3600, false);
    let fresh = access_token("new", 3600, false);
    let session = logged_in(&server, &old).await;

    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .and(header("authorization", bearer(&old).as_str()))
        .respond_with(token_not_valid())
        .expect(6)
        .mount(&server)
        .await;
    refresh_endpoint()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": fresh}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .and(header("authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(6)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session.clone());
    let results = futures::future::join_all((0..6).map(|_| client.fetch_blocklist(None))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(session.state().await, SessionState::Authenticated);
    assert_eq!(session.ensure_valid_credential().await.unwrap(), fresh);
}

#[tokio::test]
async fn test_unreachable_backend_keeps_session() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;
    drop(server);

    let client = ApiClient::from_session(session.clone());
    let err = client.fetch_blocklist(None).await.unwrap_err();

    assert!(matches!(err, ApiError::NetworkUnavailable(_)));
    assert!(err.is_transient());
    assert!(!err.ends_session());
    assert_eq!(session.state().await, SessionState::Authenticated);
    assert!(session.identity().await.is_some());
}

#[tokio::test]
async fn test_unreachable_refresh_ends_session() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("old", -60, false)).await;
    drop(server);

    let err = session.ensure_valid_credential().await.unwrap_err();

    assert!(matches!(err, ApiError::RefreshFailed(_)));
    assert!(err.ends_session());
    assert_eq!(session.state().await, SessionState::Unauthenticated);
    assert!(session.identity().await.is_none());
}

#[tokio::test]
async fn test_failed_refresh_ends_session() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("old", -60, false)).await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(token_not_valid())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session.clone());
    let err = client.fetch_blocklist(None).await.unwrap_err();

    assert!(matches!(err, ApiError::RefreshFailed(_)));
    assert!(err.ends_session());
    assert_eq!(session.state().await, SessionState::Unauthenticated);
    assert!(matches!(
        session.ensure_valid_credential().await,
        Err(ApiError::NoCredential)
    ));
}

#[tokio::test]
async fn test_request_after_logout_never_reaches_backend() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    session.logout().await;
    session.logout().await;

    let client = ApiClient::from_session(session.clone());
    assert!(matches!(
        client.fetch_blocklist(None).await,
        Err(ApiError::NoCredential)
    ));
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_and_retried_once() {
    let server = MockServer::start().await;
    let stale = access_token("a", 3600, false);
    let fresh = access_token("b", 3600, false);
    let session = logged_in(&server, &stale).await;

    refresh_mock(&fresh).expect(1).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .and(header("authorization", bearer(&stale).as_str()))
        .respond_with(token_not_valid())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .and(header("authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "indicator": "1.2.3.4",
            "type": "ip",
            "added_by": "analyst",
            "added_at": "2024-01-01 10:00:00",
            "reason": "scanner"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session.clone());
    let entries = client.fetch_blocklist(None).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].indicator, "1.2.3.4");
    assert_eq!(session.ensure_valid_credential().await.unwrap(), fresh);
}

#[tokio::test]
async fn test_backend_that_always_rejects_gets_one_retry() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;

    refresh_mock(&access_token("b", 3600, false))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logs/"))
        .respond_with(token_not_valid())
        .expect(2)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session.clone());
    let err = client.fetch_audit_log(None).await.unwrap_err();

    assert!(matches!(err, ApiError::TokenExpired));
    assert_eq!(session.state().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_permission_denied_is_not_refreshed() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api-keys/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "You do not have permission to perform this action."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session.clone());
    match client.list_api_keys().await {
        Err(ApiError::PermissionDenied(msg)) => {
            assert_eq!(msg, "You do not have permission to perform this action.")
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(session.state().await, SessionState::Authenticated);
}

#[tokio::test]
async fn test_other_401_is_not_refreshed() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Authentication credentials were not provided.",
            "code": "not_authenticated"
        })))
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session);
    assert!(matches!(
        client.fetch_blocklist(None).await,
        Err(ApiError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_refresh_finishing_after_logout_does_not_revive_session() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("old", -60, false)).await;

    refresh_endpoint()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": access_token("new", 3600, false)}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let (result, _) = tokio::join!(session.ensure_valid_credential(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.logout().await;
    });

    assert!(matches!(result, Err(ApiError::NoCredential)));
    assert_eq!(session.state().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_session_is_persisted_and_restored() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let access = access_token("a", 3600, true);

    Mock::given(method("POST"))
        .and(path("/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": access,
            "refresh": "refresh-1"
        })))
        .mount(&server)
        .await;

    let session = SessionManager::new(server.uri())
        .unwrap()
        .with_store(SessionStore::new(dir.path()));
    session.login("analyst", "hunter2").await.unwrap();
    assert!(dir.path().join("session.json").exists());

    let restored = SessionManager::new(server.uri())
        .unwrap()
        .with_store(SessionStore::new(dir.path()));
    assert!(restored.restore().await);
    assert_eq!(restored.ensure_valid_credential().await.unwrap(), access);
    assert!(restored.is_privileged().await);

    restored.logout().await;
    assert!(!dir.path().join("session.json").exists());
}

#[tokio::test]
async fn test_restore_refreshes_expired_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    store
        .save(&StoredTokens {
            access: access_token("old", -60, false),
            refresh: "refresh-1".into(),
            username: Some("analyst".into()),
            saved_at: Utc::now(),
        })
        .unwrap();

    let fresh = access_token("new", 3600, false);
    refresh_mock(&fresh).expect(1).mount(&server).await;

    let session = SessionManager::new(server.uri()).unwrap().with_store(store.clone());
    assert!(session.restore().await);
    assert_eq!(session.ensure_valid_credential().await.unwrap(), fresh);
    assert_eq!(store.load().unwrap().unwrap().access, fresh);
}

#[tokio::test]
async fn test_restore_with_dead_refresh_token_clears_store() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    store
        .save(&StoredTokens {
            access: access_token("old", -60, false),
            refresh: "refresh-1".into(),
            username: None,
            saved_at: Utc::now(),
        })
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(token_not_valid())
        .mount(&server)
        .await;

    let session = SessionManager::new(server.uri()).unwrap().with_store(store.clone());
    assert!(!session.restore().await);
    assert_eq!(session.state().await, SessionState::Unauthenticated);
    assert!(store.load().unwrap().is_none());
}
