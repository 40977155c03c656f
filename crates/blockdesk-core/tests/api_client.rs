//! Resource endpoints against a fake backend.

mod common;

use blockdesk_core::api::{ApiClient, ApiError};
use blockdesk_core::models::IndicatorType;
use common::{access_token, bearer, logged_in};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_api_key_mode_sends_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip-blocklist/"))
        .and(header("authorization", "ApiKey s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["1.2.3.4", "5.6.7.8"])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::with_api_key(server.uri(), "s3cret").unwrap();
    let indicators = client.fetch_indicators(IndicatorType::Ip).await.unwrap();
    assert_eq!(indicators, vec!["1.2.3.4", "5.6.7.8"]);
}

#[tokio::test]
async fn test_api_key_rejection_is_not_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .respond_with(common::token_not_valid())
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::with_api_key(server.uri(), "revoked").unwrap();
    assert!(matches!(
        client.fetch_blocklist(None).await,
        Err(ApiError::TokenExpired)
    ));
}

#[tokio::test]
async fn test_raw_blocklist_is_fetched_without_credentials() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;
    Mock::given(method("GET"))
        .and(path("/raw/domain-blocklist/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("evil.example\nbad.example\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session);
    let raw = client.fetch_raw_blocklist(IndicatorType::Domain).await.unwrap();
    assert_eq!(raw.lines().count(), 2);

    let requests = server.received_requests().await.unwrap();
    let raw_request = requests
        .iter()
        .find(|r| r.url.path() == "/raw/domain-blocklist/")
        .expect("raw request recorded");
    assert!(raw_request.headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_block_sends_newline_joined_indicators() {
    let server = MockServer::start().await;
    let access = access_token("a", 3600, false);
    let session = logged_in(&server, &access).await;
    Mock::given(method("POST"))
        .and(path("/block/"))
        .and(header("authorization", bearer(&access).as_str()))
        .and(body_json(json!({
            "indicator_type": "ip",
            "indicators": "1.2.3.4\n999.1.1.1",
            "reason": "scanner"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Added 1 indicators to the ip blocklist, 1 indicators were invalid",
            "blocked": ["1.2.3.4"],
            "invalid": [{"original": "999.1.1.1", "sanitized": "999.1.1.1", "reason": "Not a valid ip"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session);
    let outcome = client
        .block_indicators(
            IndicatorType::Ip,
            &["1.2.3.4".to_string(), "999.1.1.1".to_string()],
            "scanner",
        )
        .await
        .unwrap();
    assert_eq!(outcome.blocked, vec!["1.2.3.4"]);
    assert_eq!(outcome.invalid.len(), 1);
    assert!(outcome.existing.is_empty());
}

#[tokio::test]
async fn test_unblock_reports_missing_indicators() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;
    Mock::given(method("POST"))
        .and(path("/unblock/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Removed 1 indicators from the url blocklist, 1 indicators were not found in the blocklist",
            "unblocked": ["http://a.example/"],
            "not_found": ["http://b.example/"]
        })))
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session);
    let outcome = client
        .unblock_indicators(
            IndicatorType::Url,
            &["http://a.example/".to_string(), "http://b.example/".to_string()],
            "false positive",
        )
        .await
        .unwrap();
    assert_eq!(outcome.unblocked, vec!["http://a.example/"]);
    assert_eq!(outcome.not_found, vec!["http://b.example/"]);
}

#[tokio::test]
async fn test_filters_are_sent_as_query() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;
    Mock::given(method("GET"))
        .and(path("/logs/"))
        .and(query_param("indicator_type", "url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{
                "timestamp": "2024-03-01 12:00:00",
                "username": "analyst",
                "action": "BLOCK",
                "indicator_type": "url",
                "indicator": "http://a.example/",
                "reason": "phish"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session);
    let entries = client.fetch_audit_log(Some(IndicatorType::Url)).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "BLOCK");
}

#[tokio::test]
async fn test_api_key_management() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, true)).await;
    let key = |id: i64, value: &str| {
        json!({
            "id": id,
            "key": value,
            "name": "siem",
            "created_at": "2024-02-02T10:00:00Z",
            "is_active": true,
            "read_only": true
        })
    };

    Mock::given(method("GET"))
        .and(path("/api-keys/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([key(7, "aaaa")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api-keys/"))
        .and(body_json(json!({"name": "siem", "read_only": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(key(8, "bbbb")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api-keys/8/regenerate/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(key(8, "cccc")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api-keys/8/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session);
    assert_eq!(client.list_api_keys().await.unwrap()[0].id, 7);
    assert_eq!(client.create_api_key("siem", true).await.unwrap().key, "bbbb");
    assert_eq!(client.regenerate_api_key(8).await.unwrap().key, "cccc");
    client.delete_api_key(8).await.unwrap();
}

#[tokio::test]
async fn test_api_logs_accept_ip_address_alias() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, true)).await;
    Mock::given(method("GET"))
        .and(path("/api-logs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "timestamp": "2024-03-01T12:00:00+00:00",
            "method": "POST",
            "path": "/api/block/",
            "user": "analyst",
            "status_code": 201,
            "duration": "0.0200s",
            "api_key": null,
            "ip_address": "10.1.1.1",
            "query_params": {},
            "request_body": {"indicator_type": "ip"},
            "response_size": 90
        }])))
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session);
    let logs = client.fetch_api_logs().await.unwrap();
    assert_eq!(logs[0].ip.as_deref(), Some("10.1.1.1"));
    assert_eq!(logs[0].status_code, 201);
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session);
    assert!(client.fetch_blocklist(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_server_error_is_surfaced() {
    let server = MockServer::start().await;
    let session = logged_in(&server, &access_token("a", 3600, false)).await;
    Mock::given(method("GET"))
        .and(path("/blocklist/"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "disk full"})))
        .mount(&server)
        .await;

    let client = ApiClient::from_session(session.clone());
    match client.fetch_blocklist(None).await {
        Err(ApiError::ServerError(msg)) => assert_eq!(msg, "disk full"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(session.is_authenticated().await);
}
