//! The request pipeline: bearer attachment, one retry on 401, and
//! coalesced refresh under concurrency.

use std::time::Duration;

use capgate::{ApiRequest, CredentialStore, ErrorKind, LoginCredentials};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{header, method, path},
};

use crate::common::{PASSWORD, USERNAME, gateway, mount_token_endpoint};

const DOCUMENTS: &str = "/npl/document/Document/";

fn bearer(request: &Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn api_requests(server: &MockServer, api_path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == api_path)
        .collect()
}

/// Test that an expired access token is refreshed and the call succeeds
#[tokio::test]
async fn test_expired_token_refreshed_transparently() {
    let server = MockServer::start().await;
    let tokens = mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path(DOCUMENTS))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOCUMENTS))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let store = CredentialStore::in_memory();
    let gateway = gateway(&server, store.clone()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");

    let body: Value = gateway
        .pipeline()
        .execute(&ApiRequest::get(DOCUMENTS))
        .await
        .expect("request should succeed after refresh");

    assert_eq!(body, json!({"items": []}));
    assert_eq!(tokens.refresh_grants(), 1);
    assert_eq!(store.access_token().as_deref(), Some("A2"));
    assert_eq!(store.refresh_token().as_deref(), Some("R2"));
}

/// Test that the retried request matches the original except for the token
#[tokio::test]
async fn test_retry_reissues_identical_request() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    let action_path = "/npl/document/Document/d1/edit";
    Mock::given(method("POST"))
        .and(path(action_path))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(action_path))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let gateway = gateway(&server, CredentialStore::in_memory()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");

    let request = ApiRequest::post(action_path)
        .with_query("version", 3)
        .with_body(json!({"content": "new text"}));
    let _: Value = gateway.pipeline().execute(&request).await.expect("execute");

    let sent = api_requests(&server, action_path).await;
    assert_eq!(sent.len(), 2);
    let (first, retried) = (&sent[0], &sent[1]);
    assert_eq!(first.method, retried.method);
    assert_eq!(first.url, retried.url);
    assert_eq!(first.body, retried.body);
    assert_eq!(bearer(first).as_deref(), Some("Bearer A1"));
    assert_eq!(bearer(retried).as_deref(), Some("Bearer A2"));
}

/// Test that concurrent 401s share a single refresh
#[tokio::test]
async fn test_concurrent_unauthorized_share_one_refresh() {
    let server = MockServer::start().await;
    let tokens = mount_token_endpoint(&server).await;
    tokens.set_refresh_delay(Duration::from_millis(200));
    Mock::given(method("GET"))
        .and(path(DOCUMENTS))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOCUMENTS))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let gateway = gateway(&server, CredentialStore::in_memory()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");

    let calls = (0..8).map(|_| {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            gateway
                .pipeline()
                .execute::<Value>(&ApiRequest::get(DOCUMENTS))
                .await
        })
    });
    let results = futures::future::join_all(calls).await;

    for result in results {
        let body = result.expect("task").expect("every caller should succeed");
        assert_eq!(body, json!({"items": []}));
    }
    assert_eq!(tokens.refresh_grants(), 1, "refresh must be coalesced");
}

/// Test that a failed refresh logs out and clears the store
#[tokio::test]
async fn test_refresh_failure_logs_out() {
    let server = MockServer::start().await;
    let tokens = mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path(DOCUMENTS))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = CredentialStore::in_memory();
    let gateway = gateway(&server, store.clone()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");
    tokens.fail_refresh(true);

    let err = gateway
        .pipeline()
        .execute::<Value>(&ApiRequest::get(DOCUMENTS))
        .await
        .expect_err("refresh failure should surface");

    assert_eq!(err.kind(), ErrorKind::SessionExpired);
    assert_eq!(tokens.refresh_grants(), 1);
    assert!(store.load().is_none());
    assert!(!gateway.is_authenticated());
    assert_eq!(api_requests(&server, DOCUMENTS).await.len(), 1, "no retry after failed refresh");
}

/// Test that a second 401 ends the retry and logs out
#[tokio::test]
async fn test_second_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    let tokens = mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path(DOCUMENTS))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = CredentialStore::in_memory();
    let gateway = gateway(&server, store.clone()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");

    let err = gateway
        .pipeline()
        .execute::<Value>(&ApiRequest::get(DOCUMENTS))
        .await
        .expect_err("second 401 should fail");

    assert_eq!(err.kind(), ErrorKind::UnauthorizedRetryExhausted);
    assert_eq!(err.status(), Some(401));
    assert_eq!(tokens.refresh_grants(), 1);
    assert_eq!(api_requests(&server, DOCUMENTS).await.len(), 2);
    assert!(store.load().is_none());
}

/// Test that other error statuses pass through without refreshing
#[tokio::test]
async fn test_forbidden_passes_through() {
    let server = MockServer::start().await;
    let tokens = mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path(DOCUMENTS))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-request-id", "req-42")
                .set_body_json(json!({"message": "Not a party"})),
        )
        .mount(&server)
        .await;

    let gateway = gateway(&server, CredentialStore::in_memory()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");

    let err = gateway
        .pipeline()
        .execute::<Value>(&ApiRequest::get(DOCUMENTS))
        .await
        .expect_err("403 should fail");

    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(err.request_id(), Some("req-42"));
    assert_eq!(tokens.refresh_grants(), 0);
    assert!(gateway.is_authenticated());
}

/// Test that an anonymous 401 ends as an expired session
#[tokio::test]
async fn test_unauthorized_without_session() {
    let server = MockServer::start().await;
    let tokens = mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path(DOCUMENTS))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let gateway = gateway(&server, CredentialStore::in_memory()).expect("gateway");
    let err = gateway
        .pipeline()
        .execute::<Value>(&ApiRequest::get(DOCUMENTS))
        .await
        .expect_err("anonymous 401 should fail");

    assert_eq!(err.kind(), ErrorKind::SessionExpired);
    assert_eq!(tokens.refresh_grants(), 0);
    let sent = api_requests(&server, DOCUMENTS).await;
    assert_eq!(sent.len(), 1);
    assert!(bearer(&sent[0]).is_none());
}
