//! Tests for the HTTP client module

use super::*;
use crate::auth::{Credentials, SessionAuthenticator};
use crate::config::TapConfig;
use crate::error::Error;
use crate::types::UrlParams;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
        .build();
    HttpClient::with_config(config).unwrap()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 3);
    assert!(config.base_url.is_none());
    assert!(config.rate_limit.is_none());
    assert!(!config.accept_invalid_certs);
}

#[test]
fn test_http_client_config_from_tap_config() {
    let tap = TapConfig {
        api_url: "https://sap.example.com:50000/b1s/v1".to_string(),
        verify_ssl: false,
        timeout_secs: 12,
        max_retries: 1,
        page_size: Some(100),
        requests_per_second: Some(4),
        user_agent: Some("tap-test/1.0".to_string()),
        ..TapConfig::default()
    };

    let config = HttpClientConfig::from_tap_config(&tap);

    assert_eq!(
        config.base_url.as_deref(),
        Some("https://sap.example.com:50000/b1s/v1")
    );
    assert_eq!(config.timeout, Duration::from_secs(12));
    assert_eq!(config.max_retries, 1);
    assert!(config.accept_invalid_certs);
    assert_eq!(
        config.default_headers.get("Prefer").map(String::as_str),
        Some("odata.maxpagesize=100")
    );
    assert_eq!(config.rate_limit.map(|r| r.requests_per_second), Some(4));
    assert_eq!(config.user_agent, "tap-test/1.0");
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .params(UrlParams::new().with("$top", "10"))
        .header("X-Request-Id", "abc123")
        .json(json!({"key": "value"}))
        .retries(2);

    assert_eq!(config.query.get("$top"), Some("10"));
    assert_eq!(
        config.headers.get("X-Request-Id").map(String::as_str),
        Some("abc123")
    );
    assert_eq!(config.body, Some(json!({"key": "value"})));
    assert_eq!(config.max_retries, Some(2));
}

#[tokio::test]
async fn test_get_json_with_multi_value_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/PurchaseInvoices"))
        .and(query_param("$select", "DocNum"))
        .and(query_param("$skip", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let params = UrlParams::new().with("$select", "DocNum").with("$skip", "20");
    let body = client.get_json("/PurchaseInvoices", params).await.unwrap();

    assert_eq!(body, json!({"value": []}));
}

#[tokio::test]
async fn test_get_json_empty_body_is_null() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client.get_json("/Empty", UrlParams::new()).await.unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn test_get_json_rejects_non_json() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_json("/Html", UrlParams::new()).await.unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[tokio::test]
async fn test_client_error_is_unexpected_response_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/SQLQueries"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": -2035, "message": {"value": "exists"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.post("/SQLQueries", json!({})).await.unwrap_err();

    match err {
        Error::UnexpectedResponse { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("-2035"));
        }
        other => panic!("Expected UnexpectedResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_request() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/SQLQueries('Q1')"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client.delete("/SQLQueries('Q1')").await.unwrap();
    assert_eq!(response.status().as_u16(), 204);
}

#[tokio::test]
async fn test_retry_on_500() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client.get_json("/Flaky", UrlParams::new()).await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_max_retries_exhausted_returns_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(2)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let err = client.get("/Down", UrlParams::new()).await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse { status: 503, .. }));
}

#[tokio::test]
async fn test_session_cookie_attached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"SessionId": "sess-1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .and(header("cookie", "B1SESSION=sess-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(2)
        .mount(&server)
        .await;

    let auth = Arc::new(SessionAuthenticator::new(
        server.uri(),
        Credentials {
            company_db: "DB".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
        },
    ));
    let config = HttpClientConfig::builder().base_url(server.uri()).build();
    let client = HttpClient::with_auth(config, auth).unwrap();

    client.get("/Items", UrlParams::new()).await.unwrap();
    client.get("/Items", UrlParams::new()).await.unwrap();
}

#[tokio::test]
async fn test_login_failure_aborts_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let auth = Arc::new(SessionAuthenticator::new(
        server.uri(),
        Credentials {
            company_db: "DB".to_string(),
            username: "u".to_string(),
            password: "bad".to_string(),
        },
    ));
    let config = HttpClientConfig::builder().base_url(server.uri()).build();
    let client = HttpClient::with_auth(config, auth).unwrap();

    let err = client.get("/Items", UrlParams::new()).await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
}

#[tokio::test]
async fn test_default_prefer_header_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .and(header("Prefer", "odata.maxpagesize=50"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .header("Prefer", "odata.maxpagesize=50")
        .build();
    let client = HttpClient::with_config(config).unwrap();
    client.get("/Items", UrlParams::new()).await.unwrap();
}

#[test]
fn test_build_url() {
    let config = HttpClientConfig::builder()
        .base_url("https://sap.example.com/b1s/v1/")
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(
        client.build_url("/PurchaseInvoices"),
        "https://sap.example.com/b1s/v1/PurchaseInvoices"
    );
    assert_eq!(
        client.build_url("SQLQueries('Q')/List"),
        "https://sap.example.com/b1s/v1/SQLQueries('Q')/List"
    );
    assert_eq!(
        client.build_url("https://other.example.com/x"),
        "https://other.example.com/x"
    );
}

#[test]
fn test_calculate_backoff() {
    let make = |kind| {
        let config = HttpClientConfig::builder()
            .backoff(kind, Duration::from_millis(100), Duration::from_millis(350))
            .build();
        HttpClient::with_config(config).unwrap()
    };

    let constant = make(BackoffType::Constant);
    assert_eq!(constant.calculate_backoff(3), Duration::from_millis(100));

    let linear = make(BackoffType::Linear);
    assert_eq!(linear.calculate_backoff(1), Duration::from_millis(200));

    let exponential = make(BackoffType::Exponential);
    assert_eq!(exponential.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(exponential.calculate_backoff(4), Duration::from_millis(350));
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::with_config(HttpClientConfig::default()).unwrap();
    let debug = format!("{client:?}");
    assert!(debug.contains("HttpClient"));
    assert!(debug.contains("has_authenticator: false"));
    assert!(!client.has_rate_limiter());
}
