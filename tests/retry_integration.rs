//! Retry engine against a real HTTP server.

mod common;

use homeboard::classify::{classify, ErrorKind};
use homeboard::retry::fetch_with_retry;
use homeboard::transport::{FetchError, ReqwestTransport, StatRequest};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_recovers_after_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/queue"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/queue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"totalRecords": 4})))
        .expect(1)
        .mount(&server)
        .await;

    let request = StatRequest::get(format!("{}/api/v3/queue", server.uri()));
    let response = fetch_with_retry(&ReqwestTransport::new(), &request, TIMEOUT, &common::fast_retry())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.json().unwrap()["totalRecords"], 4);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let request = StatRequest::get(server.uri());
    let response = fetch_with_retry(&ReqwestTransport::new(), &request, TIMEOUT, &common::fast_retry())
        .await
        .unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(classify(None, Some(&response)), ErrorKind::Client);
}

#[tokio::test]
async fn test_persistent_server_error_returns_last_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let request = StatRequest::get(server.uri());
    let response = fetch_with_retry(&ReqwestTransport::new(), &request, TIMEOUT, &common::fast_retry())
        .await
        .unwrap();

    assert_eq!(response.status, 500);
}

#[tokio::test]
async fn test_non_retryable_server_status_is_returned_at_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(501))
        .expect(1)
        .mount(&server)
        .await;

    let request = StatRequest::get(server.uri());
    let response = fetch_with_retry(&ReqwestTransport::new(), &request, TIMEOUT, &common::fast_retry())
        .await
        .unwrap();

    assert_eq!(response.status, 501);
    assert_eq!(classify(None, Some(&response)), ErrorKind::Server);
}

#[tokio::test]
async fn test_slow_server_times_out_on_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let mut options = common::fast_retry();
    options.max_retries = 2;

    let request = StatRequest::get(server.uri());
    let error = fetch_with_retry(
        &ReqwestTransport::new(),
        &request,
        Duration::from_millis(100),
        &options,
    )
    .await
    .unwrap_err();

    assert_eq!(error, FetchError::Timeout(100));
    assert_eq!(classify(Some(&error), None), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_should_retry_predicate_stops_early() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;

    let options = common::fast_retry().with_should_retry(|error, _| !matches!(error, FetchError::Timeout(_)));

    let request = StatRequest::get(server.uri());
    let error = fetch_with_retry(
        &ReqwestTransport::new(),
        &request,
        Duration::from_millis(100),
        &options,
    )
    .await
    .unwrap_err();

    assert!(matches!(error, FetchError::Timeout(_)));
}

#[tokio::test]
async fn test_connection_refused_is_network() {
    // Bind then drop a listener to get a port nothing is listening on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let request = StatRequest::get(format!("http://127.0.0.1:{}/", port));
    let error = fetch_with_retry(&ReqwestTransport::new(), &request, TIMEOUT, &common::fast_retry())
        .await
        .unwrap_err();

    assert_eq!(classify(Some(&error), None), ErrorKind::Network);
}
