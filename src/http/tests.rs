use super::*;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Echo {
    value: u32,
}

fn test_client() -> ApiClient {
    ApiClient::new(&HttpConfig::default())
        .with_retry_attempts(3)
        .with_backoff(Duration::from_millis(1))
}

fn server_url(server: &MockServer, route: &str) -> Url {
    let base = Url::parse(&server.uri()).expect("mock server uri parses");
    endpoint(&base, route).expect("endpoint builds")
}

#[test]
fn endpoint_keeps_base_path() {
    let base = Url::parse("https://api.groq.com/openai/v1").expect("url parses");
    let url = endpoint(&base, "/chat/completions").expect("endpoint builds");
    assert_eq!(url.as_str(), "https://api.groq.com/openai/v1/chat/completions");

    let base = Url::parse("https://api.cohere.com/").expect("url parses");
    let url = endpoint(&base, "v2/embed").expect("endpoint builds");
    assert_eq!(url.as_str(), "https://api.cohere.com/v2/embed");
}

#[test]
fn error_classification() {
    assert!(ServiceError::Transient {
        attempts: 3,
        message: "boom".to_string()
    }
    .is_transient());
    assert!(!ServiceError::Rejected { status: 400 }.is_transient());
    assert!(!ServiceError::Unauthorized { status: 403 }.is_transient());
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_retry_attempts_still_sends_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&HttpConfig::default())
        .with_retry_attempts(0)
        .with_backoff(Duration::from_millis(1));
    let result: Result<Echo, ServiceError> = client.get_json(&server_url(&server, "down"));

    match result {
        Err(ServiceError::Transient { attempts, .. }) => assert_eq!(attempts, 1),
        other => panic!("expected transient error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn sends_configured_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .and(header("Api-Key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 7 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client().with_header("Api-Key", "secret");
    let echo: Echo = client
        .get_json(&server_url(&server, "status"))
        .expect("request should succeed");

    assert_eq!(echo, Echo { value: 7 });
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let echo: Echo = test_client()
        .post_json(&server_url(&server, "flaky"), &json!({}))
        .expect("third attempt should succeed");

    assert_eq!(echo.value, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_fail_fast() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(422))
        .expect(1)
        .mount(&server)
        .await;

    let result: Result<Echo, ServiceError> =
        test_client().post_json(&server_url(&server, "bad"), &json!({}));

    assert!(matches!(result, Err(ServiceError::Rejected { status: 422 })));
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_retries_are_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let result: Result<Echo, ServiceError> = test_client().get_json(&server_url(&server, "down"));

    match result {
        Err(ServiceError::Transient { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected transient error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result: Result<Echo, ServiceError> =
        test_client().get_json(&server_url(&server, "garbage"));

    assert!(matches!(result, Err(ServiceError::InvalidResponse(_))));
}
