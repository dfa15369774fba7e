//! HTTP-level tests against a mock service.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use sandpit_client::{SandpitClient, SandpitError};
use sandpit_core::{RetryConfig, TaskStatus};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client tuned for fast tests: tiny backoff, no jitter, generous limiter
fn test_client(server: &MockServer) -> SandpitClient {
    SandpitClient::builder("test-key")
        .base_url(server.uri())
        .retry(RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            jitter: false,
            ..RetryConfig::default()
        })
        .build()
        .expect("client builds")
}

fn task_body(task_id: &str, status: &str) -> serde_json::Value {
    json!({
        "error": false,
        "data": {
            "task_id": task_id,
            "status": status,
            "verdict": if status == "completed" { Some("malicious") } else { None },
            "threats": ["trojan.generic"],
        }
    })
}

#[tokio::test]
async fn submit_poll_fetch_roundtrip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/analysis"))
        .and(header("authorization", "API-Key test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"error": false, "data": {"task_id": "t-42"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    // two running polls, then terminal
    Mock::given(method("GET"))
        .and(path("/v1/analysis/t-42/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body("t-42", "running")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/analysis/t-42/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body("t-42", "completed")))
        .mount(&server)
        .await;

    // the final result fetch must hit the network exactly once; the second
    // call below is served from cache
    Mock::given(method("GET"))
        .and(path("/v1/analysis/t-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body("t-42", "completed")))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);

    let task = client.analysis().submit_file("sample.exe", b"MZ\x90".to_vec()).await.unwrap();
    assert_eq!(task.task_id, "t-42");

    let analysis = client
        .analysis()
        .wait_for_completion(&task.task_id, Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(analysis.status, TaskStatus::Completed);
    assert_eq!(analysis.verdict.as_deref(), Some("malicious"));

    // identical request within the TTL window: no second network call
    let again = client.analysis().get(&task.task_id).await.unwrap();
    assert_eq!(again.task_id, "t-42");
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/environment"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "bad key"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.environment().get().await.unwrap_err();
    assert!(matches!(err, SandpitError::Auth));
}

#[tokio::test]
async fn not_found_carries_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/analysis/missing/status"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "no such task"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.analysis().status("missing").await.unwrap_err();
    match err {
        SandpitError::NotFound { resource } => assert_eq!(resource, "no such task"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/environment"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"message": "bad gateway"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/environment"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"error": false, "data": {"environments": []}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let info = client.environment().get().await.unwrap();
    assert!(info.environments.is_empty());
}

#[tokio::test]
async fn persistent_server_errors_exhaust_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/environment"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "down"})))
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.environment().get().await.unwrap_err();
    match err {
        SandpitError::RetryExhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, SandpitError::Server { code: 500, .. }));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn retry_after_header_overrides_backoff() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/environment"))
        .respond_with(
            ResponseTemplate::new(429)
                .append_header("Retry-After", "1")
                .set_body_json(json!({"message": "slow down"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/environment"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"error": false, "data": {"environments": []}})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let start = Instant::now();
    client.environment().get().await.unwrap();
    // local backoff would have waited 10ms; the server said 1s
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn malformed_body_fails_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/environment"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.environment().get().await.unwrap_err();
    assert!(matches!(err, SandpitError::MalformedResponse(_)));
}

#[tokio::test]
async fn delete_invalidates_cached_record() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/analysis/t-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body("t-7", "completed")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/analysis/t-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": false})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    client.analysis().get("t-7").await.unwrap();
    // cached now; delete must evict it
    client.analysis().delete("t-7").await.unwrap();
    client.analysis().get("t-7").await.unwrap();
}

#[tokio::test]
async fn list_builder_rejects_bad_limit_locally() {
    let server = MockServer::start().await;
    // no mocks: the request must never go out
    let client = test_client(&server);
    let err = client.analysis().list().limit(0).send().await.unwrap_err();
    assert!(matches!(err, SandpitError::Validation(_)));
}

#[tokio::test]
async fn list_sends_query_parameters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/analysis"))
        .and(query_param("team", "true"))
        .and(query_param("skip", "50"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "data": {"tasks": [{"task_id": "t-1", "status": "completed"}], "total": 51}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let page = client
        .analysis()
        .list()
        .team(true)
        .skip(50)
        .limit(10)
        .send()
        .await
        .unwrap();
    assert_eq!(page.tasks.len(), 1);
    assert_eq!(page.total, Some(51));
}

#[tokio::test]
async fn status_stream_yields_events_until_completion() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"task\":{\"task_id\":\"t-9\",\"progress\":30,\"remaining_secs\":60},\"completed\":false}\n",
        "\n",
        "data: {\"task\":{\"task_id\":\"t-9\",\"progress\":100,\"remaining_secs\":0},\"completed\":true}\n",
    );
    Mock::given(method("GET"))
        .and(path("/v1/analysis/t-9/status/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Content-Type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut stream = client.analysis().status_stream("t-9").await.unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.task.progress, 30);
    assert!(!first.completed);

    let last = stream.next().await.unwrap().unwrap();
    assert_eq!(last.task.progress, 100);
    assert!(last.completed);

    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn validation_failures_never_reach_the_network() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    let err = client
        .analysis()
        .submit_file("empty.bin", Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SandpitError::Validation(_)));
}
