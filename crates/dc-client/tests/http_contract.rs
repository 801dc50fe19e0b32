//! HTTP contract tests for the task queue and health endpoints.
//!
//! Tenet: the client never invents task state. Whatever the server
//! reports (including a cancellation it refused) is what comes back,
//! and every non-success reply surfaces its status and body.

use dc_client::{
    ClientError, CreateTaskRequest, HealthMonitor, HealthProbe, HttpTaskClient, TaskClient,
};
use dc_model::TaskStatus;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn task_json(task_id: &str, status: &str, result_uris: &[&str]) -> Value {
    json!({
        "task": {
            "taskId": task_id,
            "prompt": "future city",
            "status": status,
            "metadata": {},
            "resultUris": result_uris,
            "createdAt": 1_000,
            "updatedAt": 2_000
        }
    })
}

fn client(server: &MockServer) -> HttpTaskClient {
    HttpTaskClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn submit_posts_defaults_and_unwraps_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jimeng/tasks"))
        .and(body_json(json!({
            "prompt": "future city",
            "model": "sdxl",
            "size": "1024x1024",
            "batch": 1,
            "projectId": "p-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("t-1", "queued", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let task = client(&server)
        .submit(&CreateTaskRequest::new("future city").with_project_id("p-1"))
        .await
        .unwrap();

    assert_eq!(task.task_id, "t-1");
    assert_eq!(task.status, TaskStatus::Queued);
}

#[tokio::test]
async fn fetch_status_queries_history_by_task_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jimeng/history"))
        .and(query_param("taskId", "t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(
            "t-1",
            "succeeded",
            &["data:image/png;base64,AAA"],
        )))
        .mount(&server)
        .await;

    let client = client(&server);
    let first = client.fetch_status("t-1").await.unwrap();
    let second = client.fetch_status("t-1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.status, TaskStatus::Succeeded);
    assert_eq!(first.result_uris, vec!["data:image/png;base64,AAA".to_string()]);
}

#[tokio::test]
async fn cancel_returns_server_authoritative_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jimeng/tasks/t-9/cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("t-9", "succeeded", &[])))
        .mount(&server)
        .await;

    let task = client(&server).cancel("t-9").await.unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn non_success_is_request_failed_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jimeng/history"))
        .respond_with(ResponseTemplate::new(404).set_body_string("task not found"))
        .mount(&server)
        .await;

    match client(&server).fetch_status("missing").await {
        Err(ClientError::RequestFailed { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "task not found");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = HttpTaskClient::new(&uri, Duration::from_secs(2)).unwrap();
    assert!(matches!(
        client.fetch_status("t-1").await,
        Err(ClientError::Transport(_))
    ));
}

#[tokio::test]
async fn health_probe_reads_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "ok", "phase": "P1", "version": "0.3.0" })),
        )
        .mount(&server)
        .await;

    let probe = HealthProbe::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let status = probe.probe().await.unwrap();
    assert_eq!(status.status, "ok");
    assert_eq!(status.version, "0.3.0");
}

#[tokio::test]
async fn health_monitor_publishes_and_stops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    let probe = HealthProbe::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let monitor = HealthMonitor::spawn(probe, Duration::from_millis(50));
    let mut updates = monitor.subscribe();

    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .expect("first probe should publish")
        .unwrap();
    assert!(monitor.current().is_online());

    monitor.stop();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let seen = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), seen);
}

#[tokio::test]
async fn health_monitor_reports_offline_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(503).set_body_string("booting"))
        .mount(&server)
        .await;

    let probe = HealthProbe::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let monitor = HealthMonitor::spawn(probe, Duration::from_secs(60));
    let mut updates = monitor.subscribe();
    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .expect("first probe should publish")
        .unwrap();

    let health = monitor.current();
    assert!(!health.is_online());
    assert!(health.error.unwrap().contains("503"));
}
