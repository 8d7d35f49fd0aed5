//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::config::Config;
use api::routes::operations::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    ExecutionPolicy, InMemoryCrudService, LocalSubstrate, PipelineConfig, RetryPolicy,
    SagaWorkflow,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const SERVICE_1: &str = "service1";
const SERVICE_2: &str = "service2";
const SERVICE_3: &str = "service3";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (Router, InMemoryCrudService) {
    let services = InMemoryCrudService::new();
    services.push_id(SERVICE_1, "a1");
    services.push_id(SERVICE_2, "b2");
    services.push_id(SERVICE_3, "c3");

    let config = PipelineConfig::new([
        SERVICE_1.to_string(),
        SERVICE_2.to_string(),
        SERVICE_3.to_string(),
    ])
    .with_policy(
        ExecutionPolicy::from_timeouts(Duration::from_secs(1), Duration::from_secs(10))
            .with_retry(RetryPolicy::no_retry()),
    );
    let workflow = SagaWorkflow::new(
        config,
        LocalSubstrate::new(services.clone()),
        services.clone(),
    );

    let state = Arc::new(AppState::new(workflow));
    (api::create_app(state, get_metrics_handle()), services)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn wait_for_status(app: &Router, workflow_id: &str) -> Value {
    for _ in 0..300 {
        let (status, json) = send(app, get(&format!("/runs/{workflow_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        if json["status"] != "running" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {workflow_id} did not finish");
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_create_and_wait() {
    let (app, services) = setup();

    let (status, json) = send(
        &app,
        post_json(
            "/create?wait=true",
            json!({ "workflow_id": "wf-create", "data": { "name": "widget" } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["workflow_id"], "wf-create");
    assert_eq!(json["result"]["step1_id"], "a1");
    assert_eq!(json["result"]["step2_id"], "b2");
    assert_eq!(json["result"]["step3_id"], "c3");
    assert!(services.compensation_log().is_empty());

    let (status, record) = send(&app, get("/runs/wf-create")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "completed");
    assert_eq!(record["method"], "create");
    assert_eq!(record["run_id"], json["run_id"]);
}

#[tokio::test]
async fn test_generated_workflow_id() {
    let (app, _) = setup();

    let (status, json) = send(&app, post_json("/create?wait=true", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["workflow_id"].as_str().unwrap().starts_with("saga-"));
}

#[tokio::test]
async fn test_failed_create_reports_partial_result() {
    let (app, services) = setup();
    services.set_fail(SERVICE_2, true);

    let (status, json) = send(
        &app,
        post_json("/create?wait=true", json!({ "workflow_id": "wf-fail" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().starts_with("saga failed"));
    assert_eq!(json["workflow_id"], "wf-fail");
    assert_eq!(json["result"]["step1_id"], "a1");
    assert!(json["result"]["step2_id"].is_null());
    assert_eq!(services.compensation_log(), vec!["undo(service1, a1)"]);
    assert!(!services.has_resource(SERVICE_1, "a1"));

    let (_, record) = send(&app, get("/runs/wf-fail")).await;
    assert_eq!(record["status"], "failed");
    assert!(record["error"].as_str().unwrap().contains("step2"));
}

#[tokio::test]
async fn test_update_and_wait() {
    let (app, services) = setup();
    services.seed(SERVICE_1, "x1");
    services.seed(SERVICE_2, "x2");
    services.seed(SERVICE_3, "x3");

    let (status, json) = send(
        &app,
        post_json(
            "/update?wait=true",
            json!({ "data": { "name": "renamed" }, "id1": "x1", "id2": "x2", "id3": "x3" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"]["step1_id"], "x1");
    assert_eq!(json["result"]["step3_id"], "x3");
}

#[tokio::test]
async fn test_update_without_ids_is_unprocessable() {
    let (app, services) = setup();
    services.seed(SERVICE_1, "x1");

    let (status, json) = send(
        &app,
        post_json("/update?wait=true", json!({ "id1": "x1", "id3": "x3" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["result"]["step1_id"], "x1");
    assert_eq!(services.call_count(SERVICE_2), 0);
    assert_eq!(services.call_count(SERVICE_3), 0);
    assert!(services.compensation_log().is_empty());
}

#[tokio::test]
async fn test_delete_and_wait() {
    let (app, services) = setup();
    services.seed(SERVICE_1, "x1");
    services.seed(SERVICE_2, "x2");
    services.seed(SERVICE_3, "x3");

    let (status, _) = send(
        &app,
        post_json(
            "/delete?wait=true",
            json!({ "id1": "x1", "id2": "x2", "id3": "x3" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(services.resource_count(SERVICE_1), 0);
    assert_eq!(services.resource_count(SERVICE_3), 0);
}

#[tokio::test]
async fn test_async_create_completes_in_background() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        post_json("/create", json!({ "workflow_id": "wf-async" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["workflow_id"], "wf-async");
    assert!(json.get("result").is_none());

    let record = wait_for_status(&app, "wf-async").await;
    assert_eq!(record["status"], "completed");
    assert_eq!(record["result"]["step2_id"], "b2");
}

#[tokio::test]
async fn test_running_workflow_id_conflicts() {
    let (app, services) = setup();
    services.set_hang(SERVICE_1, true);

    let busy = json!({ "workflow_id": "wf-busy" });
    let (status, _) = send(&app, post_json("/create", busy.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, post_json("/create", busy)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("wf-busy"));

    let (_, record) = send(&app, get("/runs/wf-busy")).await;
    assert_eq!(record["status"], "running");
}

#[tokio::test]
async fn test_abandoned_wait_request_still_compensates() {
    let (app, services) = setup();
    services.set_hang(SERVICE_2, true);

    let waiting = app.clone().oneshot(post_json(
        "/create?wait=true",
        json!({ "workflow_id": "wf-dropped" }),
    ));
    let dropped = tokio::time::timeout(Duration::from_millis(200), waiting).await;
    assert!(dropped.is_err());

    let record = wait_for_status(&app, "wf-dropped").await;
    assert_eq!(record["status"], "failed");
    assert_eq!(record["result"]["step1_id"], "a1");
    assert_eq!(services.compensation_log(), vec!["undo(service1, a1)"]);
    assert!(!services.has_resource(SERVICE_1, "a1"));

    services.set_hang(SERVICE_2, false);
    let (status, _) = send(
        &app,
        post_json("/create?wait=true", json!({ "workflow_id": "wf-dropped" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_blank_workflow_id_is_rejected() {
    let (app, _) = setup();

    let (status, _) = send(
        &app,
        post_json("/create?wait=true", json!({ "workflow_id": "  " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_run_returns_404() {
    let (app, _) = setup();

    let (status, json) = send(&app, get("/runs/missing")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_default_state_in_mock_mode() {
    let config = Config {
        mock_mode: true,
        ..Config::default()
    };
    let state = api::create_default_state(&config).unwrap();
    let app = api::create_app(state, get_metrics_handle());

    let (status, json) = send(&app, post_json("/create?wait=true", json!({ "data": {} }))).await;

    assert_eq!(status, StatusCode::OK);
    for key in ["step1_id", "step2_id", "step3_id"] {
        assert!(json["result"][key].as_str().unwrap().starts_with("mock-"));
    }
}
