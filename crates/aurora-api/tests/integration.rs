//! Integration tests: routes, envelopes and status codes under every strategy.

use aurora_api::config::{build_executor, GatewayConfig, StrategyKind};
use aurora_api::server::{self, AppState};
use aurora_delegate::{DelegateConfig, StubDelegate};
use aurora_executor::{CallbackExecutor, JobExecutor, SyncExecutor, ThreadPool, ThreadPoolExecutor};
use aurora_types::{
    Capabilities, CommandDelegate, CommandError, Instances, JobCommand, JobKey, JobSpec, Operation,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::future::join_all;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

const PREFIX: &str = "app";

fn app_with(executor: Arc<dyn JobExecutor>) -> axum::Router {
    server::router(PREFIX, Arc::new(AppState { executor }))
}

fn executors(delegate: Arc<dyn CommandDelegate>) -> Vec<Arc<dyn JobExecutor>> {
    vec![
        Arc::new(SyncExecutor::new(delegate.clone())),
        Arc::new(CallbackExecutor::new(delegate.clone())),
        Arc::new(ThreadPoolExecutor::new(delegate, ThreadPool::new(2).unwrap())),
    ]
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: impl Into<Body>,
) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    let j = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, j)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_is_created_under_every_strategy() {
    let stub = Arc::new(StubDelegate::new());
    for executor in executors(stub.clone()) {
        let name = executor.name();
        let app = app_with(executor);
        let (status, j) = send(
            &app,
            "PUT",
            "/app/jobs/c1/roleA/prod/web",
            "jobs = [Job(name='web')]",
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", name);
        assert_eq!(
            j,
            json!({
                "status": "success",
                "key": "c1/roleA/prod/web",
                "count": 1,
                "job": "c1/roleA/prod/web"
            }),
            "{}",
            name
        );
    }
    let calls = stub.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| *c
        == JobCommand::CreateJob {
            key: JobKey::full("c1", "roleA", "prod", "web"),
            spec: JobSpec::from("jobs = [Job(name='web')]"),
        }));
}

#[tokio::test]
async fn list_empty_is_not_found() {
    let app = app_with(Arc::new(SyncExecutor::new(Arc::new(StubDelegate::new()))));
    let (status, j) = send(&app, "GET", "/app/jobs/c1/roleA", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        j,
        json!({ "status": "success", "key": "c1/roleA", "count": 0, "jobs": {} })
    );
}

#[tokio::test]
async fn list_numbers_jobs_from_one() {
    let stub = StubDelegate::new().with_jobs(["c1/roleA/prod/web", "c1/roleA/prod/api"]);
    let app = app_with(Arc::new(CallbackExecutor::new(Arc::new(stub))));
    let (status, j) = send(&app, "GET", "/app/jobs/c1/roleA", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["count"], 2);
    assert_eq!(j["jobs"]["1"], "c1/roleA/prod/web");
    assert_eq!(j["jobs"]["2"], "c1/roleA/prod/api");
}

#[tokio::test]
async fn delegate_failure_is_server_error_with_diagnostics() {
    let stub = StubDelegate::new().failing(
        Operation::CreateJob,
        CommandError::Rejected {
            code: "INVALID_REQUEST".to_string(),
            message: "job already exists".to_string(),
        },
    );
    let app = app_with(Arc::new(SyncExecutor::new(Arc::new(stub))));
    let (status, j) = send(&app, "PUT", "/app/jobs/c1/roleA/prod/web", "spec").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        j,
        json!({
            "status": "failure",
            "key": "c1/roleA/prod/web",
            "count": 0,
            "job": [],
            "errors": [
                "Error reported by aurora client:",
                "Response from scheduler: INVALID_REQUEST (message: job already exists)"
            ]
        })
    );
}

#[tokio::test]
async fn delete_passes_shards_through() {
    let stub = Arc::new(StubDelegate::new());
    let app = app_with(Arc::new(SyncExecutor::new(stub.clone())));

    let (status, j) = send(
        &app,
        "DELETE",
        "/app/jobs/c1/roleA/prod/web?shards=1&shards=2",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["job"], "c1/roleA/prod/web");
    assert_eq!(j["count"], 1);

    let (status, _) = send(&app, "DELETE", "/app/jobs/c1/roleA/prod/web", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);

    let key = JobKey::full("c1", "roleA", "prod", "web");
    assert_eq!(
        stub.calls(),
        vec![
            JobCommand::DeleteJob {
                key: key.clone(),
                spec: None,
                instances: ["1", "2"].into_iter().collect(),
            },
            JobCommand::DeleteJob {
                key,
                spec: None,
                instances: Instances::all(),
            },
        ]
    );
}

#[tokio::test]
async fn delete_of_nothing_is_not_found() {
    let stub = StubDelegate::new().with_nothing_to_delete();
    let app = app_with(Arc::new(SyncExecutor::new(Arc::new(stub))));
    let (status, j) = send(&app, "DELETE", "/app/jobs/c1/roleA/prod/gone", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        j,
        json!({ "status": "success", "key": "c1/roleA/prod/gone", "count": 0, "job": "" })
    );
}

#[tokio::test]
async fn update_family_is_accepted() {
    let stub = Arc::new(StubDelegate::new());
    let app = app_with(Arc::new(SyncExecutor::new(stub.clone())));
    let base = "/app/jobs/c1/roleA/prod/web";

    let (status, j) = send(&app, "PUT", &format!("{}/update?shards=0", base), "new spec").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(j["job"], "c1/roleA/prod/web");

    let (status, _) = send(&app, "DELETE", &format!("{}/update", base), Body::empty()).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = send(&app, "PUT", &format!("{}/restart", base), "spec").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let key = JobKey::full("c1", "roleA", "prod", "web");
    assert_eq!(
        stub.calls(),
        vec![
            JobCommand::UpdateJob {
                key: key.clone(),
                spec: JobSpec::from("new spec"),
                instances: ["0"].into_iter().collect(),
            },
            JobCommand::CancelUpdate {
                key: key.clone(),
                spec: None,
            },
            JobCommand::RestartJob {
                key,
                spec: Some(JobSpec::from("spec")),
                instances: Instances::all(),
            },
        ]
    );
}

#[tokio::test]
async fn version_and_health() {
    let app = app_with(Arc::new(SyncExecutor::new(Arc::new(StubDelegate::new()))));
    let (status, j) = send(&app, "GET", "/app/version", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j, json!({ "status": "success", "version": "0.1" }));

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn unsupported_operations_are_not_routed() {
    let stub = StubDelegate::new()
        .with_capabilities(Capabilities::only([Operation::ListJobs, Operation::CreateJob]));
    let app = app_with(Arc::new(SyncExecutor::new(Arc::new(stub))));

    let (status, _) = send(&app, "PUT", "/app/jobs/c1/roleA/prod/web", "spec").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, "DELETE", "/app/jobs/c1/roleA/prod/web", Body::empty()).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(&app, "PUT", "/app/jobs/c1/roleA/prod/web/update", "spec").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "PUT", "/app/jobs/c1/roleA/prod/web/restart", "spec").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn routes_live_under_the_prefix() {
    let app = app_with(Arc::new(SyncExecutor::new(Arc::new(StubDelegate::new()))));
    let (status, _) = send(&app, "GET", "/version", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let root = server::router(
        "",
        Arc::new(AppState {
            executor: Arc::new(SyncExecutor::new(Arc::new(StubDelegate::new()))),
        }),
    );
    let (status, _) = send(&root, "GET", "/version", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn thread_pool_queues_excess_requests() {
    let stub = Arc::new(StubDelegate::new().with_latency(Duration::from_millis(50)));
    let app = app_with(Arc::new(ThreadPoolExecutor::new(
        stub.clone(),
        ThreadPool::new(2).unwrap(),
    )));
    let requests = (0..6).map(|i| {
        let app = app.clone();
        async move {
            send(&app, "PUT", &format!("/app/jobs/c1/roleA/prod/job{}", i), "spec").await
        }
    });
    let results: Vec<_> = join_all(requests).await;
    assert!(results.iter().all(|(s, _)| *s == StatusCode::CREATED));
    assert_eq!(stub.calls().len(), 6);
    assert!(stub.max_concurrency() <= 2);
}

#[tokio::test]
async fn panicking_delegate_is_server_error() {
    let stub = StubDelegate::new().panicking(Operation::ListJobs);
    let app = app_with(Arc::new(SyncExecutor::new(Arc::new(stub))));
    let (status, j) = send(&app, "GET", "/app/jobs/c1/roleA", Body::empty()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(j["status"], "failure");
    assert_eq!(j["jobs"], json!({}));
    assert!(j["errors"][0]
        .as_str()
        .unwrap()
        .starts_with("delegate panicked"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn process_pool_runs_commands_in_workers() {
    let config = GatewayConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        prefix: PREFIX.to_string(),
        delegate: DelegateConfig::Memory,
        strategy: StrategyKind::Process,
        parallel: 2,
    };
    let executor =
        build_executor(&config, Path::new(env!("CARGO_BIN_EXE_aurora-rest"))).unwrap();
    let app = app_with(executor.clone());

    let (status, j) = send(&app, "PUT", "/app/jobs/c1/roleA/prod/web", "spec").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(j["job"], "c1/roleA/prod/web");

    let (status, j) = send(&app, "PUT", "/app/jobs/c1/roleA/prod/empty", Body::empty()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(j["errors"][0], "Failed to parse job spec");

    let (status, j) = send(
        &app,
        "PUT",
        "/app/jobs/c1/roleA/prod/binary",
        vec![0xffu8, 0xfe, 0x00],
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(j["errors"][0]
        .as_str()
        .unwrap()
        .starts_with("cannot marshal across worker boundary"));

    let (status, j) = send(&app, "DELETE", "/app/jobs/c1/roleA/prod/nothing", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(j["job"], "");

    let requests = (0..5).map(|i| {
        let app = app.clone();
        async move {
            send(&app, "PUT", &format!("/app/jobs/c1/roleB/prod/job{}", i), "spec").await
        }
    });
    let results = join_all(requests).await;
    assert!(results.iter().all(|(s, _)| *s == StatusCode::CREATED));

    executor.close();
}
