//! Axum server and routes.

use aurora_executor::JobExecutor;
use aurora_types::{CommandResult, Instances, JobKey, JobSpec, Operation, Payload};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put, MethodRouter},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const API_VERSION: &str = "0.1";

/// Query parameter carrying instance (shard) ids; may repeat.
const SHARDS_PARAM: &str = "shards";

pub struct AppState {
    pub executor: Arc<dyn JobExecutor>,
}

/// Routes under `/<prefix>`, restricted to the operations the executor exposes.
pub fn router(prefix: &str, state: Arc<AppState>) -> Router {
    let caps = state.executor.capabilities();
    let mut api = Router::new().route("/version", get(handle_version));

    if caps.supports(Operation::ListJobs) {
        api = api.route("/jobs/:cluster/:role", get(handle_list_jobs));
    }

    let mut job: MethodRouter<Arc<AppState>> = MethodRouter::new();
    if caps.supports(Operation::CreateJob) {
        job = job.put(handle_create_job);
    }
    if caps.supports(Operation::DeleteJob) {
        job = job.delete(handle_delete_job);
    }
    if caps.supports(Operation::CreateJob) || caps.supports(Operation::DeleteJob) {
        api = api.route("/jobs/:cluster/:role/:env/:name", job);
    }

    let mut update: MethodRouter<Arc<AppState>> = MethodRouter::new();
    if caps.supports(Operation::UpdateJob) {
        update = update.put(handle_update_job);
    }
    if caps.supports(Operation::CancelUpdate) {
        update = update.delete(handle_cancel_update);
    }
    if caps.supports(Operation::UpdateJob) || caps.supports(Operation::CancelUpdate) {
        api = api.route("/jobs/:cluster/:role/:env/:name/update", update);
    }

    if caps.supports(Operation::RestartJob) {
        api = api.route(
            "/jobs/:cluster/:role/:env/:name/restart",
            put(handle_restart_job),
        );
    }

    tracing::info!(
        prefix,
        strategy = state.executor.name(),
        operations = ?caps.iter().collect::<Vec<_>>(),
        "application created"
    );

    let prefix = prefix.trim_matches('/');
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{}", prefix), api)
    };
    app.route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type JobPath = Path<(String, String, String, String)>;
type RawQuery = Query<Vec<(String, String)>>;

fn job_key(Path((cluster, role, env, name)): JobPath) -> JobKey {
    JobKey::full(cluster, role, env, name)
}

/// Every `shards` value, in request order.
fn instances(Query(params): RawQuery) -> Instances {
    params
        .into_iter()
        .filter(|(k, _)| k == SHARDS_PARAM)
        .map(|(_, v)| v)
        .collect()
}

fn optional_spec(body: Bytes) -> Option<JobSpec> {
    (!body.is_empty()).then(|| JobSpec::new(body.to_vec()))
}

/// Status code and JSON envelope for a normalized result.
pub fn render(op: Operation, result: &CommandResult) -> (StatusCode, Value) {
    let field = match op {
        Operation::ListJobs => "jobs",
        _ => "job",
    };
    match &result.errors {
        None => {
            let count = result.payload.count();
            let status = match op {
                Operation::CreateJob => StatusCode::CREATED,
                Operation::UpdateJob | Operation::CancelUpdate | Operation::RestartJob => {
                    StatusCode::ACCEPTED
                }
                // nothing matched: not an error, but worth a 404
                Operation::ListJobs | Operation::DeleteJob if count == 0 => StatusCode::NOT_FOUND,
                _ => StatusCode::OK,
            };
            let mut body = json!({
                "status": "success",
                "key": result.job_key,
                "count": count,
            });
            body[field] = success_field(&result.payload);
            (status, body)
        }
        Some(errors) => {
            let errors = if errors.is_empty() {
                vec![format!("{} failed", op)]
            } else {
                errors.clone()
            };
            let empty = match op {
                Operation::ListJobs => json!({}),
                _ => json!([]),
            };
            let mut body = json!({
                "status": "failure",
                "key": result.job_key,
                "count": 0,
                "errors": errors,
            });
            body[field] = empty;
            (StatusCode::INTERNAL_SERVER_ERROR, body)
        }
    }
}

fn success_field(payload: &Payload) -> Value {
    match payload {
        Payload::Jobs(jobs) => {
            let numbered: BTreeMap<usize, &String> =
                jobs.iter().enumerate().map(|(i, j)| (i + 1, j)).collect();
            json!(numbered)
        }
        Payload::Job(key) => json!(key),
        Payload::Deleted(keys) => json!(keys.first().cloned().unwrap_or_default()),
    }
}

fn respond(op: Operation, result: CommandResult) -> (StatusCode, Json<Value>) {
    let (status, body) = render(op, &result);
    if result.is_success() {
        tracing::info!(%op, key = %result.job_key, status = status.as_u16(), "request completed");
    } else {
        tracing::warn!(%op, key = %result.job_key, errors = ?result.errors, "request failed");
    }
    (status, Json(body))
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn handle_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        status: "success",
        version: API_VERSION,
    })
}

async fn handle_list_jobs(
    State(state): State<Arc<AppState>>,
    Path((cluster, role)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    tracing::info!(%cluster, %role, "entered list jobs");
    let result = state.executor.list_jobs(&cluster, &role).resolve().await;
    respond(Operation::ListJobs, result)
}

async fn handle_create_job(
    State(state): State<Arc<AppState>>,
    path: JobPath,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let key = job_key(path);
    tracing::info!(%key, "entered create job");
    let result = state
        .executor
        .create_job(key, JobSpec::new(body.to_vec()))
        .resolve()
        .await;
    respond(Operation::CreateJob, result)
}

async fn handle_delete_job(
    State(state): State<Arc<AppState>>,
    path: JobPath,
    query: RawQuery,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let key = job_key(path);
    let instances = instances(query);
    tracing::info!(%key, instances = %instances.joined(), "entered delete job");
    let result = state
        .executor
        .delete_job(key, optional_spec(body), instances)
        .resolve()
        .await;
    respond(Operation::DeleteJob, result)
}

async fn handle_update_job(
    State(state): State<Arc<AppState>>,
    path: JobPath,
    query: RawQuery,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let key = job_key(path);
    let instances = instances(query);
    tracing::info!(%key, instances = %instances.joined(), "entered update job");
    let result = state
        .executor
        .update_job(key, JobSpec::new(body.to_vec()), instances)
        .resolve()
        .await;
    respond(Operation::UpdateJob, result)
}

async fn handle_cancel_update(
    State(state): State<Arc<AppState>>,
    path: JobPath,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let key = job_key(path);
    tracing::info!(%key, "entered cancel update");
    let result = state
        .executor
        .cancel_update(key, optional_spec(body))
        .resolve()
        .await;
    respond(Operation::CancelUpdate, result)
}

async fn handle_restart_job(
    State(state): State<Arc<AppState>>,
    path: JobPath,
    query: RawQuery,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let key = job_key(path);
    let instances = instances(query);
    tracing::info!(%key, instances = %instances.joined(), "entered restart job");
    let result = state
        .executor
        .restart_job(key, optional_spec(body), instances)
        .resolve()
        .await;
    respond(Operation::RestartJob, result)
}

async fn handle_health() -> &'static str {
    "ok"
}
