//! Endpoints that start pipeline runs and report on them.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{Method, OperationRequest, OperationResult, ResourceId, RunId};
use saga::{Compensator, ExecutionSubstrate, SagaWorkflow};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::runs::{RunRecord, RunRegistry};

/// Shared application state accessible from all handlers.
pub struct AppState<X, C>
where
    X: ExecutionSubstrate,
    C: Compensator + 'static,
{
    pub workflow: SagaWorkflow<X, C>,
    pub runs: RunRegistry,
}

impl<X, C> AppState<X, C>
where
    X: ExecutionSubstrate,
    C: Compensator + 'static,
{
    pub fn new(workflow: SagaWorkflow<X, C>) -> Self {
        Self {
            workflow,
            runs: RunRegistry::new(),
        }
    }
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    /// Caller-chosen id for the run; generated when absent.
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub id1: Option<ResourceId>,
    #[serde(default)]
    pub id2: Option<ResourceId>,
    #[serde(default)]
    pub id3: Option<ResourceId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRunQuery {
    /// Block until the run finishes and return its result.
    #[serde(default)]
    pub wait: bool,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub workflow_id: String,
    pub run_id: RunId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OperationResult>,
}

// -- Handlers --

/// POST /create — create one resource in each service.
pub async fn create<X, C>(
    State(state): State<Arc<AppState<X, C>>>,
    Query(query): Query<StartRunQuery>,
    Json(req): Json<StartRunRequest>,
) -> Result<Json<StartRunResponse>, ApiError>
where
    X: ExecutionSubstrate + 'static,
    C: Compensator + 'static,
{
    start(state, Method::Create, query, req).await
}

/// POST /update — update the resources named by `id1`..`id3`.
pub async fn update<X, C>(
    State(state): State<Arc<AppState<X, C>>>,
    Query(query): Query<StartRunQuery>,
    Json(req): Json<StartRunRequest>,
) -> Result<Json<StartRunResponse>, ApiError>
where
    X: ExecutionSubstrate + 'static,
    C: Compensator + 'static,
{
    start(state, Method::Update, query, req).await
}

/// POST /delete — delete the resources named by `id1`..`id3`.
pub async fn delete<X, C>(
    State(state): State<Arc<AppState<X, C>>>,
    Query(query): Query<StartRunQuery>,
    Json(req): Json<StartRunRequest>,
) -> Result<Json<StartRunResponse>, ApiError>
where
    X: ExecutionSubstrate + 'static,
    C: Compensator + 'static,
{
    start(state, Method::Delete, query, req).await
}

/// GET /runs/{workflow_id} — latest status of a run.
pub async fn status<X, C>(
    State(state): State<Arc<AppState<X, C>>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<RunRecord>, ApiError>
where
    X: ExecutionSubstrate + 'static,
    C: Compensator + 'static,
{
    state
        .runs
        .get(&workflow_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {workflow_id} not found")))
}

#[tracing::instrument(skip(state, query, req), fields(workflow_id = tracing::field::Empty))]
async fn start<X, C>(
    state: Arc<AppState<X, C>>,
    method: Method,
    query: StartRunQuery,
    req: StartRunRequest,
) -> Result<Json<StartRunResponse>, ApiError>
where
    X: ExecutionSubstrate + 'static,
    C: Compensator + 'static,
{
    let workflow_id = match req.workflow_id {
        Some(id) if id.trim().is_empty() => {
            return Err(ApiError::BadRequest("workflow_id must not be blank".into()));
        }
        Some(id) => id,
        None => format!("saga-{}", uuid::Uuid::new_v4()),
    };
    tracing::Span::current().record("workflow_id", workflow_id.as_str());

    let run_id = RunId::new();
    if !state.runs.start(&workflow_id, run_id, method).await {
        return Err(ApiError::Conflict(format!(
            "Workflow {workflow_id} is already running"
        )));
    }

    let request = OperationRequest {
        method,
        data: req.data,
        id1: req.id1,
        id2: req.id2,
        id3: req.id3,
    };

    // Owned by its own task: dropping the request must not cancel the saga.
    let task_state = state.clone();
    let task_workflow_id = workflow_id.clone();
    let run = tokio::spawn(async move {
        let outcome = task_state.workflow.execute(run_id, &request).await;
        task_state.runs.finish(&task_workflow_id, &outcome).await;
        outcome
    });
    tracing::info!(%run_id, wait = query.wait, "run started");

    if !query.wait {
        return Ok(Json(StartRunResponse {
            workflow_id,
            run_id,
            result: None,
        }));
    }

    let outcome = run
        .await
        .map_err(|e| ApiError::Internal(format!("run {run_id} did not finish: {e}")))?;

    match outcome.error {
        None => Ok(Json(StartRunResponse {
            workflow_id,
            run_id,
            result: Some(outcome.result),
        })),
        Some(error) => Err(ApiError::RunFailed {
            workflow_id,
            run_id,
            error,
            result: outcome.result,
        }),
    }
}
