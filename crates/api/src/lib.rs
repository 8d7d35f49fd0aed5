//! HTTP front door for the three-service saga pipeline.
//!
//! `POST /create`, `/update` and `/delete` start a run (optionally waiting
//! for it with `?wait=true`), `GET /runs/{workflow_id}` reports on it, and
//! `/health` and `/metrics` serve the usual probes.

pub mod config;
pub mod error;
pub mod routes;
pub mod runs;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use crud_client::CrudClient;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{Compensator, ExecutionSubstrate, LocalSubstrate, SagaWorkflow, ServiceError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::operations::AppState;

/// Application state backed by real HTTP services.
pub type HttpAppState = AppState<LocalSubstrate<CrudClient>, CrudClient>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<X, C>(state: Arc<AppState<X, C>>, metrics_handle: PrometheusHandle) -> Router
where
    X: ExecutionSubstrate + 'static,
    C: Compensator + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/create", post(routes::operations::create::<X, C>))
        .route("/update", post(routes::operations::update::<X, C>))
        .route("/delete", post(routes::operations::delete::<X, C>))
        .route(
            "/runs/{workflow_id}",
            get(routes::operations::status::<X, C>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the HTTP client, local substrate and orchestrator from `config`.
pub fn create_default_state(config: &Config) -> Result<Arc<HttpAppState>, ServiceError> {
    let client = CrudClient::new(config.client_config())?;
    let substrate = LocalSubstrate::with_slots(client.clone(), config.max_concurrent_steps);
    let workflow = SagaWorkflow::new(config.pipeline_config(), substrate, client);

    Ok(Arc::new(AppState::new(workflow)))
}
