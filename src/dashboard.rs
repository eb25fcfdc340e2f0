use std::net::SocketAddr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::error::{MonitorError, Result};
use crate::monitor::MonitorHandle;
use crate::view::JobTable;

#[derive(Clone)]
pub struct DashboardState {
    pub monitor: MonitorHandle,
    pub jobs: JobTable,
}

#[derive(Serialize)]
struct StatusResponse {
    clock: u64,
    clock_running: bool,
    aging_running: bool,
    connected: bool,
    nodes: usize,
    busy_slots: usize,
    tracked_jobs: usize,
    dropped_updates: u64,
    malformed_events: u64,
}

/// One row of the job table
#[derive(Serialize)]
struct JobResponse {
    id: u32,
    file_name: String,
    client: String,
    server: Option<String>,
    state: String,
    exit_code: Option<i32>,
    real_msec: Option<u64>,
    user_msec: Option<u64>,
    majflt: Option<u64>,
    in_uncompressed: Option<u64>,
    out_uncompressed: Option<u64>,
}

#[derive(Deserialize)]
struct CheckNodeRequest {
    host: String,
    max_kids: u32,
}

#[derive(Serialize)]
struct ActionResponse {
    success: bool,
    error: Option<String>,
}

impl ActionResponse {
    fn from_result(result: Result<()>) -> (StatusCode, Json<Self>) {
        match result {
            Ok(()) => (
                StatusCode::OK,
                Json(Self {
                    success: true,
                    error: None,
                }),
            ),
            Err(e) => (
                match e {
                    MonitorError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::SERVICE_UNAVAILABLE,
                },
                Json(Self {
                    success: false,
                    error: Some(e.to_string()),
                }),
            ),
        }
    }
}

pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/nodes", get(list_nodes_handler))
        .route("/api/nodes/:host", get(node_handler))
        .route("/api/jobs", get(list_jobs_handler))
        .route("/api/check", post(check_node_handler))
        .route("/api/start", post(start_handler))
        .route("/api/stop", post(stop_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn run_dashboard(addr: SocketAddr, state: DashboardState) {
    let app = router(state);

    tracing::info!(addr = %addr, "Starting dashboard server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind dashboard server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Dashboard server failed");
    }
}

async fn status_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let snapshot = state.monitor.latest();

    Json(StatusResponse {
        clock: snapshot.registry.clock,
        clock_running: snapshot.clock_running,
        aging_running: snapshot.aging_running,
        connected: snapshot.connected,
        nodes: snapshot.registry.nodes.len(),
        busy_slots: snapshot.registry.nodes.iter().map(|n| n.busy_slots()).sum(),
        tracked_jobs: snapshot.tracked_jobs,
        dropped_updates: snapshot.registry.dropped_updates,
        malformed_events: snapshot.malformed_events,
    })
}

async fn list_nodes_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let snapshot = state.monitor.latest();
    Json(snapshot.registry.nodes.clone())
}

async fn node_handler(
    State(state): State<DashboardState>,
    Path(host): Path<String>,
) -> impl IntoResponse {
    let snapshot = state.monitor.latest();
    match snapshot.registry.node(&host) {
        Some(node) => Json(node.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_jobs_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let jobs: Vec<JobResponse> = state
        .jobs
        .rows()
        .into_iter()
        .map(|job| {
            let outcome = job.outcome().copied();
            JobResponse {
                id: job.id,
                state: job.state().to_string(),
                exit_code: job.exit_code(),
                real_msec: outcome.map(|o| o.real_msec),
                user_msec: outcome.map(|o| o.user_msec),
                majflt: outcome.map(|o| o.majflt),
                in_uncompressed: outcome.map(|o| o.in_uncompressed),
                out_uncompressed: outcome.map(|o| o.out_uncompressed),
                file_name: job.file_name,
                client: job.client,
                server: job.server,
            }
        })
        .collect();

    Json(jobs)
}

async fn check_node_handler(
    State(state): State<DashboardState>,
    Json(payload): Json<CheckNodeRequest>,
) -> impl IntoResponse {
    if payload.host.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse {
                success: false,
                error: Some("host must not be empty".to_string()),
            }),
        );
    }
    ActionResponse::from_result(
        state
            .monitor
            .request_node_check(payload.host, payload.max_kids)
            .await,
    )
}

async fn start_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    ActionResponse::from_result(state.monitor.start().await)
}

async fn stop_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    ActionResponse::from_result(state.monitor.stop().await)
}
