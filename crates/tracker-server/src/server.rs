use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tracker_advisor::AdvisorGateway;
use tracker_engine::{LifecycleEngine, WorkloadAnalyzer};
use tracker_store::users::UserRepo;
use tracker_store::Database;

use crate::{auth, subtasks, tasks, workload};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
    pub workload: Arc<WorkloadAnalyzer>,
    pub users: Arc<UserRepo>,
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database, advisor: Arc<AdvisorGateway>) -> Self {
        Self {
            engine: Arc::new(LifecycleEngine::new(db.clone(), advisor.clone())),
            workload: Arc::new(WorkloadAnalyzer::new(db.clone(), advisor)),
            users: Arc::new(UserRepo::new(db.clone())),
            db,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(auth::register))
        .route("/api/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/api/tasks/{task_id}",
            put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/api/tasks/{task_id}/restore", post(tasks::restore_task))
        .route("/api/tasks/{task_id}/audit", get(tasks::audit_trail))
        .route(
            "/api/tasks/{task_id}/subtasks",
            post(subtasks::create_subtask).get(subtasks::list_subtasks),
        )
        .route(
            "/api/tasks/{task_id}/subtasks/{subtask_id}",
            put(subtasks::update_subtask).delete(subtasks::delete_subtask),
        )
        .route("/api/workload", get(workload::get_workload))
        .route("/api/trash", get(tasks::list_trash).delete(tasks::empty_trash))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. Returns a handle holding the port and
/// the serve task.
pub async fn start(
    config: ServerConfig,
    db: Database,
    advisor: Arc<AdvisorGateway>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(db, advisor);
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "tracker server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()`. Keeps the serve task alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

/// Liveness plus database reachability.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "healthy", "database": "reachable" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unhealthy", "database": "unreachable" })),
            )
        }
    }
}
