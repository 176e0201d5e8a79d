use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use tracker_core::ids::TaskId;
use tracker_engine::tasks::{CreateTask, UpdateTask};

use crate::auth;
use crate::error::ApiResult;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListTasksQuery {
    #[serde(alias = "includeCompleted")]
    pub include_completed: bool,
    #[serde(alias = "includePrioritization")]
    pub include_prioritization: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteTaskQuery {
    #[serde(alias = "hardDelete")]
    pub hard: bool,
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateTask>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let user = auth::require_user(&state, &headers)?;
    let created = state.engine.create_task(&user.id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Task created successfully",
            "task": created.task,
            "suggestion": created.suggestion,
        })),
    ))
}

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    let listing = state
        .engine
        .list_tasks(&user.id, query.include_completed, query.include_prioritization)
        .await?;
    Ok(Json(serde_json::json!({
        "tasks": listing.tasks,
        "prioritization": listing.prioritization,
    })))
}

/// PUT /api/tasks/{task_id}
pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateTask>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    let updated = state
        .engine
        .update_task(&user.id, &TaskId::from_raw(task_id), req)
        .await?;
    Ok(Json(serde_json::json!({
        "message": "Task updated successfully",
        "task": updated.task,
        "suggestion": updated.suggestion,
    })))
}

/// DELETE /api/tasks/{task_id}
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Query(query): Query<DeleteTaskQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    state
        .engine
        .delete_task(&user.id, &TaskId::from_raw(task_id), query.hard)
        .await?;
    let message = if query.hard {
        "Task permanently deleted"
    } else {
        "Task moved to trash"
    };
    Ok(Json(serde_json::json!({ "message": message })))
}

/// POST /api/tasks/{task_id}/restore
pub async fn restore_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    let task = state
        .engine
        .restore_task(&user.id, &TaskId::from_raw(task_id))
        .await?;
    Ok(Json(serde_json::json!({
        "message": "Task restored successfully",
        "task": task,
    })))
}

/// GET /api/trash
pub async fn list_trash(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    let tasks = state.engine.list_trash(&user.id).await?;
    Ok(Json(serde_json::json!({ "tasks": tasks })))
}

/// DELETE /api/trash
pub async fn empty_trash(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    let removed = state.engine.empty_trash(&user.id).await?;
    Ok(Json(serde_json::json!({
        "message": format!("Emptied trash: {removed} tasks permanently deleted"),
        "removed": removed,
    })))
}

/// GET /api/tasks/{task_id}/audit
pub async fn audit_trail(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    let trail = state
        .engine
        .audit_trail(&user.id, &TaskId::from_raw(task_id))
        .await?;
    Ok(Json(serde_json::json!({ "audit": trail })))
}
