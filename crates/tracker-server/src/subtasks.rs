use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use tracker_core::ids::{SubtaskId, TaskId};

use crate::auth;
use crate::error::ApiResult;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSubtaskRequest {
    pub title: Option<String>,
    #[serde(alias = "generateWithAi")]
    pub generate_with_ai: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateSubtaskRequest {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

/// POST /api/tasks/{task_id}/subtasks
pub async fn create_subtask(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CreateSubtaskRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let user = auth::require_user(&state, &headers)?;
    let created = state
        .engine
        .create_subtask(&user.id, &TaskId::from_raw(task_id), req.title, req.generate_with_ai)
        .await?;
    let message = if created.suggestion.is_some() {
        "AI-generated subtasks created successfully"
    } else {
        "Subtask created successfully"
    };
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": message,
            "subtasks": created.subtasks,
        })),
    ))
}

/// GET /api/tasks/{task_id}/subtasks
pub async fn list_subtasks(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    let subtasks = state
        .engine
        .list_subtasks(&user.id, &TaskId::from_raw(task_id))
        .await?;
    Ok(Json(serde_json::json!({ "subtasks": subtasks })))
}

/// PUT /api/tasks/{task_id}/subtasks/{subtask_id}
pub async fn update_subtask(
    State(state): State<AppState>,
    Path((task_id, subtask_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<UpdateSubtaskRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    let subtask = state
        .engine
        .update_subtask(
            &user.id,
            &TaskId::from_raw(task_id),
            &SubtaskId::from_raw(subtask_id),
            req.title,
            req.completed,
        )
        .await?;
    Ok(Json(serde_json::json!({
        "message": "Subtask updated successfully",
        "subtask": subtask,
    })))
}

/// DELETE /api/tasks/{task_id}/subtasks/{subtask_id}
pub async fn delete_subtask(
    State(state): State<AppState>,
    Path((task_id, subtask_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    state
        .engine
        .delete_subtask(
            &user.id,
            &TaskId::from_raw(task_id),
            &SubtaskId::from_raw(subtask_id),
        )
        .await?;
    Ok(Json(serde_json::json!({ "message": "Subtask deleted successfully" })))
}
