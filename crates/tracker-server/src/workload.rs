use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use tracker_core::task::Timeframe;

use crate::auth;
use crate::error::ApiResult;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WorkloadQuery {
    pub timeframe: Option<String>,
}

/// GET /api/workload?timeframe=week|month|quarter
pub async fn get_workload(
    State(state): State<AppState>,
    Query(query): Query<WorkloadQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::require_user(&state, &headers)?;
    let timeframe = Timeframe::parse(query.timeframe.as_deref());
    let summary = state.workload.analyze(&user.id, timeframe).await?;
    Ok(Json(serde_json::json!({ "workload": summary })))
}
