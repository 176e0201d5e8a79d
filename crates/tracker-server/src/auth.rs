use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use tracker_store::users::UserRow;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Resolve the bearer token to a registered owner. The server never
/// authenticates beyond this lookup; it hands the engine a resolved
/// identity and lets ownership checks do the rest.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<UserRow, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("no token provided"))?;

    state
        .users
        .find_by_token(token)?
        .ok_or_else(|| ApiError::unauthorized("invalid token"))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
}

/// POST /api/users: register an owner and issue a bearer token.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("a valid email is required"));
    }

    let user = state.users.create(email)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "User registered successfully",
            "user": user,
        })),
    ))
}
