//! HTTP handlers for login, snapshots and point actions.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use server_api::{dispatch, login, points_snapshot};
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{
        AddPointRequest, ClientRequest, LoginRequest, LoginResponse, PointsSnapshot, ServerEvent,
        UserActionRequest,
    },
};
use tracing::{error, info};

use crate::app_state::AppState;

pub(crate) type HttpError = (StatusCode, Json<ApiError>);

#[derive(Debug, Deserialize)]
pub(crate) struct UserQuery {
    pub(crate) user_id: i64,
}

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn http_error(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}

pub(crate) async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(err) => {
            error!(error = %err, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

pub(crate) async fn http_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, HttpError> {
    let user_id = login(&state.api, &req.username).await.map_err(http_error)?;
    info!(user_id = user_id.0, "user logged in");
    Ok(Json(LoginResponse { user_id: user_id.0 }))
}

pub(crate) async fn http_points(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> Result<Json<PointsSnapshot>, HttpError> {
    let snapshot = points_snapshot(&state.api, UserId(q.user_id))
        .await
        .map_err(http_error)?;
    Ok(Json(snapshot))
}

pub(crate) async fn http_start_adding(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserActionRequest>,
) -> Result<Json<Vec<ServerEvent>>, HttpError> {
    run(&state, UserId(req.user_id), ClientRequest::StartAdding).await
}

pub(crate) async fn http_add_point(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddPointRequest>,
) -> Result<Json<Vec<ServerEvent>>, HttpError> {
    run(
        &state,
        UserId(req.user_id),
        ClientRequest::AddPoint {
            lat: req.lat,
            lng: req.lng,
        },
    )
    .await
}

pub(crate) async fn http_clear_points(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserActionRequest>,
) -> Result<Json<Vec<ServerEvent>>, HttpError> {
    run(&state, UserId(req.user_id), ClientRequest::ClearPoints).await
}

async fn run(
    state: &AppState,
    user_id: UserId,
    request: ClientRequest,
) -> Result<Json<Vec<ServerEvent>>, HttpError> {
    let events = dispatch(&state.api, user_id, request)
        .await
        .map_err(http_error)?;
    Ok(Json(events))
}
