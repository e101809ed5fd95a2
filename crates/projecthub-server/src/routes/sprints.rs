use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use projecthub_domain::{
    AddSprintTasksRequest, BoardId, CreateSprintRequest, Sprint, SprintId, SprintWithTasks, TaskId,
};

use crate::{
    auth::CurrentUser,
    error::ApiError,
    extract::{ApiJson, ApiPath},
    state::AppState,
};

/// POST /api/boards/{board_id}/sprints
///
/// The body repeats the board id; a mismatch with the path is rejected
/// before anything is stored.
pub async fn create_sprint(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(board_id): ApiPath<BoardId>,
    ApiJson(request): ApiJson<CreateSprintRequest>,
) -> Result<(StatusCode, Json<Sprint>), ApiError> {
    let sprint = state
        .service
        .create_sprint(&principal, board_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(sprint)))
}

/// GET /api/boards/{board_id}/sprints
pub async fn list_sprints(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(board_id): ApiPath<BoardId>,
) -> Result<Json<Vec<Sprint>>, ApiError> {
    let sprints = state.service.list_sprints(&principal, board_id).await?;
    Ok(Json(sprints))
}

/// GET /api/boards/sprints/{sprint_id}
pub async fn get_sprint(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(sprint_id): ApiPath<SprintId>,
) -> Result<Json<SprintWithTasks>, ApiError> {
    let sprint = state.service.get_sprint(&principal, sprint_id).await?;
    Ok(Json(sprint))
}

/// POST /api/boards/sprints/{sprint_id}/tasks
pub async fn add_tasks(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(sprint_id): ApiPath<SprintId>,
    ApiJson(request): ApiJson<AddSprintTasksRequest>,
) -> Result<Json<SprintWithTasks>, ApiError> {
    let sprint = state
        .service
        .add_tasks_to_sprint(&principal, sprint_id, request)
        .await?;
    Ok(Json(sprint))
}

/// DELETE /api/boards/sprints/{sprint_id}/tasks/{task_id}
pub async fn remove_task(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath((sprint_id, task_id)): ApiPath<(SprintId, TaskId)>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .remove_task_from_sprint(&principal, sprint_id, task_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_sprint(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(sprint_id): ApiPath<SprintId>,
) -> Result<Json<Sprint>, ApiError> {
    Ok(Json(state.service.start_sprint(&principal, sprint_id).await?))
}

pub async fn complete_sprint(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(sprint_id): ApiPath<SprintId>,
) -> Result<Json<Sprint>, ApiError> {
    Ok(Json(
        state.service.complete_sprint(&principal, sprint_id).await?,
    ))
}

pub async fn cancel_sprint(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(sprint_id): ApiPath<SprintId>,
) -> Result<Json<Sprint>, ApiError> {
    Ok(Json(state.service.cancel_sprint(&principal, sprint_id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{board_id}/sprints", get(list_sprints).post(create_sprint))
        .route("/sprints/{sprint_id}", get(get_sprint))
        .route("/sprints/{sprint_id}/tasks", post(add_tasks))
        .route("/sprints/{sprint_id}/tasks/{task_id}", delete(remove_task))
        .route("/sprints/{sprint_id}/start", post(start_sprint))
        .route("/sprints/{sprint_id}/complete", post(complete_sprint))
        .route("/sprints/{sprint_id}/cancel", post(cancel_sprint))
}
