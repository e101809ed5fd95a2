use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use projecthub_domain::{
    Board, BoardId, BoardTaskRow, BoardView, Column, ColumnId, CreateBoardRequest,
    CreateColumnRequest, CreateTaskRequest, MoveTaskRequest, ReorderColumnRequest, Task,
};

use crate::{
    auth::CurrentUser,
    error::ApiError,
    extract::{ApiJson, ApiPath},
    state::AppState,
};

/// POST /api/boards
pub async fn create_board(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiJson(request): ApiJson<CreateBoardRequest>,
) -> Result<(StatusCode, Json<Board>), ApiError> {
    let board = state.service.create_board(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(board)))
}

/// GET /api/boards/{board_id}
pub async fn get_board(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(board_id): ApiPath<BoardId>,
) -> Result<Json<BoardView>, ApiError> {
    let view = state.service.get_board_view(&principal, board_id).await?;
    Ok(Json(view))
}

/// GET /api/boards/{board_id}/tasks
pub async fn list_board_tasks(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(board_id): ApiPath<BoardId>,
) -> Result<Json<Vec<BoardTaskRow>>, ApiError> {
    let rows = state.service.list_board_tasks(&principal, board_id).await?;
    Ok(Json(rows))
}

/// POST /api/boards/{board_id}/tasks
pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(board_id): ApiPath<BoardId>,
    ApiJson(request): ApiJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state
        .service
        .create_task(&principal, board_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// POST /api/boards/{board_id}/columns
pub async fn create_column(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(board_id): ApiPath<BoardId>,
    ApiJson(request): ApiJson<CreateColumnRequest>,
) -> Result<(StatusCode, Json<Column>), ApiError> {
    let column = state
        .service
        .create_column(&principal, board_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(column)))
}

/// PATCH /api/boards/tasks/position
pub async fn move_task(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiJson(request): ApiJson<MoveTaskRequest>,
) -> Result<StatusCode, ApiError> {
    state.service.move_task(&principal, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/boards/columns/{column_id}/reorder
pub async fn reorder_column(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(column_id): ApiPath<ColumnId>,
    ApiJson(request): ApiJson<ReorderColumnRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .reorder_column(&principal, column_id, request)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_board))
        .route("/{board_id}", get(get_board))
        .route("/{board_id}/tasks", get(list_board_tasks).post(create_task))
        .route("/{board_id}/columns", post(create_column))
        .route("/tasks/position", patch(move_task))
        .route("/columns/{column_id}/reorder", post(reorder_column))
}
