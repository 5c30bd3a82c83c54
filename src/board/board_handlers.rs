use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::stream::Stream;
use serde::Deserialize;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, Result},
    state::AppState,
};

use super::{
    board_dto::{CreateColumnRequest, CreateTaskRequest, MoveTaskRequest, UpdateTaskRequest},
    board_engine::MoveOutcome,
    board_models::{BoardColumn, BoardTask, BoardView},
};

#[derive(Deserialize)]
pub struct BoardQuery {
    owner_id: Uuid,
}

/// Get the owner's board, creating it with default columns on first access
#[utoipa::path(
    get,
    path = "/api/board",
    params(
        ("owner_id" = Uuid, Query, description = "Board owner")
    ),
    responses(
        (status = 200, description = "Board with ordered columns and tasks", body = BoardView),
        (status = 500, description = "Bootstrap failed")
    ),
    tag = "board"
)]
pub async fn get_board(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<BoardView>> {
    let view = state.engine.load_board(query.owner_id).await?;
    Ok(Json(view))
}

/// Move a task to a new column/index
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/move",
    params(
        ("id" = Uuid, Path, description = "Task to move")
    ),
    request_body = MoveTaskRequest,
    responses(
        (status = 200, description = "Renumbered source and destination columns", body = MoveOutcome),
        (status = 400, description = "Index out of range"),
        (status = 404, description = "Task or column not found"),
        (status = 409, description = "Board was modified concurrently; reload and retry")
    ),
    tag = "tasks"
)]
pub async fn move_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<MoveTaskRequest>,
) -> Result<Json<MoveOutcome>> {
    let outcome = state
        .engine
        .move_task(task_id, payload.column_id, payload.index)
        .await?;

    // Broadcast the committed move to board event streams
    let _ = state.board_tx.send(outcome.clone());

    Ok(Json(outcome))
}

/// Create a task at the end of a column
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = BoardTask),
        (status = 400, description = "Invalid hierarchy or validation error"),
        (status = 404, description = "Column or parent task not found")
    ),
    tag = "tasks"
)]
pub async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let task = state.engine.create_task(payload).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

// ... (update_task)
pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<BoardTask>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let task = state.engine.update_task(task_id, payload).await?;
    Ok(Json(task))
}

// ... (create_column)
pub async fn create_column(
    State(state): State<AppState>,
    Json(payload): Json<CreateColumnRequest>,
) -> Result<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let column: BoardColumn = state
        .engine
        .create_column(payload.board_id, &payload.title)
        .await?;

    Ok((StatusCode::CREATED, Json(column)))
}

/// Real-time stream of committed moves for one board (SSE)
#[utoipa::path(
    get,
    path = "/api/board/{id}/events",
    params(
        ("id" = Uuid, Path, description = "Board to watch")
    ),
    responses(
        (status = 200, description = "Move event stream established")
    ),
    tag = "board"
)]
pub async fn board_events(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Sse<impl Stream<Item = std::result::Result<Event, std::convert::Infallible>>> {
    let rx = state.board_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(outcome) if outcome.board_id == board_id => {
            let json = serde_json::to_string(&outcome).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
