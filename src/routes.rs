use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    board::{self, board_handlers},
    state::AppState,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        board_handlers::get_board,
        board_handlers::move_task,
        board_handlers::create_task,
        board_handlers::board_events,
    ),
    components(
        schemas(
            board::Board,
            board::BoardColumn,
            board::BoardTask,
            board::BoardView,
            board::ColumnWithTasks,
            board::TaskKind,
            board::TaskMove,
            board::MoveOutcome,
            board::CreateTaskRequest,
            board::UpdateTaskRequest,
            board::MoveTaskRequest,
            board::CreateColumnRequest,
        )
    ),
    tags(
        (name = "board", description = "Board loading, columns and move events"),
        (name = "tasks", description = "Task creation, edits and moves")
    )
)]
struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let board_routes = Router::new()
        .route("/", get(board_handlers::get_board))
        .route("/columns", post(board_handlers::create_column))
        .route("/:id/events", get(board_handlers::board_events));

    let task_routes = Router::new()
        .route("/", post(board_handlers::create_task))
        .route("/:id", put(board_handlers::update_task))
        .route("/:id/move", post(board_handlers::move_task));

    let api_routes = Router::new()
        .nest("/board", board_routes)
        .nest("/tasks", task_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(state)
}
