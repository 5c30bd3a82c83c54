pub mod board_dto;
pub mod board_engine;
pub mod board_handlers;
pub mod board_models;
pub mod board_store;

pub use board_dto::{CreateColumnRequest, CreateTaskRequest, MoveTaskRequest, UpdateTaskRequest};
pub use board_engine::{validate, BoardEngine, InvariantViolation, MoveOutcome};
pub use board_handlers::{
    board_events, create_column, create_task, get_board, move_task, update_task,
};
pub use board_models::{Board, BoardColumn, BoardTask, BoardView, ColumnWithTasks, TaskKind, TaskMove};
pub use board_store::{BoardStore, PgBoardStore};
