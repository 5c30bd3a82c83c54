use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Hierarchy level of a task. A task may only nest under a task whose
/// kind sits strictly above its own: epic > task > subtask.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema, Default,
)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Epic,
    #[default]
    Task,
    Subtask,
}

impl TaskKind {
    fn depth(self) -> u8 {
        match self {
            TaskKind::Epic => 0,
            TaskKind::Task => 1,
            TaskKind::Subtask => 2,
        }
    }

    /// Whether a task of this kind may be the parent of `child`.
    pub fn may_parent(self, child: TaskKind) -> bool {
        self.depth() < child.depth()
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Epic => write!(f, "epic"),
            TaskKind::Task => write!(f, "task"),
            TaskKind::Subtask => write!(f, "subtask"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Board {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    /// Bumped on every committed batch of task moves; optimistic
    /// concurrency token for `apply_task_moves`.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BoardColumn {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    /// Zero-based, dense, unique within the board.
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BoardTask {
    pub id: Uuid,
    pub column_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Zero-based, dense, unique within the column.
    pub position: i32,
    pub parent_task_id: Option<Uuid>,
    pub kind: TaskKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A column with its tasks ordered ascending by position.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ColumnWithTasks {
    pub column: BoardColumn,
    pub tasks: Vec<BoardTask>,
}

/// The fully loaded board returned by the engine.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoardView {
    pub board: Board,
    pub columns: Vec<ColumnWithTasks>,
}

/// One row of the batch written after a move: the new column and
/// position of a task whose placement changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskMove {
    pub task_id: Uuid,
    pub column_id: Uuid,
    pub position: i32,
}
