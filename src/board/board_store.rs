use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, Result},
};

use super::board_models::{Board, BoardColumn, BoardTask, ColumnWithTasks, TaskKind, TaskMove};

#[derive(Debug, Clone)]
pub struct NewColumn {
    pub title: String,
    pub position: i32,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub column_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub position: i32,
    pub parent_task_id: Option<Uuid>,
    pub kind: TaskKind,
}

/// Persistence collaborator for the board engine. Storage-agnostic so the
/// engine can be exercised against an in-memory store in tests.
#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn board_by_owner(&self, owner_id: Uuid) -> Result<Option<Board>>;

    async fn board_by_id(&self, board_id: Uuid) -> Result<Option<Board>>;

    async fn create_board(&self, owner_id: Uuid, title: &str) -> Result<Board>;

    async fn create_columns(&self, board_id: Uuid, columns: &[NewColumn])
        -> Result<Vec<BoardColumn>>;

    /// Columns ordered by position, each with its tasks ordered by position.
    async fn columns_with_tasks(&self, board_id: Uuid) -> Result<Vec<ColumnWithTasks>>;

    async fn column_by_id(&self, column_id: Uuid) -> Result<Option<BoardColumn>>;

    async fn task_by_id(&self, task_id: Uuid) -> Result<Option<BoardTask>>;

    async fn insert_task(&self, task: &NewTask) -> Result<BoardTask>;

    async fn update_task(
        &self,
        task_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<BoardTask>>;

    /// Writes one batch of position/column updates atomically, keyed on the
    /// board version. Fails with `ConcurrentModification` when
    /// `expected_version` no longer matches; nothing is written in that case.
    /// Returns the new board version.
    async fn apply_task_moves(
        &self,
        board_id: Uuid,
        expected_version: i64,
        moves: &[TaskMove],
    ) -> Result<i64>;
}

#[derive(Clone)]
pub struct PgBoardStore {
    pool: DbPool,
    timeout: Duration,
}

impl PgBoardStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Caps every database call; an elapsed timeout surfaces as
    /// `PersistenceTimeout` instead of hanging the request.
    async fn timed<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(AppError::PersistenceTimeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl BoardStore for PgBoardStore {
    async fn board_by_owner(&self, owner_id: Uuid) -> Result<Option<Board>> {
        self.timed(async {
            let board =
                sqlx::query_as::<_, Board>("SELECT * FROM kanban_boards WHERE owner_id = $1")
                    .bind(owner_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(board)
        })
        .await
    }

    async fn board_by_id(&self, board_id: Uuid) -> Result<Option<Board>> {
        self.timed(async {
            let board = sqlx::query_as::<_, Board>("SELECT * FROM kanban_boards WHERE id = $1")
                .bind(board_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(board)
        })
        .await
    }

    async fn create_board(&self, owner_id: Uuid, title: &str) -> Result<Board> {
        self.timed(async {
            let board = sqlx::query_as::<_, Board>(
                "INSERT INTO kanban_boards (owner_id, title) VALUES ($1, $2) RETURNING *",
            )
            .bind(owner_id)
            .bind(title)
            .fetch_one(&self.pool)
            .await?;
            Ok(board)
        })
        .await
    }

    async fn create_columns(
        &self,
        board_id: Uuid,
        columns: &[NewColumn],
    ) -> Result<Vec<BoardColumn>> {
        self.timed(async {
            let mut tx = self.pool.begin().await?;
            let mut created = Vec::with_capacity(columns.len());
            for col in columns {
                let row = sqlx::query_as::<_, BoardColumn>(
                    "INSERT INTO kanban_columns (board_id, title, position)
                     VALUES ($1, $2, $3)
                     RETURNING *",
                )
                .bind(board_id)
                .bind(&col.title)
                .bind(col.position)
                .fetch_one(&mut *tx)
                .await?;
                created.push(row);
            }
            tx.commit().await?;
            Ok(created)
        })
        .await
    }

    async fn columns_with_tasks(&self, board_id: Uuid) -> Result<Vec<ColumnWithTasks>> {
        self.timed(async {
            let columns = sqlx::query_as::<_, BoardColumn>(
                "SELECT * FROM kanban_columns WHERE board_id = $1 ORDER BY position ASC",
            )
            .bind(board_id)
            .fetch_all(&self.pool)
            .await?;

            let column_ids: Vec<Uuid> = columns.iter().map(|c| c.id).collect();
            let tasks = sqlx::query_as::<_, BoardTask>(
                "SELECT * FROM kanban_tasks WHERE column_id = ANY($1) ORDER BY position ASC",
            )
            .bind(&column_ids)
            .fetch_all(&self.pool)
            .await?;

            let mut out: Vec<ColumnWithTasks> = columns
                .into_iter()
                .map(|column| ColumnWithTasks {
                    column,
                    tasks: Vec::new(),
                })
                .collect();
            for task in tasks {
                if let Some(cw) = out.iter_mut().find(|cw| cw.column.id == task.column_id) {
                    cw.tasks.push(task);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn column_by_id(&self, column_id: Uuid) -> Result<Option<BoardColumn>> {
        self.timed(async {
            let column =
                sqlx::query_as::<_, BoardColumn>("SELECT * FROM kanban_columns WHERE id = $1")
                    .bind(column_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(column)
        })
        .await
    }

    async fn task_by_id(&self, task_id: Uuid) -> Result<Option<BoardTask>> {
        self.timed(async {
            let task = sqlx::query_as::<_, BoardTask>("SELECT * FROM kanban_tasks WHERE id = $1")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(task)
        })
        .await
    }

    async fn insert_task(&self, task: &NewTask) -> Result<BoardTask> {
        self.timed(async {
            let row = sqlx::query_as::<_, BoardTask>(
                "INSERT INTO kanban_tasks (column_id, title, description, position, parent_task_id, kind)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING *",
            )
            .bind(task.column_id)
            .bind(&task.title)
            .bind(task.description.as_deref())
            .bind(task.position)
            .bind(task.parent_task_id)
            .bind(task.kind)
            .fetch_one(&self.pool)
            .await?;
            Ok(row)
        })
        .await
    }

    async fn update_task(
        &self,
        task_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<BoardTask>> {
        self.timed(async {
            let task = sqlx::query_as::<_, BoardTask>(
                "UPDATE kanban_tasks SET
                    title = COALESCE($1, title),
                    description = COALESCE($2, description),
                    updated_at = NOW()
                 WHERE id = $3
                 RETURNING *",
            )
            .bind(title)
            .bind(description)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(task)
        })
        .await
    }

    async fn apply_task_moves(
        &self,
        board_id: Uuid,
        expected_version: i64,
        moves: &[TaskMove],
    ) -> Result<i64> {
        self.timed(async {
            let mut tx = self.pool.begin().await?;

            // Version bump doubles as the compare-and-swap: zero rows
            // affected means someone else committed first.
            let bumped = sqlx::query(
                "UPDATE kanban_boards SET version = version + 1, updated_at = NOW()
                 WHERE id = $1 AND version = $2",
            )
            .bind(board_id)
            .bind(expected_version)
            .execute(&mut *tx)
            .await?;

            if bumped.rows_affected() == 0 {
                return Err(AppError::ConcurrentModification(board_id));
            }

            for mv in moves {
                sqlx::query(
                    "UPDATE kanban_tasks SET column_id = $1, position = $2, updated_at = NOW()
                     WHERE id = $3",
                )
                .bind(mv.column_id)
                .bind(mv.position)
                .bind(mv.task_id)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(expected_version + 1)
        })
        .await
    }
}
