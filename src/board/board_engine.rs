use std::collections::{HashMap, HashSet};

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};

use super::{
    board_dto::{CreateTaskRequest, UpdateTaskRequest},
    board_models::{BoardColumn, BoardTask, BoardView, ColumnWithTasks, TaskMove},
    board_store::{BoardStore, NewColumn, NewTask},
};

pub const DEFAULT_COLUMN_TITLES: [&str; 3] = ["To Do", "In Progress", "Done"];

/// The committed result of a move: the write batch plus the renumbered
/// source and destination columns (identical for an in-column reorder).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MoveOutcome {
    pub board_id: Uuid,
    pub version: i64,
    pub moves: Vec<TaskMove>,
    pub source: ColumnWithTasks,
    pub destination: ColumnWithTasks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    ColumnPositions {
        column_id: Uuid,
        expected: i32,
        found: i32,
    },
    TaskPositions {
        column_id: Uuid,
        task_id: Uuid,
        expected: i32,
        found: i32,
    },
    WrongColumn {
        task_id: Uuid,
    },
    MissingParent {
        task_id: Uuid,
        parent_task_id: Uuid,
    },
    HierarchyOrder {
        task_id: Uuid,
        parent_task_id: Uuid,
    },
    ParentCycle {
        task_id: Uuid,
    },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvariantViolation::ColumnPositions {
                column_id,
                expected,
                found,
            } => write!(
                f,
                "column {column_id} at position {found}, expected {expected}"
            ),
            InvariantViolation::TaskPositions {
                column_id,
                task_id,
                expected,
                found,
            } => write!(
                f,
                "task {task_id} in column {column_id} at position {found}, expected {expected}"
            ),
            InvariantViolation::WrongColumn { task_id } => {
                write!(f, "task {task_id} listed under a column it does not reference")
            }
            InvariantViolation::MissingParent {
                task_id,
                parent_task_id,
            } => write!(f, "task {task_id} references missing parent {parent_task_id}"),
            InvariantViolation::HierarchyOrder {
                task_id,
                parent_task_id,
            } => write!(
                f,
                "task {task_id} nested under {parent_task_id} of equal or lower kind"
            ),
            InvariantViolation::ParentCycle { task_id } => {
                write!(f, "task {task_id} is its own ancestor")
            }
        }
    }
}

/// Pure check of every board invariant: dense column and task positions,
/// tasks filed under the column they reference, and a well-formed
/// epic/task/subtask hierarchy. Returns the first violation found.
pub fn validate(view: &BoardView) -> std::result::Result<(), InvariantViolation> {
    validate_columns(&view.columns)
}

pub(crate) fn validate_columns(
    columns: &[ColumnWithTasks],
) -> std::result::Result<(), InvariantViolation> {
    for (idx, cw) in columns.iter().enumerate() {
        if cw.column.position != idx as i32 {
            return Err(InvariantViolation::ColumnPositions {
                column_id: cw.column.id,
                expected: idx as i32,
                found: cw.column.position,
            });
        }
        for (tidx, task) in cw.tasks.iter().enumerate() {
            if task.column_id != cw.column.id {
                return Err(InvariantViolation::WrongColumn { task_id: task.id });
            }
            if task.position != tidx as i32 {
                return Err(InvariantViolation::TaskPositions {
                    column_id: cw.column.id,
                    task_id: task.id,
                    expected: tidx as i32,
                    found: task.position,
                });
            }
        }
    }

    let tasks: HashMap<Uuid, &BoardTask> = columns
        .iter()
        .flat_map(|cw| cw.tasks.iter())
        .map(|t| (t.id, t))
        .collect();

    for task in tasks.values() {
        let Some(parent_id) = task.parent_task_id else {
            continue;
        };
        let Some(parent) = tasks.get(&parent_id) else {
            return Err(InvariantViolation::MissingParent {
                task_id: task.id,
                parent_task_id: parent_id,
            });
        };

        // Walk the ancestor chain before checking kinds, so a cycle is
        // reported as a cycle rather than as a kind mismatch.
        let mut seen = HashSet::from([task.id]);
        let mut current = parent_id;
        loop {
            if !seen.insert(current) {
                return Err(InvariantViolation::ParentCycle { task_id: task.id });
            }
            match tasks.get(&current).and_then(|t| t.parent_task_id) {
                Some(next) => current = next,
                None => break,
            }
        }

        if !parent.kind.may_parent(task.kind) {
            return Err(InvariantViolation::HierarchyOrder {
                task_id: task.id,
                parent_task_id: parent_id,
            });
        }
    }

    Ok(())
}

/// Computes the write batch for moving `task_id` to `dest_index` in
/// `dest_column_id`. Returns an empty batch when the move is a no-op.
/// Only tasks whose (column, position) actually changes appear in the
/// batch, so the persistence write stays minimal.
pub(crate) fn plan_move(
    columns: &[ColumnWithTasks],
    task_id: Uuid,
    dest_column_id: Uuid,
    dest_index: usize,
) -> Result<Vec<TaskMove>> {
    let (source_idx, task_pos) = columns
        .iter()
        .enumerate()
        .find_map(|(i, cw)| {
            cw.tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|p| (i, p))
        })
        .ok_or(AppError::TaskNotFound(task_id))?;

    let dest_idx = columns
        .iter()
        .position(|cw| cw.column.id == dest_column_id)
        .ok_or(AppError::ColumnNotFound(dest_column_id))?;

    let same_column = source_idx == dest_idx;
    // Within one column the task itself is pulled out first, so the
    // valid insertion range shrinks by one.
    let bound = if same_column {
        columns[dest_idx].tasks.len() - 1
    } else {
        columns[dest_idx].tasks.len()
    };
    if dest_index > bound {
        return Err(AppError::IndexOutOfRange {
            index: dest_index,
            len: bound,
        });
    }
    if same_column && dest_index == task_pos {
        return Ok(Vec::new());
    }

    let original: HashMap<Uuid, (Uuid, i32)> = columns
        .iter()
        .flat_map(|cw| cw.tasks.iter())
        .map(|t| (t.id, (t.column_id, t.position)))
        .collect();

    let mut moves = Vec::new();
    let mut source_ids: Vec<Uuid> = columns[source_idx].tasks.iter().map(|t| t.id).collect();
    source_ids.remove(task_pos);

    if same_column {
        source_ids.insert(dest_index, task_id);
        diff_column(columns[source_idx].column.id, &source_ids, &original, &mut moves);
    } else {
        let mut dest_ids: Vec<Uuid> = columns[dest_idx].tasks.iter().map(|t| t.id).collect();
        dest_ids.insert(dest_index, task_id);
        diff_column(columns[source_idx].column.id, &source_ids, &original, &mut moves);
        diff_column(columns[dest_idx].column.id, &dest_ids, &original, &mut moves);
    }

    Ok(moves)
}

fn diff_column(
    column_id: Uuid,
    ordered_ids: &[Uuid],
    original: &HashMap<Uuid, (Uuid, i32)>,
    moves: &mut Vec<TaskMove>,
) {
    for (idx, id) in ordered_ids.iter().enumerate() {
        let position = idx as i32;
        if original.get(id) != Some(&(column_id, position)) {
            moves.push(TaskMove {
                task_id: *id,
                column_id,
                position,
            });
        }
    }
}

/// Board ordering engine: owns one board's column/task order and the
/// transformation applied on a move. Generic over the persistence
/// collaborator so tests run against an in-memory store.
#[derive(Clone)]
pub struct BoardEngine<S> {
    store: S,
    default_board_title: String,
}

impl<S: BoardStore> BoardEngine<S> {
    pub fn new(store: S, default_board_title: String) -> Self {
        Self {
            store,
            default_board_title,
        }
    }

    /// Fetches the owner's board, bootstrapping it on first access. A board
    /// that exists with zero columns is an interrupted bootstrap and gets
    /// its default columns recreated here, so the repair is idempotent.
    pub async fn load_board(&self, owner_id: Uuid) -> Result<BoardView> {
        let board = match self.store.board_by_owner(owner_id).await? {
            Some(board) => board,
            None => {
                tracing::info!(%owner_id, "no board for owner, bootstrapping");
                self.store
                    .create_board(owner_id, &self.default_board_title)
                    .await
                    .map_err(|e| AppError::BootstrapFailed(e.to_string()))?
            }
        };

        let mut columns = self.store.columns_with_tasks(board.id).await?;
        if columns.is_empty() {
            let defaults: Vec<NewColumn> = DEFAULT_COLUMN_TITLES
                .iter()
                .enumerate()
                .map(|(idx, title)| NewColumn {
                    title: (*title).to_string(),
                    position: idx as i32,
                })
                .collect();
            let created = self
                .store
                .create_columns(board.id, &defaults)
                .await
                .map_err(|e| AppError::BootstrapFailed(e.to_string()))?;
            columns = created
                .into_iter()
                .map(|column| ColumnWithTasks {
                    column,
                    tasks: Vec::new(),
                })
                .collect();
        }

        let view = BoardView { board, columns };
        if let Err(violation) = validate(&view) {
            return Err(AppError::Invariant(violation));
        }
        Ok(view)
    }

    /// Moves a task to `dest_index` in `dest_column_id`, renumbering both
    /// affected columns so positions stay dense. The whole batch commits
    /// against the board version or not at all.
    pub async fn move_task(
        &self,
        task_id: Uuid,
        dest_column_id: Uuid,
        dest_index: usize,
    ) -> Result<MoveOutcome> {
        let task = self
            .store
            .task_by_id(task_id)
            .await?
            .ok_or(AppError::TaskNotFound(task_id))?;
        let source_column = self
            .store
            .column_by_id(task.column_id)
            .await?
            .ok_or(AppError::ColumnNotFound(task.column_id))?;
        // Destination must belong to the same board as the source.
        let dest_on_board = self
            .store
            .column_by_id(dest_column_id)
            .await?
            .is_some_and(|c| c.board_id == source_column.board_id);
        if !dest_on_board {
            return Err(AppError::ColumnNotFound(dest_column_id));
        }
        let board = self
            .store
            .board_by_id(source_column.board_id)
            .await?
            .ok_or(AppError::Database(sqlx::Error::RowNotFound))?;

        let columns = self.store.columns_with_tasks(board.id).await?;
        let moves = plan_move(&columns, task_id, dest_column_id, dest_index)?;

        if moves.is_empty() {
            let source = find_column(&columns, source_column.id)?;
            return Ok(MoveOutcome {
                board_id: board.id,
                version: board.version,
                moves,
                destination: source.clone(),
                source,
            });
        }

        let version = self
            .store
            .apply_task_moves(board.id, board.version, &moves)
            .await?;
        tracing::debug!(
            board_id = %board.id,
            task_id = %task_id,
            updates = moves.len(),
            version,
            "task move committed"
        );

        let columns = self.store.columns_with_tasks(board.id).await?;
        if let Err(violation) = validate_columns(&columns) {
            return Err(AppError::Invariant(violation));
        }

        Ok(MoveOutcome {
            board_id: board.id,
            version,
            moves,
            source: find_column(&columns, source_column.id)?,
            destination: find_column(&columns, dest_column_id)?,
        })
    }

    /// Creates a task at the end of its column. The epic/task/subtask
    /// hierarchy is enforced here, at the write boundary.
    pub async fn create_task(&self, payload: CreateTaskRequest) -> Result<BoardTask> {
        let column = self
            .store
            .column_by_id(payload.column_id)
            .await?
            .ok_or(AppError::ColumnNotFound(payload.column_id))?;
        let kind = payload.kind.unwrap_or_default();

        if let Some(parent_id) = payload.parent_task_id {
            let parent = self
                .store
                .task_by_id(parent_id)
                .await?
                .ok_or(AppError::TaskNotFound(parent_id))?;
            let parent_column = self
                .store
                .column_by_id(parent.column_id)
                .await?
                .ok_or(AppError::ColumnNotFound(parent.column_id))?;
            if parent_column.board_id != column.board_id {
                return Err(AppError::TaskNotFound(parent_id));
            }
            if !parent.kind.may_parent(kind) {
                return Err(AppError::InvalidHierarchy(format!(
                    "a {kind} may not nest under a {}",
                    parent.kind
                )));
            }
        }

        let columns = self.store.columns_with_tasks(column.board_id).await?;
        let count = columns
            .iter()
            .find(|cw| cw.column.id == column.id)
            .map(|cw| cw.tasks.len())
            .unwrap_or(0);

        self.store
            .insert_task(&NewTask {
                column_id: column.id,
                title: payload.title,
                description: payload.description,
                position: count as i32,
                parent_task_id: payload.parent_task_id,
                kind,
            })
            .await
    }

    pub async fn update_task(
        &self,
        task_id: Uuid,
        payload: UpdateTaskRequest,
    ) -> Result<BoardTask> {
        self.store
            .update_task(
                task_id,
                payload.title.as_deref(),
                payload.description.as_deref(),
            )
            .await?
            .ok_or(AppError::TaskNotFound(task_id))
    }

    /// Appends a column at the end of the board.
    pub async fn create_column(&self, board_id: Uuid, title: &str) -> Result<BoardColumn> {
        let board = self
            .store
            .board_by_id(board_id)
            .await?
            .ok_or(AppError::BoardNotFound(board_id))?;
        let columns = self.store.columns_with_tasks(board.id).await?;
        let mut created = self
            .store
            .create_columns(
                board.id,
                &[NewColumn {
                    title: title.to_string(),
                    position: columns.len() as i32,
                }],
            )
            .await?;
        created.pop().ok_or(AppError::Database(sqlx::Error::RowNotFound))
    }
}

fn find_column(columns: &[ColumnWithTasks], column_id: Uuid) -> Result<ColumnWithTasks> {
    columns
        .iter()
        .find(|cw| cw.column.id == column_id)
        .cloned()
        .ok_or(AppError::ColumnNotFound(column_id))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::board::{
        board_models::{Board, TaskKind},
        board_store::memory::MemoryBoardStore,
    };

    fn engine() -> BoardEngine<MemoryBoardStore> {
        BoardEngine::new(MemoryBoardStore::new(), "My Board".to_string())
    }

    fn create_req(column_id: Uuid, title: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            column_id,
            title: title.to_string(),
            description: None,
            kind: None,
            parent_task_id: None,
        }
    }

    async fn seed_tasks(
        engine: &BoardEngine<MemoryBoardStore>,
        column_id: Uuid,
        count: usize,
    ) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for i in 0..count {
            let task = engine
                .create_task(create_req(column_id, &format!("task {i}")))
                .await
                .unwrap();
            ids.push(task.id);
        }
        ids
    }

    fn positions(view: &BoardView, column_id: Uuid) -> Vec<(Uuid, i32)> {
        view.columns
            .iter()
            .find(|cw| cw.column.id == column_id)
            .unwrap()
            .tasks
            .iter()
            .map(|t| (t.id, t.position))
            .collect()
    }

    #[tokio::test]
    async fn load_board_bootstraps_default_columns() {
        let engine = engine();
        let owner = Uuid::new_v4();

        let view = engine.load_board(owner).await.unwrap();

        assert_eq!(view.board.owner_id, owner);
        assert_eq!(view.columns.len(), 3);
        let titles: Vec<&str> = view
            .columns
            .iter()
            .map(|cw| cw.column.title.as_str())
            .collect();
        assert_eq!(titles, ["To Do", "In Progress", "Done"]);
        for (idx, cw) in view.columns.iter().enumerate() {
            assert_eq!(cw.column.position, idx as i32);
            assert!(cw.tasks.is_empty());
        }
        assert!(validate(&view).is_ok());
    }

    #[tokio::test]
    async fn load_board_is_idempotent() {
        let engine = engine();
        let owner = Uuid::new_v4();

        let first = engine.load_board(owner).await.unwrap();
        let second = engine.load_board(owner).await.unwrap();

        assert_eq!(first.board.id, second.board.id);
        assert_eq!(second.columns.len(), 3);
    }

    #[tokio::test]
    async fn interrupted_bootstrap_is_repaired_on_next_load() {
        let store = MemoryBoardStore::new();
        let engine = BoardEngine::new(store.clone(), "My Board".to_string());
        let owner = Uuid::new_v4();

        store.fail_next_create_columns();
        let err = engine.load_board(owner).await.unwrap_err();
        assert!(matches!(err, AppError::BootstrapFailed(_)));

        // Board row exists but has no columns; the next load repairs it
        // instead of duplicating anything.
        let view = engine.load_board(owner).await.unwrap();
        assert_eq!(view.columns.len(), 3);
        assert!(validate(&view).is_ok());
    }

    #[tokio::test]
    async fn noop_move_returns_unchanged_state() {
        let engine = engine();
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();
        let col = view.columns[0].column.id;
        let ids = seed_tasks(&engine, col, 3).await;

        let before = engine.load_board(view.board.owner_id).await.unwrap();
        let outcome = engine.move_task(ids[1], col, 1).await.unwrap();

        assert!(outcome.moves.is_empty());
        assert_eq!(outcome.version, before.board.version);
        let after = engine.load_board(view.board.owner_id).await.unwrap();
        assert_eq!(positions(&before, col), positions(&after, col));
    }

    #[tokio::test]
    async fn same_column_reorder_yields_exact_positions() {
        let engine = engine();
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();
        let col = view.columns[0].column.id;
        // tasks t0..t3 at positions 0..3
        let ids = seed_tasks(&engine, col, 4).await;

        // Move t2 to index 0: order becomes [t2, t0, t1, t3].
        let outcome = engine.move_task(ids[2], col, 0).await.unwrap();

        let expected = vec![
            (ids[2], 0),
            (ids[0], 1),
            (ids[1], 2),
            (ids[3], 3),
        ];
        let got: Vec<(Uuid, i32)> = outcome
            .destination
            .tasks
            .iter()
            .map(|t| (t.id, t.position))
            .collect();
        assert_eq!(got, expected);

        // t3 ends where it started, so the write batch must not touch it.
        assert_eq!(outcome.moves.len(), 3);
        assert!(outcome.moves.iter().all(|m| m.task_id != ids[3]));

        let after = engine.load_board(view.board.owner_id).await.unwrap();
        assert!(validate(&after).is_ok());
    }

    #[tokio::test]
    async fn cross_column_move_renumbers_both_columns() {
        let engine = engine();
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();
        let (col_a, col_b) = (view.columns[0].column.id, view.columns[1].column.id);
        let a = seed_tasks(&engine, col_a, 3).await;
        let b = seed_tasks(&engine, col_b, 2).await;

        let outcome = engine.move_task(a[1], col_b, 1).await.unwrap();

        let source: Vec<(Uuid, i32)> = outcome
            .source
            .tasks
            .iter()
            .map(|t| (t.id, t.position))
            .collect();
        assert_eq!(source, vec![(a[0], 0), (a[2], 1)]);

        let dest: Vec<(Uuid, i32)> = outcome
            .destination
            .tasks
            .iter()
            .map(|t| (t.id, t.position))
            .collect();
        assert_eq!(dest, vec![(b[0], 0), (a[1], 1), (b[1], 2)]);

        let moved = outcome
            .moves
            .iter()
            .find(|m| m.task_id == a[1])
            .unwrap();
        assert_eq!(moved.column_id, col_b);
        assert_eq!(moved.position, 1);

        let after = engine.load_board(view.board.owner_id).await.unwrap();
        assert!(validate(&after).is_ok());
    }

    #[tokio::test]
    async fn cross_column_move_to_end_is_allowed() {
        let engine = engine();
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();
        let (col_a, col_b) = (view.columns[0].column.id, view.columns[1].column.id);
        let a = seed_tasks(&engine, col_a, 1).await;
        seed_tasks(&engine, col_b, 2).await;

        // index == destination count appends at the end
        let outcome = engine.move_task(a[0], col_b, 2).await.unwrap();
        assert_eq!(outcome.destination.tasks.last().unwrap().id, a[0]);
        assert_eq!(outcome.destination.tasks.last().unwrap().position, 2);
    }

    #[tokio::test]
    async fn out_of_range_index_leaves_columns_unchanged() {
        let engine = engine();
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();
        let (col_a, col_b) = (view.columns[0].column.id, view.columns[1].column.id);
        let a = seed_tasks(&engine, col_a, 3).await;
        seed_tasks(&engine, col_b, 2).await;

        let before = engine.load_board(view.board.owner_id).await.unwrap();

        let err = engine.move_task(a[0], col_b, 3).await.unwrap_err();
        assert!(matches!(err, AppError::IndexOutOfRange { index: 3, len: 2 }));

        // Within one column the bound excludes the task being moved.
        let err = engine.move_task(a[0], col_a, 3).await.unwrap_err();
        assert!(matches!(err, AppError::IndexOutOfRange { index: 3, len: 2 }));

        let after = engine.load_board(view.board.owner_id).await.unwrap();
        assert_eq!(positions(&before, col_a), positions(&after, col_a));
        assert_eq!(positions(&before, col_b), positions(&after, col_b));
        assert_eq!(before.board.version, after.board.version);
    }

    #[tokio::test]
    async fn stale_version_is_rejected_with_one_move_applied() {
        let store = MemoryBoardStore::new();
        let engine = BoardEngine::new(store.clone(), "My Board".to_string());
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();
        let (col_a, col_b) = (view.columns[0].column.id, view.columns[1].column.id);
        let a = seed_tasks(&engine, col_a, 2).await;

        let snapshot = engine.load_board(view.board.owner_id).await.unwrap();

        // First writer commits and bumps the version.
        engine.move_task(a[0], col_b, 0).await.unwrap();

        // Second writer computed its batch against the stale snapshot.
        let stale = vec![TaskMove {
            task_id: a[1],
            column_id: col_b,
            position: 0,
        }];
        let err = store
            .apply_task_moves(snapshot.board.id, snapshot.board.version, &stale)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConcurrentModification(_)));

        // Exactly the first move is visible and the board is still valid.
        let after = engine.load_board(view.board.owner_id).await.unwrap();
        assert!(validate(&after).is_ok());
        assert_eq!(positions(&after, col_a), vec![(a[1], 0)]);
        assert_eq!(positions(&after, col_b), vec![(a[0], 0)]);
    }

    #[tokio::test]
    async fn move_rejects_unknown_task_and_foreign_column() {
        let engine = engine();
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();
        let col = view.columns[0].column.id;
        let ids = seed_tasks(&engine, col, 1).await;

        let err = engine.move_task(Uuid::new_v4(), col, 0).await.unwrap_err();
        assert!(matches!(err, AppError::TaskNotFound(_)));

        // A column on some other owner's board is not a valid destination.
        let other = engine.load_board(Uuid::new_v4()).await.unwrap();
        let foreign_col = other.columns[0].column.id;
        let err = engine.move_task(ids[0], foreign_col, 0).await.unwrap_err();
        assert!(matches!(err, AppError::ColumnNotFound(_)));
    }

    #[tokio::test]
    async fn create_task_appends_at_end() {
        let engine = engine();
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();
        let col = view.columns[0].column.id;

        let ids = seed_tasks(&engine, col, 3).await;

        let after = engine.load_board(view.board.owner_id).await.unwrap();
        assert_eq!(
            positions(&after, col),
            vec![(ids[0], 0), (ids[1], 1), (ids[2], 2)]
        );
    }

    #[tokio::test]
    async fn create_task_enforces_hierarchy() {
        let engine = engine();
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();
        let col = view.columns[0].column.id;

        let epic = engine
            .create_task(CreateTaskRequest {
                kind: Some(TaskKind::Epic),
                ..create_req(col, "epic")
            })
            .await
            .unwrap();

        // epic -> task and epic -> subtask are both fine
        let task = engine
            .create_task(CreateTaskRequest {
                kind: Some(TaskKind::Task),
                parent_task_id: Some(epic.id),
                ..create_req(col, "child task")
            })
            .await
            .unwrap();
        engine
            .create_task(CreateTaskRequest {
                kind: Some(TaskKind::Subtask),
                parent_task_id: Some(epic.id),
                ..create_req(col, "child subtask")
            })
            .await
            .unwrap();

        // task -> task is not
        let err = engine
            .create_task(CreateTaskRequest {
                kind: Some(TaskKind::Task),
                parent_task_id: Some(task.id),
                ..create_req(col, "sibling")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidHierarchy(_)));

        // subtask -> epic certainly is not
        let subtask = engine
            .create_task(CreateTaskRequest {
                kind: Some(TaskKind::Subtask),
                parent_task_id: Some(task.id),
                ..create_req(col, "leaf")
            })
            .await
            .unwrap();
        let err = engine
            .create_task(CreateTaskRequest {
                kind: Some(TaskKind::Epic),
                parent_task_id: Some(subtask.id),
                ..create_req(col, "upside down")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidHierarchy(_)));

        // unknown parent
        let err = engine
            .create_task(CreateTaskRequest {
                parent_task_id: Some(Uuid::new_v4()),
                ..create_req(col, "orphan")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn create_column_appends_after_defaults() {
        let engine = engine();
        let view = engine.load_board(Uuid::new_v4()).await.unwrap();

        let column = engine
            .create_column(view.board.id, "Blocked")
            .await
            .unwrap();
        assert_eq!(column.position, 3);

        let after = engine.load_board(view.board.owner_id).await.unwrap();
        assert_eq!(after.columns.len(), 4);
        assert!(validate(&after).is_ok());
    }

    // validate() unit tests against hand-built views

    fn mk_column(board_id: Uuid, position: i32) -> BoardColumn {
        let now = Utc::now();
        BoardColumn {
            id: Uuid::new_v4(),
            board_id,
            title: format!("col {position}"),
            position,
            created_at: now,
            updated_at: now,
        }
    }

    fn mk_task(
        column_id: Uuid,
        position: i32,
        kind: TaskKind,
        parent_task_id: Option<Uuid>,
    ) -> BoardTask {
        let now = Utc::now();
        BoardTask {
            id: Uuid::new_v4(),
            column_id,
            title: format!("task {position}"),
            description: None,
            position,
            parent_task_id,
            kind,
            created_at: now,
            updated_at: now,
        }
    }

    fn mk_view(columns: Vec<ColumnWithTasks>) -> BoardView {
        let now = Utc::now();
        BoardView {
            board: Board {
                id: columns
                    .first()
                    .map(|cw| cw.column.board_id)
                    .unwrap_or_else(Uuid::new_v4),
                owner_id: Uuid::new_v4(),
                title: "board".to_string(),
                version: 0,
                created_at: now,
                updated_at: now,
            },
            columns,
        }
    }

    #[test]
    fn validate_detects_task_position_gap() {
        let board_id = Uuid::new_v4();
        let column = mk_column(board_id, 0);
        let tasks = vec![
            mk_task(column.id, 0, TaskKind::Task, None),
            mk_task(column.id, 2, TaskKind::Task, None),
        ];
        let view = mk_view(vec![ColumnWithTasks { column, tasks }]);

        assert!(matches!(
            validate(&view),
            Err(InvariantViolation::TaskPositions { found: 2, .. })
        ));
    }

    #[test]
    fn validate_detects_column_position_gap() {
        let board_id = Uuid::new_v4();
        let view = mk_view(vec![
            ColumnWithTasks {
                column: mk_column(board_id, 0),
                tasks: vec![],
            },
            ColumnWithTasks {
                column: mk_column(board_id, 2),
                tasks: vec![],
            },
        ]);

        assert!(matches!(
            validate(&view),
            Err(InvariantViolation::ColumnPositions { found: 2, .. })
        ));
    }

    #[test]
    fn validate_detects_self_parent_cycle() {
        let board_id = Uuid::new_v4();
        let column = mk_column(board_id, 0);
        let mut task = mk_task(column.id, 0, TaskKind::Task, None);
        task.parent_task_id = Some(task.id);
        let view = mk_view(vec![ColumnWithTasks {
            column,
            tasks: vec![task],
        }]);

        assert!(matches!(
            validate(&view),
            Err(InvariantViolation::ParentCycle { .. })
        ));
    }

    #[test]
    fn validate_detects_kind_order_violation() {
        let board_id = Uuid::new_v4();
        let column = mk_column(board_id, 0);
        let parent = mk_task(column.id, 0, TaskKind::Subtask, None);
        let child = mk_task(column.id, 1, TaskKind::Epic, Some(parent.id));
        let view = mk_view(vec![ColumnWithTasks {
            column,
            tasks: vec![parent, child],
        }]);

        assert!(matches!(
            validate(&view),
            Err(InvariantViolation::HierarchyOrder { .. })
        ));
    }

    #[test]
    fn validate_detects_missing_parent() {
        let board_id = Uuid::new_v4();
        let column = mk_column(board_id, 0);
        let task = mk_task(column.id, 0, TaskKind::Task, Some(Uuid::new_v4()));
        let view = mk_view(vec![ColumnWithTasks {
            column,
            tasks: vec![task],
        }]);

        assert!(matches!(
            validate(&view),
            Err(InvariantViolation::MissingParent { .. })
        ));
    }
}
