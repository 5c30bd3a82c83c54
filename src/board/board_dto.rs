use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::board_models::TaskKind;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTaskRequest {
    pub column_id: Uuid,
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    pub description: Option<String>,
    pub kind: Option<TaskKind>,
    pub parent_task_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveTaskRequest {
    /// Destination column; may equal the task's current column.
    pub column_id: Uuid,
    /// Destination index within the column, 0 <= index <= task count.
    pub index: usize,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateColumnRequest {
    pub board_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
}
