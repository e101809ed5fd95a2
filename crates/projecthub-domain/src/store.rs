use async_trait::async_trait;
use projecthub_core::HubResult;

use crate::{
    assembly::{BoardTaskRow, SprintMembership},
    board::{Board, BoardId, ProjectId},
    column::{Column, ColumnId},
    position::{ColumnPositions, TaskBoardPosition},
    sprint::{Sprint, SprintId, SprintStatus},
    task::{Task, TaskId},
};

/// Storage backing the scrum board service.
///
/// Lookups return `Ok(None)` for missing rows; turning that into a not-found
/// error is the caller's decision.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScrumBoardStore: Send + Sync {
    /// Insert a board together with its initial columns
    async fn create_board(&self, board: &Board, columns: &[Column]) -> HubResult<()>;

    async fn get_board(&self, board_id: BoardId) -> HubResult<Option<Board>>;

    async fn insert_column(&self, column: &Column) -> HubResult<()>;

    async fn get_column(&self, column_id: ColumnId) -> HubResult<Option<Column>>;

    async fn list_columns(&self, board_id: BoardId) -> HubResult<Vec<Column>>;

    /// Insert a task and rewrite the listed columns of `board_id` in the same
    /// transaction. `ordering` is empty for a task that starts in the backlog.
    async fn insert_task(
        &self,
        task: &Task,
        board_id: BoardId,
        ordering: &[ColumnPositions],
    ) -> HubResult<()>;

    /// Fetch the given tasks; ids with no row are simply absent from the result
    async fn get_tasks(&self, task_ids: &[TaskId]) -> HubResult<Vec<Task>>;

    async fn list_project_tasks(&self, project_id: ProjectId) -> HubResult<Vec<Task>>;

    async fn list_positions(&self, board_id: BoardId) -> HubResult<Vec<TaskBoardPosition>>;

    /// Rewrite the listed columns with dense positions in one transaction.
    ///
    /// Every listed task gets its `column_id` set to the column it is listed
    /// under, and its position rows on other boards are dropped.
    async fn save_ordering(&self, board_id: BoardId, columns: &[ColumnPositions])
        -> HubResult<()>;

    async fn insert_sprint(&self, sprint: &Sprint) -> HubResult<()>;

    async fn get_sprint(&self, sprint_id: SprintId) -> HubResult<Option<Sprint>>;

    /// Persist status and date changes of a sprint whose stored status is
    /// still `expected`. A sprint that moved on in between is a conflict.
    async fn update_sprint(&self, sprint: &Sprint, expected: SprintStatus) -> HubResult<()>;

    async fn list_sprints(&self, board_id: BoardId) -> HubResult<Vec<Sprint>>;

    /// Associate tasks with a sprint in one transaction, moving them out of
    /// any other sprint. Re-adding a member is a no-op. Fails with a conflict
    /// once the sprint is completed or cancelled.
    async fn add_sprint_tasks(&self, sprint_id: SprintId, task_ids: &[TaskId]) -> HubResult<()>;

    /// Returns false when the task was not in the sprint. Fails with a
    /// conflict once the sprint is completed or cancelled.
    async fn remove_sprint_task(&self, sprint_id: SprintId, task_id: TaskId) -> HubResult<bool>;

    async fn sprint_task_ids(&self, sprint_id: SprintId) -> HubResult<Vec<TaskId>>;

    async fn list_sprint_memberships(&self, board_id: BoardId)
        -> HubResult<Vec<SprintMembership>>;

    /// Rows of the `board_task_rows` view for one board
    async fn list_task_rows(&self, board_id: BoardId) -> HubResult<Vec<BoardTaskRow>>;
}
