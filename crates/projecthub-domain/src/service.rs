//! Scrum board operations.
//!
//! Every operation runs on behalf of an explicit [`AuthenticatedPrincipal`].
//! Reads and task placement are open to any authenticated user; changing a
//! board's structure or its sprints needs the board owner or an admin.

use chrono::Utc;
use projecthub_core::{HubError, HubResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    assembly::{assemble_board, BoardSnapshot, BoardTaskRow, BoardView},
    board::{Board, BoardId},
    column::{Column, ColumnId},
    position::BoardOrdering,
    principal::AuthenticatedPrincipal,
    requests::{
        AddSprintTasksRequest, CreateBoardRequest, CreateColumnRequest, CreateSprintRequest,
        CreateTaskRequest, MoveTaskRequest, ReorderColumnRequest,
    },
    sprint::{Sprint, SprintId, SprintStatus, SprintWithTasks},
    store::ScrumBoardStore,
    task::{Task, TaskId},
};

type BoardLocks = SyncMutex<HashMap<BoardId, Arc<Mutex<()>>>>;

pub struct ScrumBoardService {
    store: Arc<dyn ScrumBoardStore>,
    board_locks: BoardLocks,
}

/// Exclusive hold on one board. The board's entry leaves the lock table
/// when the last holder or waiter is gone.
struct BoardGuard<'a> {
    board_id: BoardId,
    locks: &'a BoardLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for BoardGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.board_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.board_id);
        }
    }
}

fn require_text(value: &str, what: &str) -> HubResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(HubError::Validation(format!("{} must not be empty", what)));
    }
    Ok(value.to_string())
}

/// Drop repeated ids, keeping the first occurrence.
fn dedup_ids(ids: &[TaskId]) -> Vec<TaskId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl ScrumBoardService {
    pub fn new(store: Arc<dyn ScrumBoardStore>) -> Self {
        Self {
            store,
            board_locks: SyncMutex::new(HashMap::new()),
        }
    }

    /// Serializes read-plan-write sequences on one board within this process.
    async fn lock_board(&self, board_id: BoardId) -> BoardGuard<'_> {
        let lock = {
            let mut locks = self
                .board_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks.entry(board_id).or_default().clone()
        };
        BoardGuard {
            board_id,
            locks: &self.board_locks,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn locked_boards(&self) -> usize {
        self.board_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn board(&self, board_id: BoardId) -> HubResult<Board> {
        self.store
            .get_board(board_id)
            .await?
            .ok_or_else(|| HubError::not_found("board", board_id))
    }

    async fn managed_board(
        &self,
        principal: &AuthenticatedPrincipal,
        board_id: BoardId,
    ) -> HubResult<Board> {
        let board = self.board(board_id).await?;
        if !principal.can_manage(&board) {
            return Err(HubError::Forbidden(format!(
                "user {} may not manage board {}",
                principal.user_id, board_id
            )));
        }
        Ok(board)
    }

    async fn column(&self, column_id: ColumnId) -> HubResult<Column> {
        self.store
            .get_column(column_id)
            .await?
            .ok_or_else(|| HubError::not_found("column", column_id))
    }

    async fn sprint(&self, sprint_id: SprintId) -> HubResult<Sprint> {
        self.store
            .get_sprint(sprint_id)
            .await?
            .ok_or_else(|| HubError::not_found("sprint", sprint_id))
    }

    /// Load the requested tasks and check they all belong to the board's project.
    async fn board_tasks(&self, board: &Board, task_ids: &[TaskId]) -> HubResult<Vec<Task>> {
        let tasks = self.store.get_tasks(task_ids).await?;
        if let Some(missing) = task_ids
            .iter()
            .find(|id| !tasks.iter().any(|t| t.id == **id))
        {
            return Err(HubError::not_found("task", missing));
        }
        if let Some(foreign) = tasks.iter().find(|t| t.project_id != board.project_id) {
            return Err(HubError::Validation(format!(
                "task {} does not belong to the project of board {}",
                foreign.id, board.id
            )));
        }
        Ok(tasks)
    }

    async fn load_ordering(&self, board: &Board) -> HubResult<BoardOrdering> {
        let columns = self.store.list_columns(board.id).await?;
        let tasks = self.store.list_project_tasks(board.project_id).await?;
        let positions = self.store.list_positions(board.id).await?;
        Ok(BoardOrdering::from_board(
            board.id, &columns, &tasks, &positions,
        ))
    }

    /// Re-read a sprint and fail with a conflict unless it still takes changes.
    async fn open_sprint(&self, sprint_id: SprintId) -> HubResult<Sprint> {
        let sprint = self.sprint(sprint_id).await?;
        if !sprint.status.is_open() {
            return Err(HubError::Conflict(format!(
                "sprint {} is {} and can no longer change",
                sprint_id, sprint.status
            )));
        }
        Ok(sprint)
    }

    async fn with_task_ids(&self, sprint: Sprint) -> HubResult<SprintWithTasks> {
        let task_ids = self.store.sprint_task_ids(sprint.id).await?;
        Ok(SprintWithTasks { sprint, task_ids })
    }

    pub async fn create_board(
        &self,
        principal: &AuthenticatedPrincipal,
        request: CreateBoardRequest,
    ) -> HubResult<Board> {
        let name = require_text(&request.name, "board name")?;
        let board = Board::new(
            request.project_id,
            name,
            request.description,
            principal.user_id,
        );
        let columns = request
            .columns
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let name = require_text(name, "column name")?;
                Ok(Column::new(board.id, name, index as i32))
            })
            .collect::<HubResult<Vec<_>>>()?;

        self.store.create_board(&board, &columns).await?;
        tracing::info!(
            "User {} created board {} with {} columns",
            principal.user_id,
            board.id,
            columns.len()
        );
        Ok(board)
    }

    pub async fn get_board_view(
        &self,
        principal: &AuthenticatedPrincipal,
        board_id: BoardId,
    ) -> HubResult<BoardView> {
        let board = self.board(board_id).await?;
        let snapshot = BoardSnapshot {
            columns: self.store.list_columns(board_id).await?,
            tasks: self.store.list_project_tasks(board.project_id).await?,
            positions: self.store.list_positions(board_id).await?,
            sprints: self.store.list_sprints(board_id).await?,
            memberships: self.store.list_sprint_memberships(board_id).await?,
            board,
        };
        tracing::debug!("User {} loaded board {}", principal.user_id, board_id);
        Ok(assemble_board(snapshot, Utc::now()))
    }

    pub async fn list_board_tasks(
        &self,
        principal: &AuthenticatedPrincipal,
        board_id: BoardId,
    ) -> HubResult<Vec<BoardTaskRow>> {
        self.board(board_id).await?;
        tracing::debug!("User {} listed tasks of board {}", principal.user_id, board_id);
        self.store.list_task_rows(board_id).await
    }

    pub async fn create_column(
        &self,
        principal: &AuthenticatedPrincipal,
        board_id: BoardId,
        request: CreateColumnRequest,
    ) -> HubResult<Column> {
        let name = require_text(&request.name, "column name")?;
        if request.wip_limit.is_some_and(|limit| limit < 1) {
            return Err(HubError::Validation("wip limit must be at least 1".into()));
        }
        if request.position.is_some_and(|p| p < 0) {
            return Err(HubError::Validation("column position must not be negative".into()));
        }
        self.managed_board(principal, board_id).await?;

        let _guard = self.lock_board(board_id).await;
        let position = match request.position {
            Some(position) => position,
            None => self
                .store
                .list_columns(board_id)
                .await?
                .iter()
                .map(|c| c.position + 1)
                .max()
                .unwrap_or(0),
        };
        let mut column = Column::new(board_id, name, position);
        if let Some(limit) = request.wip_limit {
            column.set_wip_limit(Some(limit));
        }
        self.store.insert_column(&column).await?;
        tracing::info!("Created column {} on board {}", column.id, board_id);
        Ok(column)
    }

    /// Create a task in the board's project, appended to `column_id` when given.
    pub async fn create_task(
        &self,
        principal: &AuthenticatedPrincipal,
        board_id: BoardId,
        request: CreateTaskRequest,
    ) -> HubResult<Task> {
        let title = require_text(&request.title, "task title")?;
        let board = self.board(board_id).await?;
        if let Some(column_id) = request.column_id {
            let column = self.column(column_id).await?;
            if column.board_id != board_id {
                return Err(HubError::Validation(format!(
                    "column {} does not belong to board {}",
                    column_id, board_id
                )));
            }
        }

        let mut task = Task::new(board.project_id, title);
        task.description = request.description;
        task.due_date = request.due_date;
        if let Some(priority) = request.priority {
            task.priority = priority;
        }
        if let Some(status) = request.status {
            task.status = status;
        }
        if !request.assignees.is_empty() {
            task.assign(request.assignees);
        }

        match request.column_id {
            None => self.store.insert_task(&task, board_id, &[]).await?,
            Some(column_id) => {
                let _guard = self.lock_board(board_id).await;
                let mut ordering = self.load_ordering(&board).await?;
                ordering.move_task(task.id, column_id, usize::MAX)?;
                task.column_id = Some(column_id);
                self.store
                    .insert_task(&task, board_id, &ordering.changes())
                    .await?;
            }
        }
        tracing::info!(
            "User {} created task {} on board {}",
            principal.user_id,
            task.id,
            board_id
        );
        Ok(task)
    }

    pub async fn create_sprint(
        &self,
        principal: &AuthenticatedPrincipal,
        board_id: BoardId,
        request: CreateSprintRequest,
    ) -> HubResult<Sprint> {
        if request.board_id != board_id {
            return Err(HubError::Validation(format!(
                "board id {} in body does not match board {} in path",
                request.board_id, board_id
            )));
        }
        self.managed_board(principal, board_id).await?;

        let sprint = Sprint::new(
            board_id,
            request.name,
            request.goal,
            request.start_date,
            request.end_date,
            principal.user_id,
        )?;
        self.store.insert_sprint(&sprint).await?;
        tracing::info!(
            "User {} created sprint {} ({}) on board {}",
            principal.user_id,
            sprint.id,
            sprint.name,
            board_id
        );
        Ok(sprint)
    }

    pub async fn list_sprints(
        &self,
        _principal: &AuthenticatedPrincipal,
        board_id: BoardId,
    ) -> HubResult<Vec<Sprint>> {
        self.board(board_id).await?;
        self.store.list_sprints(board_id).await
    }

    pub async fn get_sprint(
        &self,
        _principal: &AuthenticatedPrincipal,
        sprint_id: SprintId,
    ) -> HubResult<SprintWithTasks> {
        let sprint = self.sprint(sprint_id).await?;
        self.with_task_ids(sprint).await
    }

    /// Associate tasks with a sprint. All-or-nothing; re-adding is a no-op.
    pub async fn add_tasks_to_sprint(
        &self,
        principal: &AuthenticatedPrincipal,
        sprint_id: SprintId,
        request: AddSprintTasksRequest,
    ) -> HubResult<SprintWithTasks> {
        if request.sprint_id != sprint_id {
            return Err(HubError::Validation(format!(
                "sprint id {} in body does not match sprint {} in path",
                request.sprint_id, sprint_id
            )));
        }
        if request.task_ids.is_empty() {
            return Err(HubError::Validation("task_ids must not be empty".into()));
        }
        let task_ids = dedup_ids(&request.task_ids);

        let board_id = self.sprint(sprint_id).await?.board_id;
        let board = self.board(board_id).await?;
        self.board_tasks(&board, &task_ids).await?;

        let _guard = self.lock_board(board_id).await;
        let sprint = self.open_sprint(sprint_id).await?;
        self.store.add_sprint_tasks(sprint_id, &task_ids).await?;
        tracing::info!(
            "User {} added {} tasks to sprint {}",
            principal.user_id,
            task_ids.len(),
            sprint_id
        );
        self.with_task_ids(sprint).await
    }

    pub async fn remove_task_from_sprint(
        &self,
        principal: &AuthenticatedPrincipal,
        sprint_id: SprintId,
        task_id: TaskId,
    ) -> HubResult<()> {
        let board_id = self.sprint(sprint_id).await?.board_id;

        let _guard = self.lock_board(board_id).await;
        self.open_sprint(sprint_id).await?;
        if !self.store.remove_sprint_task(sprint_id, task_id).await? {
            return Err(HubError::NotFound(format!(
                "task {} is not in sprint {}",
                task_id, sprint_id
            )));
        }
        tracing::info!(
            "User {} removed task {} from sprint {}",
            principal.user_id,
            task_id,
            sprint_id
        );
        Ok(())
    }

    /// Activate a planned sprint. A board has at most one active sprint.
    pub async fn start_sprint(
        &self,
        principal: &AuthenticatedPrincipal,
        sprint_id: SprintId,
    ) -> HubResult<Sprint> {
        let board_id = self.sprint(sprint_id).await?.board_id;
        self.managed_board(principal, board_id).await?;

        let _guard = self.lock_board(board_id).await;
        let mut sprint = self.sprint(sprint_id).await?;
        let active = self
            .store
            .list_sprints(board_id)
            .await?
            .into_iter()
            .find(|s| s.status == SprintStatus::Active && s.id != sprint_id);
        if let Some(active) = active {
            return Err(HubError::Conflict(format!(
                "board {} already has an active sprint ({})",
                board_id, active.name
            )));
        }
        let previous = sprint.status;
        sprint.start(Utc::now())?;
        self.store.update_sprint(&sprint, previous).await?;
        tracing::info!("User {} started sprint {}", principal.user_id, sprint_id);
        Ok(sprint)
    }

    pub async fn complete_sprint(
        &self,
        principal: &AuthenticatedPrincipal,
        sprint_id: SprintId,
    ) -> HubResult<Sprint> {
        let sprint = self
            .transition_sprint(principal, sprint_id, |s| s.complete(Utc::now()))
            .await?;
        tracing::info!("User {} completed sprint {}", principal.user_id, sprint_id);
        Ok(sprint)
    }

    pub async fn cancel_sprint(
        &self,
        principal: &AuthenticatedPrincipal,
        sprint_id: SprintId,
    ) -> HubResult<Sprint> {
        let sprint = self
            .transition_sprint(principal, sprint_id, Sprint::cancel)
            .await?;
        tracing::info!("User {} cancelled sprint {}", principal.user_id, sprint_id);
        Ok(sprint)
    }

    /// Apply a lifecycle change to the sprint as stored under the board lock.
    async fn transition_sprint(
        &self,
        principal: &AuthenticatedPrincipal,
        sprint_id: SprintId,
        change: impl FnOnce(&mut Sprint) -> HubResult<()>,
    ) -> HubResult<Sprint> {
        let board_id = self.sprint(sprint_id).await?.board_id;
        self.managed_board(principal, board_id).await?;

        let _guard = self.lock_board(board_id).await;
        let mut sprint = self.sprint(sprint_id).await?;
        let previous = sprint.status;
        change(&mut sprint)?;
        self.store.update_sprint(&sprint, previous).await?;
        Ok(sprint)
    }

    /// Move one task into a column at an index, compacting the column it left.
    pub async fn move_task(
        &self,
        principal: &AuthenticatedPrincipal,
        request: MoveTaskRequest,
    ) -> HubResult<()> {
        let position = usize::try_from(request.position).map_err(|_| {
            HubError::Validation(format!(
                "position must not be negative, got {}",
                request.position
            ))
        })?;
        let board = self.board(request.board_id).await?;
        let column = self.column(request.column_id).await?;
        if column.board_id != board.id {
            return Err(HubError::Validation(format!(
                "column {} does not belong to board {}",
                column.id, board.id
            )));
        }
        self.board_tasks(&board, &[request.task_id]).await?;

        let _guard = self.lock_board(board.id).await;
        let mut ordering = self.load_ordering(&board).await?;
        ordering.move_task(request.task_id, column.id, position)?;
        self.store.save_ordering(board.id, &ordering.changes()).await?;
        tracing::info!(
            "User {} moved task {} to column {} at {}",
            principal.user_id,
            request.task_id,
            column.id,
            position
        );
        Ok(())
    }

    /// Make `column_id` list exactly `task_ids` first, followed by any tasks it
    /// already held that were not listed.
    pub async fn reorder_column(
        &self,
        principal: &AuthenticatedPrincipal,
        column_id: ColumnId,
        request: ReorderColumnRequest,
    ) -> HubResult<()> {
        let column = self.column(column_id).await?;
        if column.board_id != request.board_id {
            return Err(HubError::Validation(format!(
                "column {} does not belong to board {}",
                column_id, request.board_id
            )));
        }
        if dedup_ids(&request.task_ids).len() != request.task_ids.len() {
            return Err(HubError::Validation(
                "task_ids must not contain duplicates".into(),
            ));
        }
        let board = self.board(request.board_id).await?;
        self.board_tasks(&board, &request.task_ids).await?;

        let _guard = self.lock_board(board.id).await;
        let mut ordering = self.load_ordering(&board).await?;
        ordering.reorder_column(column_id, &request.task_ids)?;
        let changes = ordering.changes();
        self.store.save_ordering(board.id, &changes).await?;
        tracing::info!(
            "User {} reordered column {} ({} columns rewritten)",
            principal.user_id,
            column_id,
            changes.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockScrumBoardStore;
    use chrono::Duration;
    use uuid::Uuid;

    fn owner() -> AuthenticatedPrincipal {
        AuthenticatedPrincipal::new(Uuid::new_v4(), "owner", vec![])
    }

    fn board_for(principal: &AuthenticatedPrincipal) -> Board {
        Board::new(Uuid::new_v4(), "Scrum".into(), None, principal.user_id)
    }

    fn service(store: MockScrumBoardStore) -> ScrumBoardService {
        ScrumBoardService::new(Arc::new(store))
    }

    fn expect_board(store: &mut MockScrumBoardStore, board: &Board) {
        let board = board.clone();
        store
            .expect_get_board()
            .returning(move |_| Ok(Some(board.clone())));
    }

    #[tokio::test]
    async fn test_create_sprint_board_mismatch_touches_nothing() {
        let principal = owner();
        let svc = service(MockScrumBoardStore::new());
        let request = CreateSprintRequest {
            board_id: Uuid::new_v4(),
            name: "Sprint 1".into(),
            goal: None,
            start_date: None,
            end_date: None,
        };

        let err = svc
            .create_sprint(&principal, Uuid::new_v4(), request)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_sprint_requires_owner_or_admin() {
        let principal = owner();
        let board = board_for(&principal);
        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        store.expect_insert_sprint().times(1).returning(|_| Ok(()));
        let svc = service(store);

        let request = |board_id| CreateSprintRequest {
            board_id,
            name: "Sprint 1".into(),
            goal: Some("Ship".into()),
            start_date: None,
            end_date: None,
        };

        let stranger = AuthenticatedPrincipal::new(Uuid::new_v4(), "stranger", vec![]);
        let err = svc
            .create_sprint(&stranger, board.id, request(board.id))
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Forbidden(_)));

        let sprint = svc
            .create_sprint(&principal, board.id, request(board.id))
            .await
            .unwrap();
        assert_eq!(sprint.created_by, principal.user_id);
        assert_eq!(sprint.status, SprintStatus::Planned);
    }

    #[tokio::test]
    async fn test_create_sprint_unknown_board() {
        let mut store = MockScrumBoardStore::new();
        store.expect_get_board().returning(|_| Ok(None));
        let svc = service(store);
        let board_id = Uuid::new_v4();
        let request = CreateSprintRequest {
            board_id,
            name: "Sprint 1".into(),
            goal: None,
            start_date: None,
            end_date: None,
        };

        let err = svc
            .create_sprint(&owner(), board_id, request)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_tasks_collapses_duplicates() {
        let principal = owner();
        let board = board_for(&principal);
        let sprint = Sprint::new(board.id, "S".into(), None, None, None, principal.user_id).unwrap();
        let task = Task::new(board.project_id, "T".into());
        let task_id = task.id;

        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        let s = sprint.clone();
        store
            .expect_get_sprint()
            .returning(move |_| Ok(Some(s.clone())));
        store
            .expect_get_tasks()
            .withf(move |ids| ids.len() == 1 && ids[0] == task_id)
            .returning(move |_| Ok(vec![task.clone()]));
        store
            .expect_add_sprint_tasks()
            .withf(move |_, ids| ids.len() == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_sprint_task_ids()
            .returning(move |_| Ok(vec![task_id]));
        let svc = service(store);

        let result = svc
            .add_tasks_to_sprint(
                &principal,
                sprint.id,
                AddSprintTasksRequest {
                    sprint_id: sprint.id,
                    task_ids: vec![task_id, task_id],
                },
            )
            .await
            .unwrap();
        assert_eq!(result.task_ids, vec![task_id]);
    }

    #[tokio::test]
    async fn test_add_tasks_rejects_empty_and_mismatched_requests() {
        let svc = service(MockScrumBoardStore::new());
        let sprint_id = Uuid::new_v4();

        let empty = svc
            .add_tasks_to_sprint(
                &owner(),
                sprint_id,
                AddSprintTasksRequest {
                    sprint_id,
                    task_ids: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(empty, HubError::Validation(_)));

        let mismatch = svc
            .add_tasks_to_sprint(
                &owner(),
                sprint_id,
                AddSprintTasksRequest {
                    sprint_id: Uuid::new_v4(),
                    task_ids: vec![Uuid::new_v4()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(mismatch, HubError::Validation(_)));
    }

    #[tokio::test]
    async fn test_add_tasks_from_other_project_is_rejected() {
        let principal = owner();
        let board = board_for(&principal);
        let sprint = Sprint::new(board.id, "S".into(), None, None, None, principal.user_id).unwrap();
        let foreign = Task::new(Uuid::new_v4(), "elsewhere".into());
        let foreign_id = foreign.id;

        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        let s = sprint.clone();
        store
            .expect_get_sprint()
            .returning(move |_| Ok(Some(s.clone())));
        store
            .expect_get_tasks()
            .returning(move |_| Ok(vec![foreign.clone()]));
        store.expect_add_sprint_tasks().never();
        let svc = service(store);

        let err = svc
            .add_tasks_to_sprint(
                &principal,
                sprint.id,
                AddSprintTasksRequest {
                    sprint_id: sprint.id,
                    task_ids: vec![foreign_id],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
    }

    #[tokio::test]
    async fn test_move_task_rejects_negative_position() {
        let svc = service(MockScrumBoardStore::new());
        let err = svc
            .move_task(
                &owner(),
                MoveTaskRequest {
                    board_id: Uuid::new_v4(),
                    task_id: Uuid::new_v4(),
                    column_id: Uuid::new_v4(),
                    position: -1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
    }

    #[tokio::test]
    async fn test_move_task_rewrites_both_columns() {
        let principal = owner();
        let board = board_for(&principal);
        let todo = Column::new(board.id, "Todo".into(), 0);
        let doing = Column::new(board.id, "Doing".into(), 1);
        let mut tasks: Vec<Task> = (0..3)
            .map(|i| {
                let mut t = Task::new(board.project_id, format!("t{}", i));
                t.column_id = Some(todo.id);
                t.created_at = Utc::now() + Duration::seconds(i);
                t
            })
            .collect();
        tasks[2].column_id = Some(doing.id);
        let (a, b, c) = (tasks[0].id, tasks[1].id, tasks[2].id);
        let (todo_id, doing_id) = (todo.id, doing.id);

        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        let d = doing.clone();
        store
            .expect_get_column()
            .returning(move |_| Ok(Some(d.clone())));
        let moved = tasks[0].clone();
        store
            .expect_get_tasks()
            .returning(move |_| Ok(vec![moved.clone()]));
        let columns = vec![todo, doing];
        store
            .expect_list_columns()
            .returning(move |_| Ok(columns.clone()));
        store
            .expect_list_project_tasks()
            .returning(move |_| Ok(tasks.clone()));
        store.expect_list_positions().returning(|_| Ok(vec![]));
        store
            .expect_save_ordering()
            .withf(move |_, changes| {
                changes.len() == 2
                    && changes
                        .iter()
                        .any(|col| col.column_id == todo_id && col.task_ids == vec![b])
                    && changes
                        .iter()
                        .any(|col| col.column_id == doing_id && col.task_ids == vec![a, c])
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let svc = service(store);

        svc.move_task(
            &principal,
            MoveTaskRequest {
                board_id: board.id,
                task_id: a,
                column_id: doing_id,
                position: 0,
            },
        )
        .await
        .unwrap();
        assert_eq!(svc.locked_boards(), 0);
    }

    #[tokio::test]
    async fn test_board_lock_entry_outlives_only_its_holders() {
        let svc = service(MockScrumBoardStore::new());
        let board_id = Uuid::new_v4();

        let first = svc.lock_board(board_id).await;
        let other = svc.lock_board(Uuid::new_v4()).await;
        assert_eq!(svc.locked_boards(), 2);

        drop(other);
        assert_eq!(svc.locked_boards(), 1);
        drop(first);
        assert_eq!(svc.locked_boards(), 0);

        let again = svc.lock_board(board_id).await;
        assert_eq!(svc.locked_boards(), 1);
        drop(again);
        assert_eq!(svc.locked_boards(), 0);
    }

    #[tokio::test]
    async fn test_add_tasks_rechecks_sprint_under_lock() {
        let principal = owner();
        let board = board_for(&principal);
        let planned = Sprint::new(board.id, "S".into(), None, None, None, principal.user_id).unwrap();
        let mut cancelled = planned.clone();
        cancelled.cancel().unwrap();
        let task = Task::new(board.project_id, "T".into());
        let task_id = task.id;

        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        let mut seq = mockall::Sequence::new();
        store
            .expect_get_sprint()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(planned.clone())));
        store
            .expect_get_sprint()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(cancelled.clone())));
        store
            .expect_get_tasks()
            .returning(move |_| Ok(vec![task.clone()]));
        store.expect_add_sprint_tasks().never();
        let svc = service(store);

        let sprint_id = Uuid::new_v4();
        let err = svc
            .add_tasks_to_sprint(
                &principal,
                sprint_id,
                AddSprintTasksRequest {
                    sprint_id,
                    task_ids: vec![task_id],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Conflict(_)));
        assert_eq!(svc.locked_boards(), 0);
    }

    #[tokio::test]
    async fn test_complete_sprint_writes_against_previous_status() {
        let principal = owner();
        let board = board_for(&principal);
        let mut sprint =
            Sprint::new(board.id, "S".into(), None, None, None, principal.user_id).unwrap();
        sprint.start(Utc::now()).unwrap();

        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        let s = sprint.clone();
        store
            .expect_get_sprint()
            .returning(move |_| Ok(Some(s.clone())));
        store
            .expect_update_sprint()
            .withf(|updated, expected| {
                updated.status == SprintStatus::Completed
                    && updated.completed_date.is_some()
                    && *expected == SprintStatus::Active
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let svc = service(store);

        let completed = svc.complete_sprint(&principal, sprint.id).await.unwrap();
        assert_eq!(completed.status, SprintStatus::Completed);
    }

    #[tokio::test]
    async fn test_stale_lifecycle_write_surfaces_conflict() {
        let principal = owner();
        let board = board_for(&principal);
        let sprint = Sprint::new(board.id, "S".into(), None, None, None, principal.user_id).unwrap();

        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        let s = sprint.clone();
        store
            .expect_get_sprint()
            .returning(move |_| Ok(Some(s.clone())));
        store
            .expect_update_sprint()
            .returning(|sprint, _| Err(HubError::Conflict(format!("sprint {} changed", sprint.id))));
        let svc = service(store);

        let err = svc.cancel_sprint(&principal, sprint.id).await.unwrap_err();
        assert!(matches!(err, HubError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_task_in_column_is_one_store_write() {
        let principal = owner();
        let board = board_for(&principal);
        let column = Column::new(board.id, "Todo".into(), 0);
        let column_id = column.id;

        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        let c = column.clone();
        store
            .expect_get_column()
            .returning(move |_| Ok(Some(c.clone())));
        store
            .expect_list_columns()
            .returning(move |_| Ok(vec![column.clone()]));
        store.expect_list_project_tasks().returning(|_| Ok(vec![]));
        store.expect_list_positions().returning(|_| Ok(vec![]));
        store
            .expect_insert_task()
            .withf(move |task, _, ordering| {
                task.column_id == Some(column_id)
                    && ordering.len() == 1
                    && ordering[0].column_id == column_id
                    && ordering[0].task_ids == vec![task.id]
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        store.expect_save_ordering().never();
        let svc = service(store);

        let task = svc
            .create_task(
                &principal,
                board.id,
                CreateTaskRequest {
                    title: "Write tests".into(),
                    description: None,
                    priority: None,
                    status: None,
                    column_id: Some(column_id),
                    assignees: vec![],
                    due_date: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(task.column_id, Some(column_id));
    }

    #[tokio::test]
    async fn test_reorder_column_on_other_board_is_rejected() {
        let principal = owner();
        let column = Column::new(Uuid::new_v4(), "Todo".into(), 0);
        let mut store = MockScrumBoardStore::new();
        let col = column.clone();
        store
            .expect_get_column()
            .returning(move |_| Ok(Some(col.clone())));
        store.expect_save_ordering().never();
        let svc = service(store);

        let err = svc
            .reorder_column(
                &principal,
                column.id,
                ReorderColumnRequest {
                    board_id: Uuid::new_v4(),
                    task_ids: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reorder_column_rejects_duplicates() {
        let principal = owner();
        let board = board_for(&principal);
        let column = Column::new(board.id, "Todo".into(), 0);
        let mut store = MockScrumBoardStore::new();
        let col = column.clone();
        store
            .expect_get_column()
            .returning(move |_| Ok(Some(col.clone())));
        let svc = service(store);

        let task_id = Uuid::new_v4();
        let err = svc
            .reorder_column(
                &principal,
                column.id,
                ReorderColumnRequest {
                    board_id: board.id,
                    task_ids: vec![task_id, task_id],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reorder_column_unknown_task_is_not_found() {
        let principal = owner();
        let board = board_for(&principal);
        let column = Column::new(board.id, "Todo".into(), 0);
        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        let col = column.clone();
        store
            .expect_get_column()
            .returning(move |_| Ok(Some(col.clone())));
        store.expect_get_tasks().returning(|_| Ok(vec![]));
        let svc = service(store);

        let err = svc
            .reorder_column(
                &principal,
                column.id,
                ReorderColumnRequest {
                    board_id: board.id,
                    task_ids: vec![Uuid::new_v4()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_second_active_sprint_is_a_conflict() {
        let principal = owner();
        let board = board_for(&principal);
        let mut running =
            Sprint::new(board.id, "Running".into(), None, None, None, principal.user_id).unwrap();
        running.start(Utc::now()).unwrap();
        let next = Sprint::new(board.id, "Next".into(), None, None, None, principal.user_id).unwrap();

        let mut store = MockScrumBoardStore::new();
        expect_board(&mut store, &board);
        let n = next.clone();
        store
            .expect_get_sprint()
            .returning(move |_| Ok(Some(n.clone())));
        let sprints = vec![running, next.clone()];
        store
            .expect_list_sprints()
            .returning(move |_| Ok(sprints.clone()));
        store.expect_update_sprint().never();
        let svc = service(store);

        let err = svc.start_sprint(&principal, next.id).await.unwrap_err();
        assert!(matches!(err, HubError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_board_with_columns() {
        let principal = owner();
        let mut store = MockScrumBoardStore::new();
        store
            .expect_create_board()
            .withf(|board, columns| {
                columns.len() == 3
                    && columns[2].name == "Done"
                    && columns[2].position == 2
                    && columns.iter().all(|c| c.board_id == board.id)
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let svc = service(store);

        let board = svc
            .create_board(
                &principal,
                CreateBoardRequest {
                    project_id: Uuid::new_v4(),
                    name: " Team board ".into(),
                    description: None,
                    columns: vec!["Todo".into(), "Doing".into(), "Done".into()],
                },
            )
            .await
            .unwrap();
        assert_eq!(board.name, "Team board");
        assert_eq!(board.owner_id, principal.user_id);
    }
}
