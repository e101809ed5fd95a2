pub mod assembly;
pub mod board;
pub mod column;
pub mod position;
pub mod principal;
pub mod requests;
pub mod service;
pub mod sprint;
pub mod store;
pub mod task;

pub use assembly::{
    assemble_board, BoardSnapshot, BoardTaskRow, BoardTaskView, BoardView, ColumnView,
    SprintMembership, SprintSummary,
};
pub use board::{Board, BoardId, ProjectId};
pub use column::{Column, ColumnId};
pub use position::{BoardOrdering, ColumnPositions, TaskBoardPosition};
pub use principal::{AuthenticatedPrincipal, UserId, ADMIN_ROLE};
pub use requests::{
    AddSprintTasksRequest, CreateBoardRequest, CreateColumnRequest, CreateSprintRequest,
    CreateTaskRequest, MoveTaskRequest, ReorderColumnRequest,
};
pub use service::ScrumBoardService;
pub use sprint::{Sprint, SprintId, SprintStatus, SprintWithTasks};
pub use store::ScrumBoardStore;
pub use task::{Task, TaskId, TaskPriority, TaskStatus};
