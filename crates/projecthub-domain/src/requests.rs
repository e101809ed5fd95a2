//! Request bodies accepted by the board operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    board::{BoardId, ProjectId},
    column::ColumnId,
    principal::UserId,
    sprint::SprintId,
    task::{TaskId, TaskPriority, TaskStatus},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    pub project_id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    /// Initial column names, left to right.
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateColumnRequest {
    pub name: String,
    /// Appends after the last column when absent.
    pub position: Option<i32>,
    pub wip_limit: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub column_id: Option<ColumnId>,
    #[serde(default)]
    pub assignees: Vec<UserId>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSprintRequest {
    pub board_id: BoardId,
    pub name: String,
    pub goal: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddSprintTasksRequest {
    pub sprint_id: SprintId,
    pub task_ids: Vec<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveTaskRequest {
    pub board_id: BoardId,
    pub task_id: TaskId,
    pub column_id: ColumnId,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderColumnRequest {
    pub board_id: BoardId,
    pub task_ids: Vec<TaskId>,
}
