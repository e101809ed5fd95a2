//! Read-side view models for the scrum board UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    board::Board,
    column::{Column, ColumnId},
    position::{BoardOrdering, TaskBoardPosition},
    principal::UserId,
    sprint::{Sprint, SprintId, SprintStatus},
    task::{Task, TaskId, TaskPriority, TaskStatus},
};

/// Membership row of the sprint/task join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintMembership {
    pub sprint_id: SprintId,
    pub task_id: TaskId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardTaskView {
    #[serde(flatten)]
    pub task: Task,
    pub position: Option<i32>,
    pub sprint_id: Option<SprintId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnView {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<BoardTaskView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintSummary {
    pub id: SprintId,
    pub name: String,
    pub goal: Option<String>,
    pub status: SprintStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub task_count: usize,
    pub done_count: usize,
    pub overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    #[serde(flatten)]
    pub board: Board,
    pub columns: Vec<ColumnView>,
    /// Project tasks not yet placed in any column.
    pub backlog: Vec<BoardTaskView>,
    pub sprints: Vec<SprintSummary>,
    pub active_sprint: Option<SprintSummary>,
}

/// Flat row of the board task listing, one per project task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardTaskRow {
    pub task_id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub assignees: Vec<UserId>,
    pub column_id: Option<ColumnId>,
    pub column_name: Option<String>,
    pub position: Option<i32>,
    pub sprint_id: Option<SprintId>,
    pub sprint_name: Option<String>,
}

/// Everything the board view is assembled from, as loaded from the store.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub board: Board,
    pub columns: Vec<Column>,
    /// All tasks of the board's project.
    pub tasks: Vec<Task>,
    pub positions: Vec<TaskBoardPosition>,
    pub sprints: Vec<Sprint>,
    pub memberships: Vec<SprintMembership>,
}

fn summarize(
    sprint: &Sprint,
    memberships: &[SprintMembership],
    tasks: &HashMap<TaskId, &Task>,
    now: DateTime<Utc>,
) -> SprintSummary {
    let members: Vec<TaskId> = memberships
        .iter()
        .filter(|m| m.sprint_id == sprint.id)
        .map(|m| m.task_id)
        .collect();
    let done_count = members
        .iter()
        .filter(|id| tasks.get(*id).is_some_and(|t| t.is_done()))
        .count();

    SprintSummary {
        id: sprint.id,
        name: sprint.name.clone(),
        goal: sprint.goal.clone(),
        status: sprint.status,
        start_date: sprint.start_date,
        end_date: sprint.end_date,
        completed_date: sprint.completed_date,
        task_count: members.len(),
        done_count,
        overdue: sprint.is_ended(now),
    }
}

/// Assemble the board view: columns in display order, each with its tasks in
/// board order, unplaced project tasks in the backlog, and sprint summaries.
pub fn assemble_board(snapshot: BoardSnapshot, now: DateTime<Utc>) -> BoardView {
    let BoardSnapshot {
        board,
        columns,
        tasks,
        positions,
        sprints,
        memberships,
    } = snapshot;

    let ordering = BoardOrdering::from_board(board.id, &columns, &tasks, &positions);
    let by_id: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    let sprint_of: HashMap<TaskId, SprintId> = memberships
        .iter()
        .map(|m| (m.task_id, m.sprint_id))
        .collect();
    let rank_of: HashMap<TaskId, (ColumnId, i32)> = positions
        .iter()
        .filter(|p| p.board_id == board.id)
        .map(|p| (p.task_id, (p.column_id, p.position)))
        .collect();

    // A rank left behind in another column is not the task's rank.
    let view_of = |task: &Task| BoardTaskView {
        task: task.clone(),
        position: rank_of
            .get(&task.id)
            .filter(|(column_id, _)| task.column_id == Some(*column_id))
            .map(|(_, position)| *position),
        sprint_id: sprint_of.get(&task.id).copied(),
    };

    let column_by_id: HashMap<ColumnId, &Column> = columns.iter().map(|c| (c.id, c)).collect();
    let column_views = ordering
        .column_ids()
        .iter()
        .filter_map(|column_id| {
            let column = column_by_id.get(column_id)?;
            let tasks = ordering
                .column(*column_id)
                .unwrap_or_default()
                .iter()
                .filter_map(|id| by_id.get(id).map(|t| view_of(t)))
                .collect();
            Some(ColumnView {
                column: (*column).clone(),
                tasks,
            })
        })
        .collect();

    let mut backlog: Vec<BoardTaskView> = tasks
        .iter()
        .filter(|t| t.column_id.is_none())
        .map(view_of)
        .collect();
    backlog.sort_by_key(|v| (v.task.created_at, v.task.id));

    let mut summaries: Vec<SprintSummary> = sprints
        .iter()
        .filter(|s| s.board_id == board.id)
        .map(|s| summarize(s, &memberships, &by_id, now))
        .collect();
    summaries.sort_by_key(|s| (s.start_date.is_none(), s.start_date, s.name.clone()));
    let active_sprint = summaries
        .iter()
        .find(|s| s.status == SprintStatus::Active)
        .cloned();

    BoardView {
        board,
        columns: column_views,
        backlog,
        sprints: summaries,
        active_sprint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn snapshot() -> BoardSnapshot {
        let owner = Uuid::new_v4();
        let project_id = Uuid::new_v4();
        let board = Board::new(project_id, "Scrum".into(), None, owner);
        let columns = vec![
            Column::new(board.id, "Done".into(), 2),
            Column::new(board.id, "Todo".into(), 0),
            Column::new(board.id, "Doing".into(), 1),
        ];
        BoardSnapshot {
            board,
            columns,
            tasks: Vec::new(),
            positions: Vec::new(),
            sprints: Vec::new(),
            memberships: Vec::new(),
        }
    }

    fn add_task(snap: &mut BoardSnapshot, column: Option<usize>, position: Option<i32>) -> TaskId {
        let mut task = Task::new(snap.board.project_id, format!("task {}", snap.tasks.len()));
        task.created_at = Utc::now() + Duration::seconds(snap.tasks.len() as i64);
        task.column_id = column.map(|i| snap.columns[i].id);
        if let (Some(i), Some(position)) = (column, position) {
            snap.positions.push(TaskBoardPosition {
                board_id: snap.board.id,
                column_id: snap.columns[i].id,
                task_id: task.id,
                position,
            });
        }
        let id = task.id;
        snap.tasks.push(task);
        id
    }

    #[test]
    fn columns_are_in_display_order_with_sorted_tasks() {
        let mut snap = snapshot();
        let second = add_task(&mut snap, Some(1), Some(4));
        let first = add_task(&mut snap, Some(1), Some(1));
        let doing = add_task(&mut snap, Some(2), None);

        let view = assemble_board(snap, Utc::now());
        let names: Vec<_> = view.columns.iter().map(|c| c.column.name.as_str()).collect();
        assert_eq!(names, vec!["Todo", "Doing", "Done"]);

        let todo: Vec<_> = view.columns[0].tasks.iter().map(|t| t.task.id).collect();
        assert_eq!(todo, vec![first, second]);
        assert_eq!(view.columns[0].tasks[0].position, Some(1));
        assert_eq!(view.columns[1].tasks[0].task.id, doing);
        assert_eq!(view.columns[1].tasks[0].position, None);
        assert!(view.columns[2].tasks.is_empty());
    }

    #[test]
    fn rank_from_another_column_is_not_reported() {
        let mut snap = snapshot();
        let moved = add_task(&mut snap, Some(1), Some(3));
        snap.tasks[0].column_id = Some(snap.columns[2].id);

        let view = assemble_board(snap, Utc::now());
        let doing = &view.columns[1];
        assert_eq!(doing.column.name, "Doing");
        assert_eq!(doing.tasks.len(), 1);
        assert_eq!(doing.tasks[0].task.id, moved);
        assert_eq!(doing.tasks[0].position, None);
        assert!(view.columns[0].tasks.is_empty());
    }

    #[test]
    fn unplaced_tasks_go_to_backlog() {
        let mut snap = snapshot();
        let loose = add_task(&mut snap, None, None);
        add_task(&mut snap, Some(1), Some(0));

        let view = assemble_board(snap, Utc::now());
        assert_eq!(view.backlog.len(), 1);
        assert_eq!(view.backlog[0].task.id, loose);
    }

    #[test]
    fn sprint_summaries_count_members() {
        let mut snap = snapshot();
        let a = add_task(&mut snap, Some(1), Some(0));
        let b = add_task(&mut snap, Some(1), Some(1));
        add_task(&mut snap, Some(1), Some(2));
        snap.tasks[1].status = TaskStatus::Done;

        let now = Utc::now();
        let mut active = Sprint::new(
            snap.board.id,
            "Sprint 2".into(),
            None,
            Some(now - Duration::days(3)),
            Some(now + Duration::days(11)),
            snap.board.owner_id,
        )
        .unwrap();
        active.start(now).unwrap();
        let planned = Sprint::new(
            snap.board.id,
            "Sprint 3".into(),
            None,
            None,
            None,
            snap.board.owner_id,
        )
        .unwrap();
        snap.memberships = vec![
            SprintMembership {
                sprint_id: active.id,
                task_id: a,
            },
            SprintMembership {
                sprint_id: active.id,
                task_id: b,
            },
        ];
        let active_id = active.id;
        snap.sprints = vec![planned, active];

        let view = assemble_board(snap, now);
        assert_eq!(view.sprints.len(), 2);
        assert_eq!(view.sprints[0].id, active_id);

        let summary = view.active_sprint.expect("active sprint");
        assert_eq!(summary.id, active_id);
        assert_eq!(summary.task_count, 2);
        assert_eq!(summary.done_count, 1);
        assert!(!summary.overdue);

        let todo = &view.columns[0].tasks;
        assert_eq!(todo[0].sprint_id, Some(active_id));
        assert_eq!(todo[2].sprint_id, None);
    }

    #[test]
    fn view_serializes_flat() {
        let mut snap = snapshot();
        add_task(&mut snap, Some(1), Some(0));
        let board_name = snap.board.name.clone();

        let json = serde_json::to_value(assemble_board(snap, Utc::now())).unwrap();
        assert_eq!(json["name"], board_name);
        assert_eq!(json["columns"][0]["name"], "Todo");
        assert_eq!(json["columns"][0]["tasks"][0]["position"], 0);
        assert!(json["active_sprint"].is_null());
    }
}
