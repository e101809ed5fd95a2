//! Task ordering within board columns.
//!
//! Stored positions are only a sort key. [`BoardOrdering`] loads the current
//! order of every column on a board, applies a move or a reorder in memory,
//! and reports the columns whose order changed so they can be rewritten with
//! dense positions `0..n-1`.

use projecthub_core::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    board::BoardId,
    column::{sorted_board_columns, Column, ColumnId},
    task::{Task, TaskId},
};

/// Persisted rank of a task inside one column of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBoardPosition {
    pub board_id: BoardId,
    pub column_id: ColumnId,
    pub task_id: TaskId,
    pub position: i32,
}

/// The complete new order of one column, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPositions {
    pub column_id: ColumnId,
    pub task_ids: Vec<TaskId>,
}

impl ColumnPositions {
    pub fn to_rows(&self, board_id: BoardId) -> Vec<TaskBoardPosition> {
        self.task_ids
            .iter()
            .enumerate()
            .map(|(index, task_id)| TaskBoardPosition {
                board_id,
                column_id: self.column_id,
                task_id: *task_id,
                position: index as i32,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct BoardOrdering {
    board_id: BoardId,
    column_order: Vec<ColumnId>,
    columns: HashMap<ColumnId, Vec<TaskId>>,
    changed: BTreeSet<ColumnId>,
}

impl BoardOrdering {
    /// Build the current order of every column on `board_id`.
    ///
    /// A task sits in the column named by its `column_id`. Tasks with a
    /// position row for that column come first, ascending by position; the
    /// rest follow by creation time, then id. Position rows that disagree
    /// with the task's column are stale and ignored.
    pub fn from_board(
        board_id: BoardId,
        columns: &[Column],
        tasks: &[Task],
        positions: &[TaskBoardPosition],
    ) -> Self {
        let column_order: Vec<ColumnId> = sorted_board_columns(board_id, columns)
            .into_iter()
            .map(|c| c.id)
            .collect();

        let ranks: HashMap<TaskId, &TaskBoardPosition> = positions
            .iter()
            .filter(|p| p.board_id == board_id)
            .map(|p| (p.task_id, p))
            .collect();

        let mut columns: HashMap<ColumnId, Vec<&Task>> =
            column_order.iter().map(|id| (*id, Vec::new())).collect();
        for task in tasks {
            if let Some(bucket) = task.column_id.and_then(|id| columns.get_mut(&id)) {
                bucket.push(task);
            }
        }

        let columns: HashMap<ColumnId, Vec<TaskId>> = columns
            .into_iter()
            .map(|(column_id, mut bucket)| {
                bucket.sort_by_key(|task| {
                    let rank = ranks
                        .get(&task.id)
                        .filter(|p| p.column_id == column_id)
                        .map(|p| p.position);
                    (rank.is_none(), rank, task.created_at, task.id)
                });
                (column_id, bucket.into_iter().map(|t| t.id).collect::<Vec<_>>())
            })
            .collect();

        Self {
            board_id,
            column_order,
            columns,
            changed: BTreeSet::new(),
        }
    }

    /// Column ids in display order.
    pub fn column_ids(&self) -> &[ColumnId] {
        &self.column_order
    }

    pub fn column(&self, column_id: ColumnId) -> Option<&[TaskId]> {
        self.columns.get(&column_id).map(|v| v.as_slice())
    }

    pub fn column_of(&self, task_id: TaskId) -> Option<ColumnId> {
        self.columns
            .iter()
            .find(|(_, ids)| ids.contains(&task_id))
            .map(|(column_id, _)| *column_id)
    }

    fn ensure_column(&self, column_id: ColumnId) -> HubResult<()> {
        if self.columns.contains_key(&column_id) {
            Ok(())
        } else {
            Err(HubError::Validation(format!(
                "column {} does not belong to board {}",
                column_id, self.board_id
            )))
        }
    }

    fn detach(&mut self, task_id: TaskId) {
        if let Some(column_id) = self.column_of(task_id) {
            if let Some(ids) = self.columns.get_mut(&column_id) {
                ids.retain(|id| *id != task_id);
            }
            self.changed.insert(column_id);
        }
    }

    /// Move one task into `column_id` at `position`.
    ///
    /// The position is an index into the target column after the task has
    /// been taken out of its old place; values past the end append.
    pub fn move_task(
        &mut self,
        task_id: TaskId,
        column_id: ColumnId,
        position: usize,
    ) -> HubResult<()> {
        self.ensure_column(column_id)?;
        self.detach(task_id);

        let ids = self
            .columns
            .get_mut(&column_id)
            .ok_or_else(|| HubError::Internal("column vanished during move".into()))?;
        let index = position.min(ids.len());
        ids.insert(index, task_id);
        self.changed.insert(column_id);
        Ok(())
    }

    /// Set `column_id` to start with exactly `requested`.
    ///
    /// Tasks already in the column but missing from `requested` keep their
    /// relative order after the listed ones. Listed tasks that sit in
    /// another column are pulled out of it.
    pub fn reorder_column(&mut self, column_id: ColumnId, requested: &[TaskId]) -> HubResult<()> {
        self.ensure_column(column_id)?;

        let mut seen = HashSet::with_capacity(requested.len());
        if let Some(dup) = requested.iter().find(|id| !seen.insert(**id)) {
            return Err(HubError::Validation(format!(
                "task {} appears more than once in the requested order",
                dup
            )));
        }

        for task_id in requested {
            if self.column_of(*task_id) != Some(column_id) {
                self.detach(*task_id);
            }
        }

        let ids = self
            .columns
            .get_mut(&column_id)
            .ok_or_else(|| HubError::Internal("column vanished during reorder".into()))?;
        let remainder: Vec<TaskId> = ids.iter().filter(|id| !seen.contains(*id)).copied().collect();
        let mut reordered = requested.to_vec();
        reordered.extend(remainder);
        *ids = reordered;
        self.changed.insert(column_id);
        Ok(())
    }

    /// Columns touched since construction, with their full new order.
    pub fn changes(&self) -> Vec<ColumnPositions> {
        self.changed
            .iter()
            .filter_map(|column_id| {
                self.columns.get(column_id).map(|ids| ColumnPositions {
                    column_id: *column_id,
                    task_ids: ids.clone(),
                })
            })
            .collect()
    }
}
