use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use projecthub_core::{HubError, HubResult};
use projecthub_domain::{
    Board, BoardId, BoardTaskRow, Column, ColumnId, ColumnPositions, ProjectId, ScrumBoardStore,
    Sprint, SprintId, SprintMembership, SprintStatus, Task, TaskBoardPosition, TaskId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../schema.sql");

const TASK_COLUMNS: &str = "id, project_id, column_id, title, description, status, priority,
    assignees, due_date, created_at, updated_at";

const SPRINT_COLUMNS: &str = "id, board_id, name, goal, start_date, end_date, status,
    completed_date, created_by, created_at, updated_at";

pub struct SqliteStore {
    url: String,
    max_connections: u32,
    pool: tokio::sync::OnceCell<Pool<Sqlite>>,
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_uuid(value: &str) -> HubResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| HubError::Serialization(e.to_string()))
}

fn parse_time(value: &str) -> HubResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| HubError::Serialization(e.to_string()))
}

fn parse_opt_uuid(value: Option<String>) -> HubResult<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

fn parse_opt_time(value: Option<String>) -> HubResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

fn parse_enum<T: FromStr<Err = String>>(value: &str) -> HubResult<T> {
    value.parse().map_err(HubError::Serialization)
}

fn parse_assignees(value: &str) -> HubResult<Vec<Uuid>> {
    serde_json::from_str(value).map_err(|e| HubError::Serialization(e.to_string()))
}

fn row_to_board(row: &SqliteRow) -> HubResult<Board> {
    Ok(Board {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        project_id: parse_uuid(&row.get::<String, _>("project_id"))?,
        name: row.get("name"),
        description: row.get("description"),
        owner_id: parse_uuid(&row.get::<String, _>("owner_id"))?,
        created_at: parse_time(&row.get::<String, _>("created_at"))?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_column(row: &SqliteRow) -> HubResult<Column> {
    Ok(Column {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        board_id: parse_uuid(&row.get::<String, _>("board_id"))?,
        name: row.get("name"),
        position: row.get("position"),
        wip_limit: row.get("wip_limit"),
        created_at: parse_time(&row.get::<String, _>("created_at"))?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_task(row: &SqliteRow) -> HubResult<Task> {
    Ok(Task {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        project_id: parse_uuid(&row.get::<String, _>("project_id"))?,
        column_id: parse_opt_uuid(row.get("column_id"))?,
        title: row.get("title"),
        description: row.get("description"),
        status: parse_enum(&row.get::<String, _>("status"))?,
        priority: parse_enum(&row.get::<String, _>("priority"))?,
        assignees: parse_assignees(&row.get::<String, _>("assignees"))?,
        due_date: parse_opt_time(row.get("due_date"))?,
        created_at: parse_time(&row.get::<String, _>("created_at"))?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_sprint(row: &SqliteRow) -> HubResult<Sprint> {
    Ok(Sprint {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        board_id: parse_uuid(&row.get::<String, _>("board_id"))?,
        name: row.get("name"),
        goal: row.get("goal"),
        start_date: parse_opt_time(row.get("start_date"))?,
        end_date: parse_opt_time(row.get("end_date"))?,
        status: parse_enum(&row.get::<String, _>("status"))?,
        completed_date: parse_opt_time(row.get("completed_date"))?,
        created_by: parse_uuid(&row.get::<String, _>("created_by"))?,
        created_at: parse_time(&row.get::<String, _>("created_at"))?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_task_row(row: &SqliteRow) -> HubResult<BoardTaskRow> {
    Ok(BoardTaskRow {
        task_id: parse_uuid(&row.get::<String, _>("task_id"))?,
        title: row.get("title"),
        status: parse_enum(&row.get::<String, _>("status"))?,
        priority: parse_enum(&row.get::<String, _>("priority"))?,
        due_date: parse_opt_time(row.get("due_date"))?,
        assignees: parse_assignees(&row.get::<String, _>("assignees"))?,
        column_id: parse_opt_uuid(row.get("column_id"))?,
        column_name: row.get("column_name"),
        position: row.get("position"),
        sprint_id: parse_opt_uuid(row.get("sprint_id"))?,
        sprint_name: row.get("sprint_name"),
    })
}

async fn insert_task_row(conn: &mut SqliteConnection, task: &Task) -> HubResult<()> {
    let assignees = serde_json::to_string(&task.assignees)
        .map_err(|e| HubError::Serialization(e.to_string()))?;

    sqlx::query(
        "INSERT INTO tasks (id, project_id, column_id, title, description, status, priority,
            assignees, due_date, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task.id.to_string())
    .bind(task.project_id.to_string())
    .bind(task.column_id.map(|id| id.to_string()))
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.priority.as_str())
    .bind(&assignees)
    .bind(task.due_date.as_ref().map(timestamp))
    .bind(timestamp(&task.created_at))
    .bind(timestamp(&task.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| HubError::Database(e.to_string()))?;
    Ok(())
}

/// Write dense positions for every listed column and point each task at the
/// column it is listed under. Returns the number of position rows written.
async fn write_ordering(
    conn: &mut SqliteConnection,
    board_id: BoardId,
    columns: &[ColumnPositions],
) -> HubResult<usize> {
    let now = timestamp(&Utc::now());
    let mut written = 0usize;
    for column in columns {
        for row in column.to_rows(board_id) {
            let task_id = row.task_id.to_string();
            let column_id = row.column_id.to_string();

            sqlx::query(
                "INSERT INTO task_board_positions (board_id, column_id, task_id, position)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(board_id, task_id) DO UPDATE SET
                    column_id = excluded.column_id,
                    position = excluded.position",
            )
            .bind(board_id.to_string())
            .bind(&column_id)
            .bind(&task_id)
            .bind(row.position)
            .execute(&mut *conn)
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;

            sqlx::query(
                "UPDATE tasks SET column_id = ?, updated_at = ?
                 WHERE id = ? AND column_id IS NOT ?",
            )
            .bind(&column_id)
            .bind(&now)
            .bind(&task_id)
            .bind(&column_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;

            sqlx::query("DELETE FROM task_board_positions WHERE task_id = ? AND board_id != ?")
                .bind(&task_id)
                .bind(board_id.to_string())
                .execute(&mut *conn)
                .await
                .map_err(|e| HubError::Database(e.to_string()))?;

            written += 1;
        }
    }
    Ok(written)
}

/// Bump `updated_at` of a planned or active sprint. Taking the write lock
/// here keeps a concurrent completion from slipping in before the
/// membership change commits.
async fn touch_open_sprint(
    conn: &mut SqliteConnection,
    sprint_id: SprintId,
    now: &str,
) -> HubResult<()> {
    let result = sqlx::query(
        "UPDATE sprints SET updated_at = ? WHERE id = ? AND status IN ('planned', 'active')",
    )
    .bind(now)
    .bind(sprint_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| HubError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(HubError::Conflict(format!(
            "sprint {} is missing or no longer accepts changes",
            sprint_id
        )));
    }
    Ok(())
}

impl SqliteStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_max_connections(url, 5)
    }

    pub fn with_max_connections(url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            url: url.into(),
            max_connections: max_connections.max(1),
            pool: tokio::sync::OnceCell::new(),
        }
    }

    /// A private in-memory database, mostly for tests.
    pub fn in_memory() -> Self {
        Self::with_max_connections("sqlite::memory:", 1)
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    async fn get_pool(&self) -> HubResult<&Pool<Sqlite>> {
        self.pool
            .get_or_try_init(|| async {
                let options = SqliteConnectOptions::from_str(&self.url)
                    .map_err(|e| HubError::Database(e.to_string()))?
                    .create_if_missing(true)
                    .foreign_keys(true);

                // Every connection to `:memory:` opens a separate database, so
                // the single connection must never be recycled.
                let pool_options = if self.is_memory() {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                } else {
                    SqlitePoolOptions::new().max_connections(self.max_connections)
                };

                let pool = pool_options
                    .connect_with(options)
                    .await
                    .map_err(|e| HubError::Database(e.to_string()))?;

                sqlx::raw_sql(SCHEMA)
                    .execute(&pool)
                    .await
                    .map_err(|e| HubError::Database(e.to_string()))?;

                tracing::info!("Opened SQLite database at {}", self.url);
                Ok::<_, HubError>(pool)
            })
            .await
    }

    /// Open the pool and apply the schema without waiting for the first query.
    pub async fn connect(&self) -> HubResult<()> {
        self.get_pool().await.map(|_| ())
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

#[async_trait]
impl ScrumBoardStore for SqliteStore {
    async fn create_board(&self, board: &Board, columns: &[Column]) -> HubResult<()> {
        let pool = self.get_pool().await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;

        sqlx::query(
            "INSERT INTO boards (id, project_id, name, description, owner_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(board.id.to_string())
        .bind(board.project_id.to_string())
        .bind(&board.name)
        .bind(&board.description)
        .bind(board.owner_id.to_string())
        .bind(timestamp(&board.created_at))
        .bind(timestamp(&board.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?;

        for column in columns {
            sqlx::query(
                "INSERT INTO columns (id, board_id, name, position, wip_limit, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(column.id.to_string())
            .bind(column.board_id.to_string())
            .bind(&column.name)
            .bind(column.position)
            .bind(column.wip_limit)
            .bind(timestamp(&column.created_at))
            .bind(timestamp(&column.updated_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_board(&self, board_id: BoardId) -> HubResult<Option<Board>> {
        let pool = self.get_pool().await?;
        sqlx::query(
            "SELECT id, project_id, name, description, owner_id, created_at, updated_at
             FROM boards WHERE id = ?",
        )
        .bind(board_id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?
        .map(|row| row_to_board(&row))
        .transpose()
    }

    async fn insert_column(&self, column: &Column) -> HubResult<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            "INSERT INTO columns (id, board_id, name, position, wip_limit, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(column.id.to_string())
        .bind(column.board_id.to_string())
        .bind(&column.name)
        .bind(column.position)
        .bind(column.wip_limit)
        .bind(timestamp(&column.created_at))
        .bind(timestamp(&column.updated_at))
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_column(&self, column_id: ColumnId) -> HubResult<Option<Column>> {
        let pool = self.get_pool().await?;
        sqlx::query(
            "SELECT id, board_id, name, position, wip_limit, created_at, updated_at
             FROM columns WHERE id = ?",
        )
        .bind(column_id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?
        .map(|row| row_to_column(&row))
        .transpose()
    }

    async fn list_columns(&self, board_id: BoardId) -> HubResult<Vec<Column>> {
        let pool = self.get_pool().await?;
        sqlx::query(
            "SELECT id, board_id, name, position, wip_limit, created_at, updated_at
             FROM columns WHERE board_id = ? ORDER BY position, created_at",
        )
        .bind(board_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?
        .iter()
        .map(row_to_column)
        .collect()
    }

    async fn insert_task(
        &self,
        task: &Task,
        board_id: BoardId,
        ordering: &[ColumnPositions],
    ) -> HubResult<()> {
        let pool = self.get_pool().await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;

        insert_task_row(&mut tx, task).await?;
        write_ordering(&mut tx, board_id, ordering).await?;

        tx.commit()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_tasks(&self, task_ids: &[TaskId]) -> HubResult<Vec<Task>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.get_pool().await?;
        let placeholders = vec!["?"; task_ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM tasks WHERE id IN ({})",
            TASK_COLUMNS, placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in task_ids {
            query = query.bind(id.to_string());
        }
        query
            .fetch_all(pool)
            .await
            .map_err(|e| HubError::Database(e.to_string()))?
            .iter()
            .map(row_to_task)
            .collect()
    }

    async fn list_project_tasks(&self, project_id: ProjectId) -> HubResult<Vec<Task>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "SELECT {} FROM tasks WHERE project_id = ? ORDER BY created_at, id",
            TASK_COLUMNS
        ))
        .bind(project_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?
        .iter()
        .map(row_to_task)
        .collect()
    }

    async fn list_positions(&self, board_id: BoardId) -> HubResult<Vec<TaskBoardPosition>> {
        let pool = self.get_pool().await?;
        sqlx::query(
            "SELECT board_id, column_id, task_id, position FROM task_board_positions
             WHERE board_id = ? ORDER BY column_id, position",
        )
        .bind(board_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?
        .iter()
        .map(|row| {
            Ok(TaskBoardPosition {
                board_id: parse_uuid(&row.get::<String, _>("board_id"))?,
                column_id: parse_uuid(&row.get::<String, _>("column_id"))?,
                task_id: parse_uuid(&row.get::<String, _>("task_id"))?,
                position: row.get("position"),
            })
        })
        .collect()
    }

    async fn save_ordering(&self, board_id: BoardId, columns: &[ColumnPositions]) -> HubResult<()> {
        let pool = self.get_pool().await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;

        let written = write_ordering(&mut tx, board_id, columns).await?;

        tx.commit()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;
        tracing::debug!(
            "Rewrote {} positions across {} columns on board {}",
            written,
            columns.len(),
            board_id
        );
        Ok(())
    }

    async fn insert_sprint(&self, sprint: &Sprint) -> HubResult<()> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "INSERT INTO sprints ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            SPRINT_COLUMNS
        ))
        .bind(sprint.id.to_string())
        .bind(sprint.board_id.to_string())
        .bind(&sprint.name)
        .bind(&sprint.goal)
        .bind(sprint.start_date.as_ref().map(timestamp))
        .bind(sprint.end_date.as_ref().map(timestamp))
        .bind(sprint.status.as_str())
        .bind(sprint.completed_date.as_ref().map(timestamp))
        .bind(sprint.created_by.to_string())
        .bind(timestamp(&sprint.created_at))
        .bind(timestamp(&sprint.updated_at))
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_sprint(&self, sprint_id: SprintId) -> HubResult<Option<Sprint>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!("SELECT {} FROM sprints WHERE id = ?", SPRINT_COLUMNS))
            .bind(sprint_id.to_string())
            .fetch_optional(pool)
            .await
            .map_err(|e| HubError::Database(e.to_string()))?
            .map(|row| row_to_sprint(&row))
            .transpose()
    }

    async fn update_sprint(&self, sprint: &Sprint, expected: SprintStatus) -> HubResult<()> {
        let pool = self.get_pool().await?;
        let result = sqlx::query(
            "UPDATE sprints SET name = ?, goal = ?, start_date = ?, end_date = ?, status = ?,
                completed_date = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(&sprint.name)
        .bind(&sprint.goal)
        .bind(sprint.start_date.as_ref().map(timestamp))
        .bind(sprint.end_date.as_ref().map(timestamp))
        .bind(sprint.status.as_str())
        .bind(sprint.completed_date.as_ref().map(timestamp))
        .bind(timestamp(&sprint.updated_at))
        .bind(sprint.id.to_string())
        .bind(expected.as_str())
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            let current = self
                .get_sprint(sprint.id)
                .await?
                .ok_or_else(|| HubError::not_found("sprint", sprint.id))?;
            return Err(HubError::Conflict(format!(
                "sprint {} is {}, expected {}",
                sprint.id, current.status, expected
            )));
        }
        Ok(())
    }

    async fn list_sprints(&self, board_id: BoardId) -> HubResult<Vec<Sprint>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "SELECT {} FROM sprints WHERE board_id = ? ORDER BY created_at, id",
            SPRINT_COLUMNS
        ))
        .bind(board_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?
        .iter()
        .map(row_to_sprint)
        .collect()
    }

    async fn add_sprint_tasks(&self, sprint_id: SprintId, task_ids: &[TaskId]) -> HubResult<()> {
        let pool = self.get_pool().await?;
        let now = timestamp(&Utc::now());
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;

        touch_open_sprint(&mut tx, sprint_id, &now).await?;
        for task_id in task_ids {
            sqlx::query(
                "INSERT INTO sprint_tasks (task_id, sprint_id, added_at) VALUES (?, ?, ?)
                 ON CONFLICT(task_id) DO UPDATE SET
                    sprint_id = excluded.sprint_id,
                    added_at = excluded.added_at
                 WHERE sprint_tasks.sprint_id != excluded.sprint_id",
            )
            .bind(task_id.to_string())
            .bind(sprint_id.to_string())
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;
        Ok(())
    }

    async fn remove_sprint_task(&self, sprint_id: SprintId, task_id: TaskId) -> HubResult<bool> {
        let pool = self.get_pool().await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;

        touch_open_sprint(&mut tx, sprint_id, &timestamp(&Utc::now())).await?;
        let result = sqlx::query("DELETE FROM sprint_tasks WHERE sprint_id = ? AND task_id = ?")
            .bind(sprint_id.to_string())
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| HubError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn sprint_task_ids(&self, sprint_id: SprintId) -> HubResult<Vec<TaskId>> {
        let pool = self.get_pool().await?;
        sqlx::query("SELECT task_id FROM sprint_tasks WHERE sprint_id = ? ORDER BY added_at, rowid")
            .bind(sprint_id.to_string())
            .fetch_all(pool)
            .await
            .map_err(|e| HubError::Database(e.to_string()))?
            .iter()
            .map(|row| parse_uuid(&row.get::<String, _>("task_id")))
            .collect()
    }

    async fn list_sprint_memberships(&self, board_id: BoardId) -> HubResult<Vec<SprintMembership>> {
        let pool = self.get_pool().await?;
        sqlx::query(
            "SELECT st.sprint_id, st.task_id FROM sprint_tasks st
             JOIN sprints s ON s.id = st.sprint_id
             WHERE s.board_id = ?",
        )
        .bind(board_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?
        .iter()
        .map(|row| {
            Ok(SprintMembership {
                sprint_id: parse_uuid(&row.get::<String, _>("sprint_id"))?,
                task_id: parse_uuid(&row.get::<String, _>("task_id"))?,
            })
        })
        .collect()
    }

    async fn list_task_rows(&self, board_id: BoardId) -> HubResult<Vec<BoardTaskRow>> {
        let pool = self.get_pool().await?;
        sqlx::query(
            "SELECT task_id, title, status, priority, due_date, assignees, column_id, column_name,
                    position, sprint_id, sprint_name
             FROM board_task_rows
             WHERE board_id = ?
             ORDER BY column_position IS NULL, column_position, position IS NULL, position,
                      created_at, task_id",
        )
        .bind(board_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| HubError::Database(e.to_string()))?
        .iter()
        .map(row_to_task_row)
        .collect()
    }
}
