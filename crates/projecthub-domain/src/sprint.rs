use chrono::{DateTime, Utc};
use projecthub_core::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{board::BoardId, principal::UserId, task::TaskId};

pub type SprintId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    Planned,
    Active,
    Completed,
    Cancelled,
}

impl SprintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: SprintStatus) -> bool {
        matches!(
            (self, next),
            (Self::Planned, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Planned, Self::Cancelled)
                | (Self::Active, Self::Cancelled)
        )
    }

    /// Whether tasks may still be added to or removed from the sprint.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Planned | Self::Active)
    }
}

impl fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SprintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(Self::Planned),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown sprint status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: SprintId,
    pub board_id: BoardId,
    pub name: String,
    pub goal: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: SprintStatus,
    pub completed_date: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sprint together with the ids of the tasks it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintWithTasks {
    #[serde(flatten)]
    pub sprint: Sprint,
    pub task_ids: Vec<TaskId>,
}

impl Sprint {
    pub fn new(
        board_id: BoardId,
        name: String,
        goal: Option<String>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        created_by: UserId,
    ) -> HubResult<Self> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(HubError::Validation("sprint name must not be empty".into()));
        }
        validate_dates(start_date, end_date)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            board_id,
            name,
            goal,
            start_date,
            end_date,
            status: SprintStatus::Planned,
            completed_date: None,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    fn transition(&mut self, next: SprintStatus) -> HubResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(HubError::Conflict(format!(
                "sprint {} cannot go from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move a planned sprint to active. A missing start date becomes `now`.
    pub fn start(&mut self, now: DateTime<Utc>) -> HubResult<()> {
        self.transition(SprintStatus::Active)?;
        if self.start_date.is_none() {
            self.start_date = Some(now);
        }
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> HubResult<()> {
        self.transition(SprintStatus::Completed)?;
        self.completed_date = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self) -> HubResult<()> {
        self.transition(SprintStatus::Cancelled)
    }

    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        if self.status != SprintStatus::Active {
            return false;
        }
        self.end_date.is_some_and(|end| now > end)
    }
}

fn validate_dates(
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
) -> HubResult<()> {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            return Err(HubError::Validation(
                "sprint end date must not be before its start date".into(),
            ));
        }
    }
    Ok(())
}
