//! Event-source records: tasks and focus sessions.
//!
//! # Responsibility
//! - Define the records whose completion produces ledger events.
//! - Validate user-provided task and session fields.
//!
//! # Invariants
//! - Record ids are stable and double as event `source_id`s.
//! - `completed_at` is set iff `completed` is true.

use crate::model::event::MAX_FOCUS_MINUTES;
use crate::model::ledger::UserId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type TaskId = Uuid;
pub type SessionId = Uuid;

/// Default focus phase length in minutes.
pub const DEFAULT_FOCUS_MINUTES: u32 = 25;
const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Invalid task or session input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityValidationError {
    EmptyTitle,
    TitleTooLong(usize),
    InvalidEstimate(u32),
    InvalidSessionLength(u32),
}

impl Display for ActivityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title cannot be empty"),
            Self::TitleTooLong(len) => write!(
                f,
                "task title has {len} characters; limit is {MAX_TITLE_CHARS}"
            ),
            Self::InvalidEstimate(minutes) => {
                write!(f, "estimated time must be positive, got {minutes}")
            }
            Self::InvalidSessionLength(minutes) => write!(
                f,
                "focus session must be between 1 and {MAX_FOCUS_MINUTES} minutes, got {minutes}"
            ),
        }
    }
}

impl Error for ActivityValidationError {}

/// User task that grants a reward on first completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Estimated effort in minutes.
    pub estimated_time: Option<u32>,
    pub completed: bool,
    /// Epoch milliseconds.
    pub completed_at: Option<i64>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub estimated_time: Option<u32>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ActivityValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ActivityValidationError::EmptyTitle);
        }
        let len = title.chars().count();
        if len > MAX_TITLE_CHARS {
            return Err(ActivityValidationError::TitleTooLong(len));
        }
        if let Some(0) = self.estimated_time {
            return Err(ActivityValidationError::InvalidEstimate(0));
        }
        Ok(())
    }

    /// Materializes the input into a record owned by `user_id`.
    pub fn into_record(self, user_id: UserId, created_at: i64) -> TaskRecord {
        TaskRecord {
            id: Uuid::new_v4(),
            user_id,
            title: self.title.trim().to_string(),
            description: non_blank(self.description),
            priority: self.priority,
            category: non_blank(self.category),
            due_date: self.due_date,
            estimated_time: self.estimated_time,
            completed: false,
            completed_at: None,
            created_at,
        }
    }
}

/// Focus session started from the Pomodoro timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSession {
    pub id: SessionId,
    pub user_id: UserId,
    /// Planned focus length in minutes.
    pub duration_minutes: u32,
    /// Epoch milliseconds.
    pub started_at: i64,
    /// Epoch milliseconds; set on completion.
    pub ended_at: Option<i64>,
    pub completed: bool,
}

impl FocusSession {
    pub fn start(
        user_id: UserId,
        duration_minutes: u32,
        started_at: i64,
    ) -> Result<Self, ActivityValidationError> {
        if duration_minutes == 0 || duration_minutes > MAX_FOCUS_MINUTES {
            return Err(ActivityValidationError::InvalidSessionLength(
                duration_minutes,
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            duration_minutes,
            started_at,
            ended_at: None,
            completed: false,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
