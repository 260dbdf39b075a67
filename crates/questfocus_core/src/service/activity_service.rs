//! Task and focus-session use cases that emit ledger events.
//!
//! # Responsibility
//! - Persist tasks and focus sessions.
//! - Turn completions into `TaskCompleted` / `PomodoroCompleted` events keyed
//!   by the record id.
//!
//! # Invariants
//! - The record flips to completed before its reward is requested; a retry
//!   after a crash re-requests the reward and the processor pays it once.
//! - Completing an already rewarded record yields `DuplicateEvent`.
//! - Reopening a task never revokes its reward; completing it again pays
//!   nothing.

use crate::model::activity::{
    ActivityValidationError, FocusSession, NewTask, SessionId, TaskId, TaskRecord,
};
use crate::model::event::DomainEvent;
use crate::model::ledger::UserId;
use crate::repo::activity_repo::ActivityRepository;
use crate::repo::ledger_repo::LedgerRepository;
use crate::repo::RepoError;
use crate::reward::engine::AppliedDelta;
use crate::service::event_processor::{EventProcessor, ProcessError};
use crate::service::now_epoch_ms;
use chrono::NaiveDate;
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ActivityError {
    Validation(ActivityValidationError),
    NotFound { entity: &'static str, id: String },
    Process(ProcessError),
    Repo(RepoError),
}

impl Display for ActivityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Process(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "activity store unavailable: {err}"),
        }
    }
}

impl Error for ActivityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Process(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<ActivityValidationError> for ActivityError {
    fn from(value: ActivityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ProcessError> for ActivityError {
    fn from(value: ProcessError) -> Self {
        Self::Process(value)
    }
}

impl From<RepoError> for ActivityError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

/// Use-case service over tasks and focus sessions.
pub struct ActivityService<A: ActivityRepository, L: LedgerRepository> {
    activity: A,
    processor: EventProcessor<L>,
}

impl<A: ActivityRepository, L: LedgerRepository> ActivityService<A, L> {
    pub fn new(activity: A, processor: EventProcessor<L>) -> Self {
        Self {
            activity,
            processor,
        }
    }

    pub fn create_task(&self, user_id: UserId, input: NewTask) -> Result<TaskRecord, ActivityError> {
        input.validate()?;
        let task = input.into_record(user_id, now_epoch_ms());
        self.activity.create_task(&task)?;
        Ok(task)
    }

    pub fn list_tasks(&self, user_id: UserId) -> Result<Vec<TaskRecord>, ActivityError> {
        Ok(self.activity.list_tasks(user_id)?)
    }

    pub fn delete_task(&self, user_id: UserId, task_id: TaskId) -> Result<(), ActivityError> {
        Ok(self.activity.delete_task(user_id, task_id)?)
    }

    /// Checks off a task and grants its reward once.
    pub fn complete_task(
        &self,
        user_id: UserId,
        task_id: TaskId,
        today: NaiveDate,
    ) -> Result<AppliedDelta, ActivityError> {
        self.activity
            .mark_task_completed(user_id, task_id, now_epoch_ms())?;
        let delta = self.processor.process_with_retry(
            user_id,
            &DomainEvent::task_completed(task_id.to_string()),
            today,
        )?;
        info!(
            "event=task_complete module=activity status=ok user_id={} task_id={}",
            user_id, task_id
        );
        Ok(delta)
    }

    /// Unchecks a task. Returns the stored record.
    pub fn reopen_task(
        &self,
        user_id: UserId,
        task_id: TaskId,
    ) -> Result<TaskRecord, ActivityError> {
        let reopened = self.activity.reopen_task(user_id, task_id)?;
        debug!(
            "event=task_reopen module=activity status=ok user_id={} task_id={} changed={}",
            user_id, task_id, reopened
        );
        self.activity
            .get_task(user_id, task_id)?
            .ok_or_else(|| ActivityError::NotFound {
                entity: "task",
                id: task_id.to_string(),
            })
    }

    pub fn start_focus_session(
        &self,
        user_id: UserId,
        duration_minutes: u32,
    ) -> Result<FocusSession, ActivityError> {
        let session = FocusSession::start(user_id, duration_minutes, now_epoch_ms())?;
        self.activity.create_focus_session(&session)?;
        Ok(session)
    }

    /// Finishes a focus session and grants its reward once.
    pub fn complete_focus_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
        today: NaiveDate,
    ) -> Result<AppliedDelta, ActivityError> {
        let session = self
            .activity
            .get_focus_session(user_id, session_id)?
            .ok_or_else(|| ActivityError::NotFound {
                entity: "focus session",
                id: session_id.to_string(),
            })?;
        self.activity
            .mark_session_completed(user_id, session_id, now_epoch_ms())?;
        let delta = self.processor.process_with_retry(
            user_id,
            &DomainEvent::pomodoro_completed(session_id.to_string(), session.duration_minutes),
            today,
        )?;
        info!(
            "event=focus_complete module=activity status=ok user_id={} session_id={} minutes={}",
            user_id, session_id, session.duration_minutes
        );
        Ok(delta)
    }
}
