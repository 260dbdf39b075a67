//! Task and focus-session persistence.
//!
//! # Responsibility
//! - CRUD over the records whose completion feeds the ledger.
//!
//! # Invariants
//! - Completion is a compare-and-set: only one caller observes the
//!   incomplete-to-complete transition.
//! - Task listing is deterministic: `created_at DESC, id ASC`.

use crate::model::activity::{FocusSession, SessionId, TaskId, TaskPriority, TaskRecord};
use crate::model::ledger::UserId;
use crate::repo::{
    bool_to_int, date_to_db, parse_bool, parse_date, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    title,
    description,
    priority,
    category,
    due_date,
    estimated_time,
    completed,
    completed_at,
    created_at
FROM tasks";

const SESSION_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    duration_minutes,
    started_at,
    ended_at,
    completed
FROM focus_sessions";

/// Repository interface for event-source records.
pub trait ActivityRepository {
    fn create_task(&self, task: &TaskRecord) -> RepoResult<TaskId>;
    fn get_task(&self, user_id: UserId, task_id: TaskId) -> RepoResult<Option<TaskRecord>>;
    fn list_tasks(&self, user_id: UserId) -> RepoResult<Vec<TaskRecord>>;
    /// Marks a task completed; returns `false` when it already was.
    fn mark_task_completed(
        &self,
        user_id: UserId,
        task_id: TaskId,
        completed_at: i64,
    ) -> RepoResult<bool>;
    /// Clears a task's completion; returns `false` when it was not completed.
    fn reopen_task(&self, user_id: UserId, task_id: TaskId) -> RepoResult<bool>;
    fn delete_task(&self, user_id: UserId, task_id: TaskId) -> RepoResult<()>;
    fn create_focus_session(&self, session: &FocusSession) -> RepoResult<SessionId>;
    fn get_focus_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> RepoResult<Option<FocusSession>>;
    /// Marks a session completed; returns `false` when it already was.
    fn mark_session_completed(
        &self,
        user_id: UserId,
        session_id: SessionId,
        ended_at: i64,
    ) -> RepoResult<bool>;
}

/// SQLite-backed activity repository.
pub struct SqliteActivityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActivityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ActivityRepository for SqliteActivityRepository<'_> {
    fn create_task(&self, task: &TaskRecord) -> RepoResult<TaskId> {
        self.conn.execute(
            "INSERT INTO tasks (
                id,
                user_id,
                title,
                description,
                priority,
                category,
                due_date,
                estimated_time,
                completed,
                completed_at,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                task.id.to_string(),
                task.user_id.to_string(),
                task.title.as_str(),
                task.description.as_deref(),
                task.priority.as_str(),
                task.category.as_deref(),
                task.due_date.map(date_to_db),
                task.estimated_time,
                bool_to_int(task.completed),
                task.completed_at,
                task.created_at,
            ],
        )?;
        Ok(task.id)
    }

    fn get_task(&self, user_id: UserId, task_id: TaskId) -> RepoResult<Option<TaskRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE id = ?1
               AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![task_id.to_string(), user_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self, user_id: UserId) -> RepoResult<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE user_id = ?1
             ORDER BY created_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn mark_task_completed(
        &self,
        user_id: UserId,
        task_id: TaskId,
        completed_at: i64,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET completed = 1,
                 completed_at = ?3
             WHERE id = ?1
               AND user_id = ?2
               AND completed = 0;",
            params![task_id.to_string(), user_id.to_string(), completed_at],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        match self.get_task(user_id, task_id)? {
            Some(_) => Ok(false),
            None => Err(RepoError::not_found("task", task_id)),
        }
    }

    fn reopen_task(&self, user_id: UserId, task_id: TaskId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET completed = 0,
                 completed_at = NULL
             WHERE id = ?1
               AND user_id = ?2
               AND completed = 1;",
            params![task_id.to_string(), user_id.to_string()],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        match self.get_task(user_id, task_id)? {
            Some(_) => Ok(false),
            None => Err(RepoError::not_found("task", task_id)),
        }
    }

    fn delete_task(&self, user_id: UserId, task_id: TaskId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2;",
            params![task_id.to_string(), user_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("task", task_id));
        }
        Ok(())
    }

    fn create_focus_session(&self, session: &FocusSession) -> RepoResult<SessionId> {
        self.conn.execute(
            "INSERT INTO focus_sessions (
                id,
                user_id,
                duration_minutes,
                started_at,
                ended_at,
                completed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                session.id.to_string(),
                session.user_id.to_string(),
                session.duration_minutes,
                session.started_at,
                session.ended_at,
                bool_to_int(session.completed),
            ],
        )?;
        Ok(session.id)
    }

    fn get_focus_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> RepoResult<Option<FocusSession>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SESSION_SELECT_SQL}
             WHERE id = ?1
               AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![session_id.to_string(), user_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_session_row(row)?));
        }
        Ok(None)
    }

    fn mark_session_completed(
        &self,
        user_id: UserId,
        session_id: SessionId,
        ended_at: i64,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE focus_sessions
             SET completed = 1,
                 ended_at = ?3
             WHERE id = ?1
               AND user_id = ?2
               AND completed = 0;",
            params![session_id.to_string(), user_id.to_string(), ended_at],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        match self.get_focus_session(user_id, session_id)? {
            Some(_) => Ok(false),
            None => Err(RepoError::not_found("focus session", session_id)),
        }
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<TaskRecord> {
    let id_text: String = row.get("id")?;
    let user_text: String = row.get("user_id")?;
    let priority_text: String = row.get("priority")?;
    let priority = TaskPriority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid priority `{priority_text}` in tasks.priority"))
    })?;
    let due_date = match row.get::<_, Option<String>>("due_date")? {
        Some(value) => Some(parse_date(&value, "tasks.due_date")?),
        None => None,
    };

    Ok(TaskRecord {
        id: parse_uuid(&id_text, "tasks.id")?,
        user_id: parse_uuid(&user_text, "tasks.user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority,
        category: row.get("category")?,
        due_date,
        estimated_time: row.get("estimated_time")?,
        completed: parse_bool(row.get("completed")?, "tasks.completed")?,
        completed_at: row.get("completed_at")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_session_row(row: &Row<'_>) -> RepoResult<FocusSession> {
    let id_text: String = row.get("id")?;
    let user_text: String = row.get("user_id")?;
    Ok(FocusSession {
        id: parse_uuid(&id_text, "focus_sessions.id")?,
        user_id: parse_uuid(&user_text, "focus_sessions.user_id")?,
        duration_minutes: row.get("duration_minutes")?,
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        completed: parse_bool(row.get("completed")?, "focus_sessions.completed")?,
    })
}
