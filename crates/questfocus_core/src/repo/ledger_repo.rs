//! Ledger store: persisted progression state and the applied-event log.
//!
//! # Responsibility
//! - Load and provision per-user ledgers.
//! - Commit a new ledger state together with its event record, guarded by the
//!   ledger version.
//! - Answer per-day activity aggregates from the applied-event log.
//!
//! # Invariants
//! - A commit succeeds only when the stored version equals the version the
//!   caller read; the stored version then increments by one.
//! - `(user_id, source_kind, source_id)` is unique in `applied_events`, so a
//!   replay can never be applied twice, even across connections.
//! - The stored `level` column always equals `xp / 100 + 1`.

use crate::model::event::{DomainEvent, EventKind};
use crate::model::ledger::{level_for_xp, Ledger, UserId};
use crate::model::quest::DayActivity;
use crate::repo::{
    date_to_db, is_constraint_violation, parse_date, parse_uuid, RepoError, RepoResult,
};
use crate::reward::engine::AppliedDelta;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};

const LEDGER_SELECT_SQL: &str = "SELECT
    user_id,
    xp,
    level,
    gems,
    current_streak,
    last_activity_date,
    total_focus_time,
    total_tasks_completed,
    version
FROM ledgers";

/// Write request produced by one successful reward application.
#[derive(Debug, Clone, Copy)]
pub struct LedgerCommit<'a> {
    /// Version observed when the ledger was loaded.
    pub expected_version: i64,
    /// New state computed by the reward engine.
    pub ledger: &'a Ledger,
    pub event: &'a DomainEvent,
    pub delta: &'a AppliedDelta,
    /// Calendar day the event is attributed to.
    pub occurred_on: NaiveDate,
}

/// Focus minutes recorded for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyFocus {
    pub day: NaiveDate,
    pub minutes: u32,
    pub sessions: u32,
}

/// Repository interface for ledger state.
pub trait LedgerRepository {
    /// Creates an empty ledger; returns the existing one if already provisioned.
    fn create_ledger(&self, user_id: UserId) -> RepoResult<Ledger>;
    fn get_ledger(&self, user_id: UserId) -> RepoResult<Option<Ledger>>;
    /// Persists a new ledger state and its event record atomically.
    fn commit(&self, commit: &LedgerCommit<'_>) -> RepoResult<Ledger>;
    fn is_event_applied(
        &self,
        user_id: UserId,
        kind: EventKind,
        source_id: &str,
    ) -> RepoResult<bool>;
    /// Activity counters for one user and day.
    fn day_activity(&self, user_id: UserId, day: NaiveDate) -> RepoResult<DayActivity>;
    /// Zero-filled focus totals for each day in `[from, to]`.
    fn focus_by_day(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<DailyFocus>>;
}

/// SQLite-backed ledger repository.
pub struct SqliteLedgerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLedgerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LedgerRepository for SqliteLedgerRepository<'_> {
    fn create_ledger(&self, user_id: UserId) -> RepoResult<Ledger> {
        self.conn.execute(
            "INSERT OR IGNORE INTO ledgers (user_id) VALUES (?1);",
            [user_id.to_string()],
        )?;
        self.get_ledger(user_id)?
            .ok_or_else(|| RepoError::not_found("ledger", user_id))
    }

    fn get_ledger(&self, user_id: UserId) -> RepoResult<Option<Ledger>> {
        load_ledger(self.conn, user_id)
    }

    fn commit(&self, commit: &LedgerCommit<'_>) -> RepoResult<Ledger> {
        let ledger = commit.ledger;
        let user_id = ledger.user_id.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE ledgers
             SET
                xp = ?2,
                level = ?3,
                gems = ?4,
                current_streak = ?5,
                last_activity_date = ?6,
                total_focus_time = ?7,
                total_tasks_completed = ?8,
                version = version + 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE user_id = ?1
               AND version = ?9;",
            params![
                user_id,
                ledger.xp,
                ledger.level(),
                ledger.gems,
                ledger.current_streak,
                ledger.last_activity_date.map(date_to_db),
                ledger.total_focus_time,
                ledger.total_tasks_completed,
                commit.expected_version,
            ],
        )?;
        if changed == 0 {
            return Err(if ledger_exists(&tx, &user_id)? {
                RepoError::Conflict {
                    user_id: ledger.user_id,
                    expected_version: commit.expected_version,
                }
            } else {
                RepoError::not_found("ledger", &user_id)
            });
        }

        if let DomainEvent::ItemPurchased { item_id, price } = commit.event {
            tx.execute(
                "INSERT INTO ledger_purchases (user_id, item_id, price) VALUES (?1, ?2, ?3);",
                params![user_id, item_id.trim(), price],
            )?;
        }

        let kind = commit.event.kind();
        let source_id = commit.event.source_key();
        let inserted = tx.execute(
            "INSERT INTO applied_events (
                user_id,
                source_kind,
                source_id,
                occurred_on,
                xp_delta,
                gem_delta,
                focus_minutes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                user_id,
                kind.as_str(),
                source_id,
                date_to_db(commit.occurred_on),
                commit.delta.xp,
                commit.delta.gems,
                commit.delta.focus_minutes,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_constraint_violation(&err) => {
                return Err(RepoError::DuplicateEvent { kind, source_id });
            }
            Err(err) => return Err(err.into()),
        }

        let stored = load_ledger(&tx, ledger.user_id)?
            .ok_or_else(|| RepoError::not_found("ledger", &user_id))?;
        tx.commit()?;
        Ok(stored)
    }

    fn is_event_applied(
        &self,
        user_id: UserId,
        kind: EventKind,
        source_id: &str,
    ) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM applied_events
                WHERE user_id = ?1
                  AND source_kind = ?2
                  AND source_id = ?3
            );",
            params![user_id.to_string(), kind.as_str(), source_id.trim()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn day_activity(&self, user_id: UserId, day: NaiveDate) -> RepoResult<DayActivity> {
        let activity = self.conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN source_kind = 'task_completed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN source_kind = 'pomodoro_completed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(focus_minutes), 0)
             FROM applied_events
             WHERE user_id = ?1
               AND occurred_on = ?2;",
            params![user_id.to_string(), date_to_db(day)],
            |row| {
                Ok(DayActivity {
                    tasks_completed: row.get(0)?,
                    pomodoros_completed: row.get(1)?,
                    focus_minutes: row.get(2)?,
                })
            },
        )?;
        Ok(activity)
    }

    fn focus_by_day(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<DailyFocus>> {
        if to < from {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT occurred_on, SUM(focus_minutes), COUNT(*)
             FROM applied_events
             WHERE user_id = ?1
               AND source_kind = 'pomodoro_completed'
               AND occurred_on BETWEEN ?2 AND ?3
             GROUP BY occurred_on;",
        )?;
        let mut rows = stmt.query(params![
            user_id.to_string(),
            date_to_db(from),
            date_to_db(to)
        ])?;
        let mut totals = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let day_text: String = row.get(0)?;
            let day = parse_date(&day_text, "applied_events.occurred_on")?;
            totals.insert(day, (row.get::<_, u32>(1)?, row.get::<_, u32>(2)?));
        }

        Ok(from
            .iter_days()
            .take_while(|day| *day <= to)
            .map(|day| {
                let (minutes, sessions) = totals.get(&day).copied().unwrap_or((0, 0));
                DailyFocus {
                    day,
                    minutes,
                    sessions,
                }
            })
            .collect())
    }
}

fn ledger_exists(conn: &Connection, user_id: &str) -> RepoResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM ledgers WHERE user_id = ?1;",
            [user_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn load_ledger(conn: &Connection, user_id: UserId) -> RepoResult<Option<Ledger>> {
    let mut stmt = conn.prepare(&format!("{LEDGER_SELECT_SQL} WHERE user_id = ?1;"))?;
    let mut rows = stmt.query([user_id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut ledger = parse_ledger_row(row)?;
    ledger.purchased_items = load_purchases(conn, user_id)?;
    Ok(Some(ledger))
}

fn parse_ledger_row(row: &Row<'_>) -> RepoResult<Ledger> {
    let user_text: String = row.get("user_id")?;
    let user_id = parse_uuid(&user_text, "ledgers.user_id")?;
    let last_activity_date = match row.get::<_, Option<String>>("last_activity_date")? {
        Some(value) => Some(parse_date(&value, "ledgers.last_activity_date")?),
        None => None,
    };

    let ledger = Ledger {
        user_id,
        xp: row.get("xp")?,
        gems: row.get("gems")?,
        current_streak: row.get("current_streak")?,
        last_activity_date,
        total_focus_time: row.get("total_focus_time")?,
        total_tasks_completed: row.get("total_tasks_completed")?,
        purchased_items: BTreeSet::new(),
        version: row.get("version")?,
    };

    let stored_level: u32 = row.get("level")?;
    if stored_level != level_for_xp(ledger.xp) {
        return Err(RepoError::InvalidData(format!(
            "ledgers.level `{stored_level}` does not match xp `{}` for user {user_id}",
            ledger.xp
        )));
    }
    Ok(ledger)
}

fn load_purchases(conn: &Connection, user_id: UserId) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT item_id
         FROM ledger_purchases
         WHERE user_id = ?1
         ORDER BY item_id ASC;",
    )?;
    let mut rows = stmt.query([user_id.to_string()])?;
    let mut items = BTreeSet::new();
    while let Some(row) = rows.next()? {
        items.insert(row.get::<_, String>(0)?);
    }
    Ok(items)
}
