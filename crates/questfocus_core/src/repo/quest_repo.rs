//! Daily quest persistence.
//!
//! # Responsibility
//! - Seed the canonical quest set for a user and day.
//! - Flip quests to completed with a compare-and-set on the stored flag.
//!
//! # Invariants
//! - `(user_id, quest_date, kind)` is unique; seeding is race-safe.
//! - `completed` only ever moves from 0 to 1.
//! - Listing order follows `QuestKind::DAILY_SET`.

use crate::model::ledger::UserId;
use crate::model::quest::{Quest, QuestId, QuestKind};
use crate::repo::{date_to_db, parse_bool, parse_date, parse_uuid, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const QUEST_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    quest_date,
    kind,
    xp_reward,
    gem_reward,
    completed,
    completed_at
FROM daily_quests";

/// Repository interface for daily quests.
pub trait QuestRepository {
    /// Inserts any missing canonical quest for `day` and returns the full set.
    fn seed_daily_quests(&self, user_id: UserId, day: NaiveDate) -> RepoResult<Vec<Quest>>;
    fn list_quests(&self, user_id: UserId, day: NaiveDate) -> RepoResult<Vec<Quest>>;
    fn get_quest(&self, user_id: UserId, quest_id: QuestId) -> RepoResult<Option<Quest>>;
    /// Marks one quest completed; returns `false` when it already was.
    fn mark_completed(&self, user_id: UserId, quest_id: QuestId) -> RepoResult<bool>;
}

/// SQLite-backed quest repository.
pub struct SqliteQuestRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteQuestRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl QuestRepository for SqliteQuestRepository<'_> {
    fn seed_daily_quests(&self, user_id: UserId, day: NaiveDate) -> RepoResult<Vec<Quest>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for kind in QuestKind::DAILY_SET {
            let quest = Quest::canonical(user_id, day, kind);
            tx.execute(
                "INSERT OR IGNORE INTO daily_quests (
                    id,
                    user_id,
                    quest_date,
                    kind,
                    xp_reward,
                    gem_reward,
                    completed
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0);",
                params![
                    quest.id.to_string(),
                    user_id.to_string(),
                    date_to_db(day),
                    quest_kind_to_db(kind),
                    quest.xp_reward,
                    quest.gem_reward,
                ],
            )?;
        }
        let quests = list_quests_in(&tx, user_id, day)?;
        tx.commit()?;
        Ok(quests)
    }

    fn list_quests(&self, user_id: UserId, day: NaiveDate) -> RepoResult<Vec<Quest>> {
        list_quests_in(self.conn, user_id, day)
    }

    fn get_quest(&self, user_id: UserId, quest_id: QuestId) -> RepoResult<Option<Quest>> {
        let mut stmt = self.conn.prepare(&format!(
            "{QUEST_SELECT_SQL}
             WHERE id = ?1
               AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![quest_id.to_string(), user_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_quest_row(row)?));
        }
        Ok(None)
    }

    fn mark_completed(&self, user_id: UserId, quest_id: QuestId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE daily_quests
             SET
                completed = 1,
                completed_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND user_id = ?2
               AND completed = 0;",
            params![quest_id.to_string(), user_id.to_string()],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        match self.get_quest(user_id, quest_id)? {
            Some(_) => Ok(false),
            None => Err(RepoError::not_found("quest", quest_id)),
        }
    }
}

fn list_quests_in(conn: &Connection, user_id: UserId, day: NaiveDate) -> RepoResult<Vec<Quest>> {
    let mut stmt = conn.prepare(&format!(
        "{QUEST_SELECT_SQL}
         WHERE user_id = ?1
           AND quest_date = ?2;"
    ))?;
    let mut rows = stmt.query(params![user_id.to_string(), date_to_db(day)])?;
    let mut quests = Vec::new();
    while let Some(row) = rows.next()? {
        quests.push(parse_quest_row(row)?);
    }
    quests.sort_by_key(|quest| quest.kind);
    Ok(quests)
}

fn parse_quest_row(row: &Row<'_>) -> RepoResult<Quest> {
    let id_text: String = row.get("id")?;
    let user_text: String = row.get("user_id")?;
    let date_text: String = row.get("quest_date")?;
    let kind_text: String = row.get("kind")?;
    let kind = parse_quest_kind(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid quest kind `{kind_text}` in daily_quests.kind"))
    })?;
    let completed = parse_bool(row.get("completed")?, "daily_quests.completed")?;
    let completed_at: Option<i64> = row.get("completed_at")?;
    if completed != completed_at.is_some() {
        return Err(RepoError::InvalidData(format!(
            "daily_quests row `{id_text}` has inconsistent completion fields"
        )));
    }

    Ok(Quest {
        id: parse_uuid(&id_text, "daily_quests.id")?,
        user_id: parse_uuid(&user_text, "daily_quests.user_id")?,
        date: parse_date(&date_text, "daily_quests.quest_date")?,
        kind,
        completed,
        completed_at,
        xp_reward: row.get("xp_reward")?,
        gem_reward: row.get("gem_reward")?,
    })
}

fn quest_kind_to_db(kind: QuestKind) -> &'static str {
    match kind {
        QuestKind::ThreeTasks => "three_tasks",
        QuestKind::FiftyMinutesFocus => "fifty_minutes_focus",
        QuestKind::StreakMaintained => "streak_maintained",
    }
}

fn parse_quest_kind(value: &str) -> Option<QuestKind> {
    match value {
        "three_tasks" => Some(QuestKind::ThreeTasks),
        "fifty_minutes_focus" => Some(QuestKind::FiftyMinutesFocus),
        "streak_maintained" => Some(QuestKind::StreakMaintained),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_quest_kind, quest_kind_to_db};
    use crate::model::quest::QuestKind;

    #[test]
    fn quest_kind_db_names_roundtrip() {
        for kind in QuestKind::DAILY_SET {
            assert_eq!(parse_quest_kind(quest_kind_to_db(kind)), Some(kind));
        }
        assert_eq!(parse_quest_kind("read_book"), None);
    }
}
