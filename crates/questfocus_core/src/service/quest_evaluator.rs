//! Quest evaluator: derives daily quest completion from day activity.
//!
//! # Responsibility
//! - Ensure the canonical quest set exists for a day.
//! - Complete satisfied quests and feed their rewards to the event processor.
//! - Handle manual quest checks through the same guarded path.
//!
//! # Invariants
//! - A quest's reward is granted at most once: the reward event is keyed by
//!   quest id, so a replay surfaces as `DuplicateEvent`.
//! - The reward is applied before the quest flag flips. A crash in between
//!   leaves the quest incomplete and the next evaluation finishes it without
//!   paying twice.
//! - Re-evaluating a completed quest is a no-op; calls are safe to repeat.

use crate::model::ledger::UserId;
use crate::model::quest::{Quest, QuestId};
use crate::repo::ledger_repo::LedgerRepository;
use crate::repo::quest_repo::QuestRepository;
use crate::repo::RepoError;
use crate::service::event_processor::{EventProcessor, ProcessError};
use chrono::NaiveDate;
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum QuestError {
    QuestNotFound(QuestId),
    /// Manual checks only apply to the current day's quests.
    Expired { quest_id: QuestId, date: NaiveDate },
    Process(ProcessError),
    Repo(RepoError),
}

impl QuestError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Process(err) => err.is_retryable(),
            Self::Repo(_) => true,
            _ => false,
        }
    }
}

impl Display for QuestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuestNotFound(quest_id) => write!(f, "quest not found: {quest_id}"),
            Self::Expired { quest_id, date } => {
                write!(f, "quest {quest_id} belongs to {date} and can no longer be checked")
            }
            Self::Process(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "quest store unavailable: {err}"),
        }
    }
}

impl Error for QuestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Process(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProcessError> for QuestError {
    fn from(value: ProcessError) -> Self {
        Self::Process(value)
    }
}

impl From<RepoError> for QuestError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity: "quest", id } => match id.parse() {
                Ok(quest_id) => Self::QuestNotFound(quest_id),
                Err(_) => Self::Repo(RepoError::NotFound {
                    entity: "quest",
                    id,
                }),
            },
            other => Self::Repo(other),
        }
    }
}

/// Use-case service for daily quests.
pub struct QuestEvaluator<Q: QuestRepository, L: LedgerRepository> {
    quests: Q,
    processor: EventProcessor<L>,
}

impl<Q: QuestRepository, L: LedgerRepository> QuestEvaluator<Q, L> {
    pub fn new(quests: Q, processor: EventProcessor<L>) -> Self {
        Self { quests, processor }
    }

    /// Returns the day's quests, seeding them first if missing.
    pub fn daily_quests(&self, user_id: UserId, day: NaiveDate) -> Result<Vec<Quest>, QuestError> {
        let quests = self.quests.seed_daily_quests(user_id, day)?;
        debug!(
            "event=quest_seed module=quest status=ok user_id={} day={} count={}",
            user_id,
            day,
            quests.len()
        );
        Ok(quests)
    }

    /// Completes every quest whose predicate holds for `day`.
    ///
    /// Returns only the quests completed by this call.
    pub fn evaluate(&self, user_id: UserId, day: NaiveDate) -> Result<Vec<Quest>, QuestError> {
        let quests = self.daily_quests(user_id, day)?;
        if quests.iter().all(|quest| quest.completed) {
            return Ok(Vec::new());
        }

        let ledger = self.processor.ledger(user_id)?;
        let activity = self.processor.day_activity(user_id, day)?;

        let mut newly_completed = Vec::new();
        for quest in quests {
            if quest.completed || !quest.kind.is_satisfied(&activity, &ledger, day) {
                continue;
            }
            if let Some(done) = self.complete(user_id, &quest)? {
                newly_completed.push(done);
            }
        }
        Ok(newly_completed)
    }

    /// Manual check of one quest for `today`.
    ///
    /// Returns `None` when the quest was already completed.
    pub fn check_quest(
        &self,
        user_id: UserId,
        quest_id: QuestId,
        today: NaiveDate,
    ) -> Result<Option<Quest>, QuestError> {
        let quest = self
            .quests
            .get_quest(user_id, quest_id)?
            .ok_or(QuestError::QuestNotFound(quest_id))?;
        if quest.completed {
            return Ok(None);
        }
        if quest.date != today {
            return Err(QuestError::Expired {
                quest_id,
                date: quest.date,
            });
        }
        self.complete(user_id, &quest)
    }

    fn complete(&self, user_id: UserId, quest: &Quest) -> Result<Option<Quest>, QuestError> {
        match self
            .processor
            .process_with_retry(user_id, &quest.reward_event(), quest.date)
        {
            Ok(_) | Err(ProcessError::DuplicateEvent { .. }) => {}
            Err(err) => return Err(err.into()),
        }

        if !self.quests.mark_completed(user_id, quest.id)? {
            return Ok(None);
        }
        info!(
            "event=quest_complete module=quest status=ok user_id={} kind={:?} xp_reward={} gem_reward={}",
            user_id, quest.kind, quest.xp_reward, quest.gem_reward
        );
        Ok(self.quests.get_quest(user_id, quest.id)?)
    }
}
