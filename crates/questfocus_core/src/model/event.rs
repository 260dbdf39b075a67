//! Domain events that move a ledger.
//!
//! # Responsibility
//! - Describe one completed user action as a closed tagged variant.
//! - Validate payload shape before any reward math runs.
//!
//! # Invariants
//! - Every event carries the key used for replay detection
//!   (`kind + source_key`).
//! - Events are immutable once created.

use crate::model::quest::QuestId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound for one focus session, in minutes.
pub const MAX_FOCUS_MINUTES: u32 = 180;
const MAX_SOURCE_ID_CHARS: usize = 128;
/// Upper bound for either reward of a single quest.
pub const MAX_QUEST_REWARD: u32 = 1_000;

/// One completed user action that affects a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A task was checked off. `source_id` is the task id.
    TaskCompleted { source_id: String },
    /// A focus session ran to completion. `source_id` is the session id.
    PomodoroCompleted {
        source_id: String,
        duration_minutes: u32,
    },
    /// A daily quest was completed.
    QuestCompleted {
        quest_id: QuestId,
        xp_reward: u32,
        gem_reward: u32,
    },
    /// A store item was bought with gems.
    ItemPurchased { item_id: String, price: u32 },
}

/// Discriminant of `DomainEvent`, persisted with applied events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCompleted,
    PomodoroCompleted,
    QuestCompleted,
    ItemPurchased,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskCompleted => "task_completed",
            Self::PomodoroCompleted => "pomodoro_completed",
            Self::QuestCompleted => "quest_completed",
            Self::ItemPurchased => "item_purchased",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "task_completed" => Some(Self::TaskCompleted),
            "pomodoro_completed" => Some(Self::PomodoroCompleted),
            "quest_completed" => Some(Self::QuestCompleted),
            "item_purchased" => Some(Self::ItemPurchased),
            _ => None,
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    EmptySourceId(EventKind),
    SourceIdTooLong(EventKind),
    InvalidFocusDuration(u32),
    EmptyItemId,
    ZeroPrice(String),
    QuestRewardOutOfRange { xp_reward: u32, gem_reward: u32 },
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySourceId(kind) => write!(f, "{kind} event requires a source id"),
            Self::SourceIdTooLong(kind) => write!(
                f,
                "{kind} source id exceeds {MAX_SOURCE_ID_CHARS} characters"
            ),
            Self::InvalidFocusDuration(minutes) => write!(
                f,
                "focus duration must be between 1 and {MAX_FOCUS_MINUTES} minutes, got {minutes}"
            ),
            Self::EmptyItemId => write!(f, "purchase requires an item id"),
            Self::ZeroPrice(item_id) => write!(f, "item `{item_id}` cannot have a zero price"),
            Self::QuestRewardOutOfRange {
                xp_reward,
                gem_reward,
            } => write!(
                f,
                "quest reward {xp_reward} xp / {gem_reward} gems exceeds {MAX_QUEST_REWARD}"
            ),
        }
    }
}

impl Error for EventValidationError {}

impl DomainEvent {
    pub fn task_completed(source_id: impl Into<String>) -> Self {
        Self::TaskCompleted {
            source_id: source_id.into(),
        }
    }

    pub fn pomodoro_completed(source_id: impl Into<String>, duration_minutes: u32) -> Self {
        Self::PomodoroCompleted {
            source_id: source_id.into(),
            duration_minutes,
        }
    }

    pub fn item_purchased(item_id: impl Into<String>, price: u32) -> Self {
        Self::ItemPurchased {
            item_id: item_id.into(),
            price,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::TaskCompleted { .. } => EventKind::TaskCompleted,
            Self::PomodoroCompleted { .. } => EventKind::PomodoroCompleted,
            Self::QuestCompleted { .. } => EventKind::QuestCompleted,
            Self::ItemPurchased { .. } => EventKind::ItemPurchased,
        }
    }

    /// Replay-detection key within `kind()`.
    pub fn source_key(&self) -> String {
        match self {
            Self::TaskCompleted { source_id } => source_id.trim().to_string(),
            Self::PomodoroCompleted { source_id, .. } => source_id.trim().to_string(),
            Self::QuestCompleted { quest_id, .. } => quest_id.to_string(),
            Self::ItemPurchased { item_id, .. } => item_id.trim().to_string(),
        }
    }

    /// Whether this event advances the streak and `last_activity_date`.
    ///
    /// Only focus sessions do; task counts feed quests through `DayActivity`.
    pub fn advances_streak(&self) -> bool {
        matches!(self, Self::PomodoroCompleted { .. })
    }

    /// Checks payload shape. Catalog membership is checked by the processor.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        match self {
            Self::TaskCompleted { source_id } => validate_source_id(self.kind(), source_id),
            Self::PomodoroCompleted {
                source_id,
                duration_minutes,
            } => {
                validate_source_id(self.kind(), source_id)?;
                if *duration_minutes == 0 || *duration_minutes > MAX_FOCUS_MINUTES {
                    return Err(EventValidationError::InvalidFocusDuration(
                        *duration_minutes,
                    ));
                }
                Ok(())
            }
            Self::QuestCompleted {
                xp_reward,
                gem_reward,
                ..
            } => {
                if *xp_reward > MAX_QUEST_REWARD || *gem_reward > MAX_QUEST_REWARD {
                    return Err(EventValidationError::QuestRewardOutOfRange {
                        xp_reward: *xp_reward,
                        gem_reward: *gem_reward,
                    });
                }
                Ok(())
            }
            Self::ItemPurchased { item_id, price } => {
                if item_id.trim().is_empty() {
                    return Err(EventValidationError::EmptyItemId);
                }
                if *price == 0 {
                    return Err(EventValidationError::ZeroPrice(item_id.clone()));
                }
                Ok(())
            }
        }
    }
}

fn validate_source_id(kind: EventKind, source_id: &str) -> Result<(), EventValidationError> {
    let trimmed = source_id.trim();
    if trimmed.is_empty() {
        return Err(EventValidationError::EmptySourceId(kind));
    }
    if trimmed.chars().count() > MAX_SOURCE_ID_CHARS {
        return Err(EventValidationError::SourceIdTooLong(kind));
    }
    Ok(())
}
