//! Pure reward math.
//!
//! # Responsibility
//! - Compute the next ledger state and the applied delta for one event.
//!
//! # Invariants
//! - No I/O and no clock access: "today" is an explicit input.
//! - A failed application leaves the input ledger untouched.
//! - Level is recomputed from xp after every change.

use crate::model::event::{DomainEvent, EventKind, EventValidationError};
use crate::model::ledger::{level_for_xp, Ledger};
use chrono::NaiveDate;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const TASK_XP: u32 = 10;
pub const TASK_GEMS: u32 = 2;
pub const POMODORO_XP: u32 = 25;
pub const POMODORO_GEMS: u32 = 5;

pub type RewardResult<T> = Result<T, RewardError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    Invalid(EventValidationError),
    InsufficientFunds { required: u32, available: u32 },
    AlreadyOwned(String),
    Overflow(&'static str),
}

impl Display for RewardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "not enough gems: need {required}, have {available}"
            ),
            Self::AlreadyOwned(item_id) => write!(f, "item `{item_id}` is already owned"),
            Self::Overflow(field) => write!(f, "{field} would overflow"),
        }
    }
}

impl Error for RewardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EventValidationError> for RewardError {
    fn from(value: EventValidationError) -> Self {
        Self::Invalid(value)
    }
}

/// Change produced by one event application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedDelta {
    pub kind: EventKind,
    /// Signed so purchases can be reported as negative gem deltas.
    pub xp: i64,
    pub gems: i64,
    pub focus_minutes: u32,
    pub tasks_completed: u32,
    pub level_before: u32,
    pub level_after: u32,
    pub streak_before: u32,
    pub streak_after: u32,
    pub purchased_item: Option<String>,
}

impl AppliedDelta {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

/// Output of a successful application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub ledger: Ledger,
    pub delta: AppliedDelta,
}

/// Applies `event` to `ledger` as of calendar day `today`.
///
/// # Errors
/// - `Invalid` for malformed payloads.
/// - `InsufficientFunds` / `AlreadyOwned` for purchases that cannot proceed.
/// - `Overflow` when a counter would exceed `u32::MAX`.
pub fn apply(ledger: &Ledger, event: &DomainEvent, today: NaiveDate) -> RewardResult<Applied> {
    event.validate()?;

    let mut next = ledger.clone();
    let mut xp_gain = 0_u32;
    let mut gem_gain = 0_u32;
    let mut gem_cost = 0_u32;
    let mut focus_minutes = 0_u32;
    let mut tasks_completed = 0_u32;
    let mut purchased_item = None;

    match event {
        DomainEvent::TaskCompleted { .. } => {
            xp_gain = TASK_XP;
            gem_gain = TASK_GEMS;
            tasks_completed = 1;
        }
        DomainEvent::PomodoroCompleted {
            duration_minutes, ..
        } => {
            xp_gain = POMODORO_XP;
            gem_gain = POMODORO_GEMS;
            focus_minutes = *duration_minutes;
        }
        DomainEvent::QuestCompleted {
            xp_reward,
            gem_reward,
            ..
        } => {
            xp_gain = *xp_reward;
            gem_gain = *gem_reward;
        }
        DomainEvent::ItemPurchased { item_id, price } => {
            let item_id = item_id.trim();
            if next.owns(item_id) {
                return Err(RewardError::AlreadyOwned(item_id.to_string()));
            }
            if next.gems < *price {
                return Err(RewardError::InsufficientFunds {
                    required: *price,
                    available: next.gems,
                });
            }
            gem_cost = *price;
            purchased_item = Some(item_id.to_string());
        }
    }

    next.xp = checked_add(next.xp, xp_gain, "xp")?;
    next.gems = checked_add(next.gems, gem_gain, "gems")? - gem_cost;
    next.total_focus_time = checked_add(next.total_focus_time, focus_minutes, "total_focus_time")?;
    next.total_tasks_completed = checked_add(
        next.total_tasks_completed,
        tasks_completed,
        "total_tasks_completed",
    )?;
    if let Some(item_id) = &purchased_item {
        next.purchased_items.insert(item_id.clone());
    }
    if event.advances_streak() {
        next.current_streak = next_streak(ledger.current_streak, ledger.last_activity_date, today);
        next.last_activity_date = Some(match ledger.last_activity_date {
            Some(last) if last > today => last,
            _ => today,
        });
    }

    let delta = AppliedDelta {
        kind: event.kind(),
        xp: i64::from(xp_gain),
        gems: i64::from(gem_gain) - i64::from(gem_cost),
        focus_minutes,
        tasks_completed,
        level_before: level_for_xp(ledger.xp),
        level_after: level_for_xp(next.xp),
        streak_before: ledger.current_streak,
        streak_after: next.current_streak,
        purchased_item,
    };

    Ok(Applied {
        ledger: next,
        delta,
    })
}

/// Streak value after an activity on `today`.
///
/// Same day keeps the streak, the following day extends it, any gap restarts
/// at 1. A last-activity date ahead of `today` (clock skew) counts as same day.
pub fn next_streak(current: u32, last_activity: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_activity {
        Some(last) if last >= today => current.max(1),
        Some(last) if today.pred_opt() == Some(last) => current.saturating_add(1),
        _ => 1,
    }
}

fn checked_add(value: u32, gain: u32, field: &'static str) -> RewardResult<u32> {
    value.checked_add(gain).ok_or(RewardError::Overflow(field))
}
