//! Daily quest model and completion predicates.
//!
//! # Responsibility
//! - Define the fixed per-day quest set and its rewards.
//! - Decide quest completion from aggregated day activity.
//!
//! # Invariants
//! - Exactly one quest per `(user, day, kind)`.
//! - A quest moves from incomplete to completed once and never reopens.

use crate::model::event::DomainEvent;
use crate::model::ledger::{Ledger, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type QuestId = Uuid;

/// Tasks needed for `QuestKind::ThreeTasks`.
pub const QUEST_TASK_TARGET: u32 = 3;
/// Completed focus sessions needed for `QuestKind::FiftyMinutesFocus`.
pub const QUEST_POMODORO_TARGET: u32 = 2;

/// Canonical daily quest kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestKind {
    ThreeTasks,
    FiftyMinutesFocus,
    StreakMaintained,
}

impl QuestKind {
    /// The quest set seeded for every user and day, in display order.
    pub const DAILY_SET: [QuestKind; 3] = [
        QuestKind::ThreeTasks,
        QuestKind::FiftyMinutesFocus,
        QuestKind::StreakMaintained,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::ThreeTasks => "Complete 3 Tasks",
            Self::FiftyMinutesFocus => "Focus for 50 Minutes",
            Self::StreakMaintained => "Maintain Your Streak",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ThreeTasks => "Finish at least 3 tasks from your list",
            Self::FiftyMinutesFocus => "Complete 2 Pomodoro sessions",
            Self::StreakMaintained => "Log in and complete at least one activity",
        }
    }

    pub fn xp_reward(self) -> u32 {
        match self {
            Self::ThreeTasks => 15,
            Self::FiftyMinutesFocus => 20,
            Self::StreakMaintained => 10,
        }
    }

    pub fn gem_reward(self) -> u32 {
        match self {
            Self::ThreeTasks => 10,
            Self::FiftyMinutesFocus => 15,
            Self::StreakMaintained => 5,
        }
    }

    /// Evaluates this quest's predicate for `day`.
    pub fn is_satisfied(self, activity: &DayActivity, ledger: &Ledger, day: NaiveDate) -> bool {
        match self {
            Self::ThreeTasks => activity.tasks_completed >= QUEST_TASK_TARGET,
            Self::FiftyMinutesFocus => activity.pomodoros_completed >= QUEST_POMODORO_TARGET,
            Self::StreakMaintained => {
                ledger.last_activity_date == Some(day) || activity.has_activity()
            }
        }
    }
}

/// Activity counters for one user and one calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayActivity {
    pub tasks_completed: u32,
    pub pomodoros_completed: u32,
    pub focus_minutes: u32,
}

impl DayActivity {
    pub fn has_activity(&self) -> bool {
        self.tasks_completed > 0 || self.pomodoros_completed > 0
    }
}

/// One quest instance for a user and day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub kind: QuestKind,
    pub completed: bool,
    /// Epoch milliseconds of completion.
    pub completed_at: Option<i64>,
    pub xp_reward: u32,
    pub gem_reward: u32,
}

impl Quest {
    /// Builds a fresh incomplete quest with the kind's fixed rewards.
    pub fn canonical(user_id: UserId, date: NaiveDate, kind: QuestKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            date,
            kind,
            completed: false,
            completed_at: None,
            xp_reward: kind.xp_reward(),
            gem_reward: kind.gem_reward(),
        }
    }

    pub fn title(&self) -> &'static str {
        self.kind.title()
    }

    /// Reward event emitted when this quest completes.
    pub fn reward_event(&self) -> DomainEvent {
        DomainEvent::QuestCompleted {
            quest_id: self.id,
            xp_reward: self.xp_reward,
            gem_reward: self.gem_reward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DayActivity, Quest, QuestKind};
    use crate::model::event::DomainEvent;
    use crate::model::ledger::Ledger;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn canonical_rewards_match_quest_table() {
        let rewards: Vec<(u32, u32)> = QuestKind::DAILY_SET
            .iter()
            .map(|kind| (kind.xp_reward(), kind.gem_reward()))
            .collect();
        assert_eq!(rewards, vec![(15, 10), (20, 15), (10, 5)]);
    }

    #[test]
    fn task_quest_needs_three_completions() {
        let ledger = Ledger::new(Uuid::new_v4());
        let mut activity = DayActivity {
            tasks_completed: 2,
            ..DayActivity::default()
        };
        assert!(!QuestKind::ThreeTasks.is_satisfied(&activity, &ledger, day()));
        activity.tasks_completed = 3;
        assert!(QuestKind::ThreeTasks.is_satisfied(&activity, &ledger, day()));
    }

    #[test]
    fn streak_quest_accepts_ledger_date_or_activity() {
        let mut ledger = Ledger::new(Uuid::new_v4());
        let idle = DayActivity::default();
        assert!(!QuestKind::StreakMaintained.is_satisfied(&idle, &ledger, day()));

        ledger.last_activity_date = Some(day());
        assert!(QuestKind::StreakMaintained.is_satisfied(&idle, &ledger, day()));

        ledger.last_activity_date = None;
        let active = DayActivity {
            pomodoros_completed: 1,
            focus_minutes: 25,
            ..DayActivity::default()
        };
        assert!(QuestKind::StreakMaintained.is_satisfied(&active, &ledger, day()));
    }

    #[test]
    fn reward_event_carries_quest_identity() {
        let quest = Quest::canonical(Uuid::new_v4(), day(), QuestKind::FiftyMinutesFocus);
        assert_eq!(
            quest.reward_event(),
            DomainEvent::QuestCompleted {
                quest_id: quest.id,
                xp_reward: 20,
                gem_reward: 15,
            }
        );
    }
}
