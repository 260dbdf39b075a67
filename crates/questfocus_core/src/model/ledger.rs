//! Per-user progression ledger.
//!
//! # Responsibility
//! - Define the persisted progression record (xp, gems, streak, totals).
//! - Derive level and display progress from xp.
//!
//! # Invariants
//! - Level is never stored independently: it always equals `xp / 100 + 1`.
//! - All counters are unsigned, so a ledger can never hold negative values.
//! - Ledgers are mutated only by the reward engine; callers get copies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier of the user owning a ledger.
pub type UserId = Uuid;

/// XP span of one level.
pub const XP_PER_LEVEL: u32 = 100;

/// Returns the level implied by `xp`.
pub fn level_for_xp(xp: u32) -> u32 {
    xp / XP_PER_LEVEL + 1
}

/// Progression record owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub user_id: UserId,
    pub xp: u32,
    pub gems: u32,
    pub current_streak: u32,
    /// Last calendar day with an activity-bearing event.
    pub last_activity_date: Option<NaiveDate>,
    /// Completed focus time in minutes.
    pub total_focus_time: u32,
    pub total_tasks_completed: u32,
    /// Store item ids owned by the user.
    pub purchased_items: BTreeSet<String>,
    /// Optimistic-concurrency stamp; bumped by every committed write.
    pub version: i64,
}

impl Ledger {
    /// Creates an empty ledger for account provisioning.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            xp: 0,
            gems: 0,
            current_streak: 0,
            last_activity_date: None,
            total_focus_time: 0,
            total_tasks_completed: 0,
            purchased_items: BTreeSet::new(),
            version: 0,
        }
    }

    pub fn level(&self) -> u32 {
        level_for_xp(self.xp)
    }

    pub fn owns(&self, item_id: &str) -> bool {
        self.purchased_items.contains(item_id)
    }

    /// Display-only progress towards the next level threshold.
    pub fn level_progress(&self) -> LevelProgress {
        LevelProgress::from_xp(self.xp)
    }
}

/// Derived progress-bar values. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    /// `xp mod (level * 100)`.
    pub xp_into_level: u32,
    /// `level * 100`, the xp threshold shown as the bar maximum.
    pub xp_for_next_level: u32,
}

impl LevelProgress {
    pub fn from_xp(xp: u32) -> Self {
        let level = level_for_xp(xp);
        let xp_for_next_level = level.saturating_mul(XP_PER_LEVEL);
        Self {
            level,
            xp_into_level: xp % xp_for_next_level.max(1),
            xp_for_next_level,
        }
    }

    /// Fill ratio in `[0, 1)` for progress rendering.
    pub fn ratio(&self) -> f64 {
        f64::from(self.xp_into_level) / f64::from(self.xp_for_next_level.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::{level_for_xp, Ledger, LevelProgress};
    use uuid::Uuid;

    #[test]
    fn level_follows_hundred_xp_steps() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(1_250), 13);
    }

    #[test]
    fn new_ledger_starts_empty_at_level_one() {
        let ledger = Ledger::new(Uuid::new_v4());
        assert_eq!(ledger.level(), 1);
        assert_eq!(ledger.gems, 0);
        assert!(ledger.last_activity_date.is_none());
        assert!(ledger.purchased_items.is_empty());
    }

    #[test]
    fn level_progress_is_bounded_by_threshold() {
        let progress = LevelProgress::from_xp(340);
        assert_eq!(progress.level, 4);
        assert_eq!(progress.xp_for_next_level, 400);
        assert_eq!(progress.xp_into_level, 340);
        assert!(progress.ratio() < 1.0);
    }
}
