//! Core domain logic for QuestFocus.
//! This crate owns the reward ledger and every rule that moves it.

pub mod assistant;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod reward;
pub mod service;

pub use assistant::{
    AssistantClient, AssistantError, AssistantGateway, AssistantMode, AssistantReply,
    AssistantRequest, ChatRole, ChatTurn, GatewayResponse, TaskDraft,
};
pub use config::{local_today, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{
    default_log_level, init_from_config, init_logging, log_startup, logging_status,
};
pub use model::activity::{FocusSession, NewTask, TaskPriority, TaskRecord};
pub use model::catalog::{find_item, StoreItem, STORE_CATALOG};
pub use model::event::{DomainEvent, EventKind};
pub use model::ledger::{Ledger, LevelProgress, UserId};
pub use model::quest::{Quest, QuestKind};
pub use model::timer::PomodoroTimer;
pub use repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
pub use repo::ledger_repo::{LedgerRepository, SqliteLedgerRepository};
pub use repo::quest_repo::{QuestRepository, SqliteQuestRepository};
pub use repo::{RepoError, RepoResult};
pub use reward::engine::{AppliedDelta, RewardError};
pub use service::activity_service::{ActivityError, ActivityService};
pub use service::event_processor::{EventProcessor, ProcessError};
pub use service::quest_evaluator::{QuestError, QuestEvaluator};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
