//! Runtime configuration for core callers.
//!
//! # Invariants
//! - `max_conflict_retries` stays within `1..=MAX_CONFLICT_RETRIES`.
//! - A `log_dir`, when present, must be absolute (enforced by `init_logging`).

use crate::logging::default_log_level;
use chrono::NaiveDate;
use std::path::PathBuf;

pub const DEFAULT_DB_FILE_NAME: &str = "questfocus.sqlite3";
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;
pub const MAX_CONFLICT_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging is disabled when `None`.
    pub log_dir: Option<PathBuf>,
    pub max_conflict_retries: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

impl CoreConfig {
    /// Returns a human-readable error for out-of-range settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.db_path.as_os_str().is_empty() {
            return Err("db_path cannot be empty".to_string());
        }
        if !(1..=MAX_CONFLICT_RETRIES).contains(&self.max_conflict_retries) {
            return Err(format!(
                "max_conflict_retries must be between 1 and {MAX_CONFLICT_RETRIES}, got {}",
                self.max_conflict_retries
            ));
        }
        Ok(())
    }
}

/// Current calendar day on the local clock; the quest day window is
/// `[local midnight, local midnight + 24h)`.
pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
