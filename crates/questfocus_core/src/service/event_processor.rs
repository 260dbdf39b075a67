//! Event processor: applies one domain event to one ledger.
//!
//! # Responsibility
//! - Load the ledger, run the reward engine, persist the result.
//! - Reject replays and malformed payloads before any write.
//! - Retry optimistic-concurrency conflicts a bounded number of times.
//!
//! # Invariants
//! - Every failure is either retried to success or returned to the caller.
//! - A rejected event leaves the stored ledger unchanged.
//! - Failures are scoped to one event; nothing here is fatal to the process.

use crate::config::DEFAULT_MAX_CONFLICT_RETRIES;
use crate::model::catalog::find_item;
use crate::model::event::{DomainEvent, EventKind};
use crate::model::ledger::{Ledger, UserId};
use crate::model::quest::DayActivity;
use crate::repo::ledger_repo::{DailyFocus, LedgerCommit, LedgerRepository};
use crate::repo::RepoError;
use crate::reward::engine::{self, AppliedDelta, RewardError};
use chrono::{Days, NaiveDate};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ProcessResult<T> = Result<T, ProcessError>;

/// Failure of a single event application.
#[derive(Debug)]
pub enum ProcessError {
    /// The user has no provisioned ledger.
    LedgerNotFound(UserId),
    /// The ledger kept changing underneath us; safe to retry later.
    Conflict { user_id: UserId, attempts: u32 },
    /// The event's source record was already rewarded.
    DuplicateEvent { kind: EventKind, source_id: String },
    InsufficientFunds { required: u32, available: u32 },
    AlreadyOwned(String),
    /// Malformed payload or unknown catalog reference.
    Validation(String),
    /// The ledger store failed or returned unusable data.
    UpstreamUnavailable(RepoError),
}

impl ProcessError {
    /// Stable identifier for logs and API envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LedgerNotFound(_) => "ledger_not_found",
            Self::Conflict { .. } => "conflict",
            Self::DuplicateEvent { .. } => "duplicate_event",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::AlreadyOwned(_) => "already_owned",
            Self::Validation(_) => "validation_error",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::UpstreamUnavailable(_))
    }

    /// Store failure caused by SQLite lock contention.
    pub fn is_store_busy(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(err) if err.is_busy())
    }

    fn from_repo(err: RepoError, user_id: UserId) -> Self {
        match err {
            RepoError::NotFound { entity: "ledger", .. } => Self::LedgerNotFound(user_id),
            RepoError::Conflict { user_id, .. } => Self::Conflict {
                user_id,
                attempts: 1,
            },
            RepoError::DuplicateEvent { kind, source_id } => {
                Self::DuplicateEvent { kind, source_id }
            }
            other => Self::UpstreamUnavailable(other),
        }
    }
}

impl Display for ProcessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LedgerNotFound(user_id) => {
                write!(f, "no progress record exists for user {user_id}")
            }
            Self::Conflict { attempts, .. } => write!(
                f,
                "your progress was updated elsewhere; gave up after {attempts} attempt(s), please try again"
            ),
            Self::DuplicateEvent { kind, source_id } => {
                write!(f, "{kind} `{source_id}` was already rewarded")
            }
            Self::InsufficientFunds {
                required,
                available,
            } => write!(f, "not enough gems: need {required}, have {available}"),
            Self::AlreadyOwned(item_id) => write!(f, "you already own `{item_id}`"),
            Self::Validation(message) => write!(f, "invalid event: {message}"),
            Self::UpstreamUnavailable(err) => write!(f, "progress store unavailable: {err}"),
        }
    }
}

impl Error for ProcessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UpstreamUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RewardError> for ProcessError {
    fn from(value: RewardError) -> Self {
        match value {
            RewardError::InsufficientFunds {
                required,
                available,
            } => Self::InsufficientFunds {
                required,
                available,
            },
            RewardError::AlreadyOwned(item_id) => Self::AlreadyOwned(item_id),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// Use-case service that owns all ledger mutations.
pub struct EventProcessor<R: LedgerRepository> {
    repo: R,
    max_attempts: u32,
}

impl<R: LedgerRepository> EventProcessor<R> {
    pub fn new(repo: R) -> Self {
        Self::with_max_attempts(repo, DEFAULT_MAX_CONFLICT_RETRIES)
    }

    /// `max_attempts` is clamped to at least one attempt.
    pub fn with_max_attempts(repo: R, max_attempts: u32) -> Self {
        Self {
            repo,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Creates the user's ledger at account creation; idempotent.
    pub fn provision(&self, user_id: UserId) -> ProcessResult<Ledger> {
        let ledger = self
            .repo
            .create_ledger(user_id)
            .map_err(|err| ProcessError::from_repo(err, user_id))?;
        info!("event=ledger_provision module=processor status=ok user_id={user_id}");
        Ok(ledger)
    }

    pub fn ledger(&self, user_id: UserId) -> ProcessResult<Ledger> {
        self.repo
            .get_ledger(user_id)
            .map_err(|err| ProcessError::from_repo(err, user_id))?
            .ok_or(ProcessError::LedgerNotFound(user_id))
    }

    pub fn day_activity(&self, user_id: UserId, day: NaiveDate) -> ProcessResult<DayActivity> {
        self.repo
            .day_activity(user_id, day)
            .map_err(|err| ProcessError::from_repo(err, user_id))
    }

    /// Focus totals for the `days` calendar days ending at `today`.
    pub fn focus_history(
        &self,
        user_id: UserId,
        today: NaiveDate,
        days: u32,
    ) -> ProcessResult<Vec<DailyFocus>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let from = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| ProcessError::Validation(format!("history of {days} days")))?;
        self.repo
            .focus_by_day(user_id, from, today)
            .map_err(|err| ProcessError::from_repo(err, user_id))
    }

    /// Applies `event` once, attributing it to calendar day `today`.
    ///
    /// # Errors
    /// - `Conflict` when the ledger changed between read and write; the caller
    ///   should reload and retry (see `process_with_retry`).
    /// - Every other `ProcessError` is final for this event.
    pub fn process(
        &self,
        user_id: UserId,
        event: &DomainEvent,
        today: NaiveDate,
    ) -> ProcessResult<AppliedDelta> {
        let started_at = Instant::now();
        let result = self.apply_once(user_id, event, today);
        match &result {
            Ok(delta) => info!(
                "event=event_process module=processor status=ok user_id={} kind={} xp_delta={} gem_delta={} level={} streak={} duration_ms={}",
                user_id,
                delta.kind,
                delta.xp,
                delta.gems,
                delta.level_after,
                delta.streak_after,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=event_process module=processor status=rejected user_id={} kind={} error_code={} duration_ms={}",
                user_id,
                event.kind(),
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Applies `event`, reloading and retrying on `Conflict` or a busy store
    /// up to the configured attempt bound.
    pub fn process_with_retry(
        &self,
        user_id: UserId,
        event: &DomainEvent,
        today: NaiveDate,
    ) -> ProcessResult<AppliedDelta> {
        let mut attempt = 1;
        loop {
            match self.process(user_id, event, today) {
                Err(ProcessError::Conflict { .. }) if attempt < self.max_attempts => {
                    warn!(
                        "event=event_conflict_retry module=processor status=retry user_id={} kind={} attempt={}",
                        user_id,
                        event.kind(),
                        attempt
                    );
                    attempt += 1;
                }
                Err(err) if err.is_store_busy() && attempt < self.max_attempts => {
                    warn!(
                        "event=event_busy_retry module=processor status=retry user_id={} kind={} attempt={}",
                        user_id,
                        event.kind(),
                        attempt
                    );
                    attempt += 1;
                }
                Err(ProcessError::Conflict { user_id, .. }) => {
                    return Err(ProcessError::Conflict {
                        user_id,
                        attempts: attempt,
                    });
                }
                other => return other,
            }
        }
    }

    fn apply_once(
        &self,
        user_id: UserId,
        event: &DomainEvent,
        today: NaiveDate,
    ) -> ProcessResult<AppliedDelta> {
        event
            .validate()
            .map_err(|err| ProcessError::Validation(err.to_string()))?;
        if let DomainEvent::ItemPurchased { item_id, price } = event {
            check_catalog(item_id, *price)?;
        }

        let ledger = self.ledger(user_id)?;

        // Purchases are deduplicated by ownership so a replay reports AlreadyOwned.
        if !matches!(event, DomainEvent::ItemPurchased { .. }) {
            let source_id = event.source_key();
            let applied = self
                .repo
                .is_event_applied(user_id, event.kind(), &source_id)
                .map_err(|err| ProcessError::from_repo(err, user_id))?;
            if applied {
                return Err(ProcessError::DuplicateEvent {
                    kind: event.kind(),
                    source_id,
                });
            }
        }

        let applied = engine::apply(&ledger, event, today)?;
        self.repo
            .commit(&LedgerCommit {
                expected_version: ledger.version,
                ledger: &applied.ledger,
                event,
                delta: &applied.delta,
                occurred_on: today,
            })
            .map_err(|err| ProcessError::from_repo(err, user_id))?;

        Ok(applied.delta)
    }
}

fn check_catalog(item_id: &str, price: u32) -> ProcessResult<()> {
    let item = find_item(item_id.trim())
        .ok_or_else(|| ProcessError::Validation(format!("unknown store item `{item_id}`")))?;
    if item.price != price {
        return Err(ProcessError::Validation(format!(
            "price {price} does not match catalog price {} for `{}`",
            item.price, item.id
        )));
    }
    Ok(())
}
