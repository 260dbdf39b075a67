//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and the reward engine into use-case APIs.
//! - Keep callers decoupled from storage details.

pub mod activity_service;
pub mod event_processor;
pub mod quest_evaluator;

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
