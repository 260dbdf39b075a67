//! Domain model for the progression ledger and its event sources.
//!
//! # Responsibility
//! - Define the data structures shared by the reward engine, repositories
//!   and services.
//!
//! # Invariants
//! - Level is always derived from xp; any persisted copy must match it.
//! - Domain events form a closed set handled exhaustively.

pub mod activity;
pub mod catalog;
pub mod event;
pub mod ledger;
pub mod quest;
pub mod timer;
