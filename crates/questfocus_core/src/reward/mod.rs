//! Reward engine: pure functions from (ledger, event, day) to the next ledger.
//!
//! # Responsibility
//! - Hold every XP/gem/streak rule in one side-effect-free place.
//!
//! # Invariants
//! - Never touches storage, clocks or logging.

pub mod engine;
