//! Caller-owned Pomodoro countdown state machine.
//!
//! # Responsibility
//! - Track focus/break phases and the remaining countdown.
//! - Report each phase completion exactly once.
//!
//! # Invariants
//! - States move `Idle -> Running <-> Paused`, and `Running -> Completed`.
//! - Time only advances while `Running`; pausing performs no side effects.
//! - No I/O: the caller persists sessions and emits ledger events.

use crate::model::activity::DEFAULT_FOCUS_MINUTES;
use crate::model::event::MAX_FOCUS_MINUTES;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_BREAK_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Focus,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Emitted by `tick` when the active phase reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCompletion {
    pub phase: TimerPhase,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    InvalidDuration(u32),
    InvalidTransition {
        state: TimerState,
        action: &'static str,
    },
}

impl Display for TimerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDuration(minutes) => write!(
                f,
                "timer duration must be between 1 and {MAX_FOCUS_MINUTES} minutes, got {minutes}"
            ),
            Self::InvalidTransition { state, action } => {
                write!(f, "cannot {action} a timer in state {state:?}")
            }
        }
    }
}

impl Error for TimerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomodoroTimer {
    focus_minutes: u32,
    break_minutes: u32,
    phase: TimerPhase,
    state: TimerState,
    remaining_secs: u32,
}

impl Default for PomodoroTimer {
    fn default() -> Self {
        Self {
            focus_minutes: DEFAULT_FOCUS_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
            phase: TimerPhase::Focus,
            state: TimerState::Idle,
            remaining_secs: DEFAULT_FOCUS_MINUTES * 60,
        }
    }
}

impl PomodoroTimer {
    pub fn new(focus_minutes: u32, break_minutes: u32) -> Result<Self, TimerError> {
        validate_minutes(focus_minutes)?;
        validate_minutes(break_minutes)?;
        Ok(Self {
            focus_minutes,
            break_minutes,
            phase: TimerPhase::Focus,
            state: TimerState::Idle,
            remaining_secs: focus_minutes * 60,
        })
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn focus_minutes(&self) -> u32 {
        self.focus_minutes
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Changes focus length; only allowed before a focus phase starts.
    pub fn set_focus_minutes(&mut self, minutes: u32) -> Result<(), TimerError> {
        validate_minutes(minutes)?;
        if self.state != TimerState::Idle {
            return Err(self.transition_error("resize"));
        }
        self.focus_minutes = minutes;
        if self.phase == TimerPhase::Focus {
            self.remaining_secs = minutes * 60;
        }
        Ok(())
    }

    /// Starts from `Idle` or resumes from `Paused`.
    pub fn start(&mut self) -> Result<(), TimerError> {
        match self.state {
            TimerState::Idle | TimerState::Paused => {
                self.state = TimerState::Running;
                Ok(())
            }
            _ => Err(self.transition_error("start")),
        }
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        if self.state != TimerState::Running {
            return Err(self.transition_error("pause"));
        }
        self.state = TimerState::Paused;
        Ok(())
    }

    /// Returns to an idle focus phase with the full configured length.
    pub fn reset(&mut self) {
        self.phase = TimerPhase::Focus;
        self.state = TimerState::Idle;
        self.remaining_secs = self.focus_minutes * 60;
    }

    /// Advances the countdown by `elapsed_secs` of wall-clock time.
    pub fn tick(&mut self, elapsed_secs: u32) -> Option<PhaseCompletion> {
        if self.state != TimerState::Running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(elapsed_secs);
        if self.remaining_secs > 0 {
            return None;
        }
        self.state = TimerState::Completed;
        Some(PhaseCompletion {
            phase: self.phase,
            minutes: self.phase_minutes(self.phase),
        })
    }

    /// Moves a completed phase to the idle start of the alternate phase.
    pub fn next_phase(&mut self) -> Result<TimerPhase, TimerError> {
        if self.state != TimerState::Completed {
            return Err(self.transition_error("advance"));
        }
        self.phase = match self.phase {
            TimerPhase::Focus => TimerPhase::Break,
            TimerPhase::Break => TimerPhase::Focus,
        };
        self.state = TimerState::Idle;
        self.remaining_secs = self.phase_minutes(self.phase) * 60;
        Ok(self.phase)
    }

    fn phase_minutes(&self, phase: TimerPhase) -> u32 {
        match phase {
            TimerPhase::Focus => self.focus_minutes,
            TimerPhase::Break => self.break_minutes,
        }
    }

    fn transition_error(&self, action: &'static str) -> TimerError {
        TimerError::InvalidTransition {
            state: self.state,
            action,
        }
    }
}

fn validate_minutes(minutes: u32) -> Result<(), TimerError> {
    if minutes == 0 || minutes > MAX_FOCUS_MINUTES {
        return Err(TimerError::InvalidDuration(minutes));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{PhaseCompletion, PomodoroTimer, TimerError, TimerPhase, TimerState};

    #[test]
    fn full_focus_cycle_reports_completion_once() {
        let mut timer = PomodoroTimer::new(1, 1).unwrap();
        timer.start().unwrap();
        assert_eq!(timer.tick(30), None);
        assert_eq!(
            timer.tick(45),
            Some(PhaseCompletion {
                phase: TimerPhase::Focus,
                minutes: 1,
            })
        );
        assert_eq!(timer.state(), TimerState::Completed);
        assert_eq!(timer.tick(10), None);
    }

    #[test]
    fn paused_timer_does_not_advance() {
        let mut timer = PomodoroTimer::default();
        timer.start().unwrap();
        timer.tick(60);
        timer.pause().unwrap();
        let remaining = timer.remaining_secs();
        assert_eq!(timer.tick(600), None);
        assert_eq!(timer.remaining_secs(), remaining);
        timer.start().unwrap();
        assert_eq!(timer.state(), TimerState::Running);
    }

    #[test]
    fn next_phase_alternates_focus_and_break() {
        let mut timer = PomodoroTimer::new(2, 1).unwrap();
        timer.start().unwrap();
        timer.tick(120);
        assert_eq!(timer.next_phase().unwrap(), TimerPhase::Break);
        assert_eq!(timer.remaining_secs(), 60);
        timer.start().unwrap();
        timer.tick(60);
        assert_eq!(timer.next_phase().unwrap(), TimerPhase::Focus);
        assert_eq!(timer.remaining_secs(), 120);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut timer = PomodoroTimer::default();
        assert!(matches!(
            timer.pause(),
            Err(TimerError::InvalidTransition { .. })
        ));
        assert!(timer.next_phase().is_err());
        timer.start().unwrap();
        assert!(timer.set_focus_minutes(50).is_err());
        timer.reset();
        timer.set_focus_minutes(50).unwrap();
        assert_eq!(timer.remaining_secs(), 50 * 60);
        assert_eq!(PomodoroTimer::new(0, 5), Err(TimerError::InvalidDuration(0)));
    }
}
