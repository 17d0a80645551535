//! Exam countdown timer.
//!
//! A pure state machine: the owner calls [`ExamTimer::tick`] once per elapsed second
//! while the timer is running and forwards the returned events.
//!
//! ```text
//! idle ──start──▶ running ──pause──▶ paused
//!   ▲               │  ▲               │
//!   └────reset──────┤  └────resume─────┘
//!                   └──(remaining == 0)──▶ finished
//! ```

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimerError {
    #[error("timer duration must be > 0 seconds")]
    ZeroDuration,

    #[error("cannot {action} a timer that is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: TimerState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// Fires an alert once remaining time drops to `at_seconds` or below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Threshold {
    pub at_seconds: u32,
    pub level: AlertLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TimerEvent {
    Tick { remaining: u32 },
    Warning { remaining: u32 },
    Critical { remaining: u32 },
    TimeUp,
}

#[derive(Debug, Clone)]
pub struct ExamTimer {
    duration: u32,
    remaining: u32,
    state: TimerState,
    thresholds: Vec<Threshold>,
    warned: BTreeSet<usize>,
}

impl ExamTimer {
    /// # Errors
    ///
    /// Returns `TimerError::ZeroDuration` for a zero-length timer.
    pub fn new(duration_seconds: u32, thresholds: Vec<Threshold>) -> Result<Self, TimerError> {
        if duration_seconds == 0 {
            return Err(TimerError::ZeroDuration);
        }
        Ok(Self {
            duration: duration_seconds,
            remaining: duration_seconds,
            state: TimerState::Idle,
            thresholds,
            warned: BTreeSet::new(),
        })
    }

    /// Timer for a practice test: warning at 5 minutes left, critical at 1 minute.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::ZeroDuration` when `minutes` is zero.
    pub fn for_exam(minutes: u32) -> Result<Self, TimerError> {
        Self::new(
            minutes.saturating_mul(60),
            vec![
                Threshold {
                    at_seconds: 300,
                    level: AlertLevel::Warning,
                },
                Threshold {
                    at_seconds: 60,
                    level: AlertLevel::Critical,
                },
            ],
        )
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// # Errors
    ///
    /// Returns `TimerError::InvalidTransition` unless idle or paused.
    pub fn start(&mut self) -> Result<(), TimerError> {
        match self.state {
            TimerState::Idle | TimerState::Paused => {
                self.state = TimerState::Running;
                Ok(())
            }
            state => Err(TimerError::InvalidTransition {
                action: "start",
                state,
            }),
        }
    }

    /// # Errors
    ///
    /// Returns `TimerError::InvalidTransition` unless running.
    pub fn pause(&mut self) -> Result<(), TimerError> {
        if self.state != TimerState::Running {
            return Err(TimerError::InvalidTransition {
                action: "pause",
                state: self.state,
            });
        }
        self.state = TimerState::Paused;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `TimerError::InvalidTransition` unless paused.
    pub fn resume(&mut self) -> Result<(), TimerError> {
        if self.state != TimerState::Paused {
            return Err(TimerError::InvalidTransition {
                action: "resume",
                state: self.state,
            });
        }
        self.start()
    }

    /// Back to idle with the full duration; alerts may fire again.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::InvalidTransition` once finished.
    pub fn reset(&mut self) -> Result<(), TimerError> {
        if self.state == TimerState::Finished {
            return Err(TimerError::InvalidTransition {
                action: "reset",
                state: self.state,
            });
        }
        self.state = TimerState::Idle;
        self.remaining = self.duration;
        self.warned.clear();
        Ok(())
    }

    /// Advance one second. Does nothing unless running.
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        if self.state != TimerState::Running {
            return Vec::new();
        }

        self.remaining = self.remaining.saturating_sub(1);
        let remaining = self.remaining;
        let mut events = vec![TimerEvent::Tick { remaining }];

        for (index, threshold) in self.thresholds.iter().enumerate() {
            if remaining <= threshold.at_seconds && self.warned.insert(index) {
                events.push(match threshold.level {
                    AlertLevel::Warning => TimerEvent::Warning { remaining },
                    AlertLevel::Critical => TimerEvent::Critical { remaining },
                });
            }
        }

        if remaining == 0 {
            self.state = TimerState::Finished;
            events.push(TimerEvent::TimeUp);
        }

        events
    }
}
