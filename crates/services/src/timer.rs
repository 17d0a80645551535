//! Drives an [`ExamTimer`] in real time.
//!
//! One tokio task per running timer ticks the state machine every second and forwards
//! events over a channel. Pausing or resetting aborts the task; resuming spawns a new one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use prep_core::timer::{ExamTimer, TimerError, TimerEvent, TimerState};

const TICK: Duration = Duration::from_secs(1);

pub struct TimerRunner {
    timer: Arc<Mutex<ExamTimer>>,
    events: UnboundedSender<TimerEvent>,
    task: Option<JoinHandle<()>>,
}

impl TimerRunner {
    /// Wrap a timer; events arrive on the returned receiver.
    #[must_use]
    pub fn new(timer: ExamTimer) -> (Self, UnboundedReceiver<TimerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let runner = Self {
            timer: Arc::new(Mutex::new(timer)),
            events,
            task: None,
        };
        (runner, rx)
    }

    /// # Errors
    ///
    /// Returns `TimerError::InvalidTransition` unless idle or paused.
    pub fn start(&mut self) -> Result<(), TimerError> {
        lock(&self.timer).start()?;
        self.spawn();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `TimerError::InvalidTransition` unless running.
    pub fn pause(&mut self) -> Result<(), TimerError> {
        lock(&self.timer).pause()?;
        self.stop();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `TimerError::InvalidTransition` unless paused.
    pub fn resume(&mut self) -> Result<(), TimerError> {
        lock(&self.timer).resume()?;
        self.spawn();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `TimerError::InvalidTransition` once finished.
    pub fn reset(&mut self) -> Result<(), TimerError> {
        lock(&self.timer).reset()?;
        self.stop();
        Ok(())
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        lock(&self.timer).remaining()
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        lock(&self.timer).state()
    }

    fn spawn(&mut self) {
        self.stop();
        let timer = Arc::clone(&self.timer);
        let events = self.events.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let (fired, finished) = {
                    let mut timer = lock(&timer);
                    let fired = timer.tick();
                    (fired, timer.state() != TimerState::Running)
                };
                for event in fired {
                    if events.send(event).is_err() {
                        return;
                    }
                }
                if finished {
                    tracing::debug!("exam timer stopped");
                    return;
                }
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TimerRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(timer: &Mutex<ExamTimer>) -> MutexGuard<'_, ExamTimer> {
    timer.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::timer::{AlertLevel, Threshold};

    fn timer(seconds: u32) -> ExamTimer {
        ExamTimer::new(
            seconds,
            vec![
                Threshold {
                    at_seconds: 3,
                    level: AlertLevel::Warning,
                },
                Threshold {
                    at_seconds: 1,
                    level: AlertLevel::Critical,
                },
            ],
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn runs_to_a_single_time_up() {
        let (mut runner, mut rx) = TimerRunner::new(timer(5));
        runner.start().unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
            if event == TimerEvent::TimeUp {
                break;
            }
        }

        assert_eq!(runner.state(), TimerState::Finished);
        assert_eq!(runner.remaining(), 0);
        let ticks = events
            .iter()
            .filter(|e| matches!(e, TimerEvent::Tick { .. }))
            .count();
        assert_eq!(ticks, 5);
        assert!(events.contains(&TimerEvent::Warning { remaining: 3 }));
        assert!(events.contains(&TimerEvent::Critical { remaining: 1 }));
        assert_eq!(events.last(), Some(&TimerEvent::TimeUp));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_halts_and_resume_continues() {
        let (mut runner, _rx) = TimerRunner::new(timer(10));
        runner.start().unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        runner.pause().unwrap();
        let paused_at = runner.remaining();
        assert_eq!(paused_at, 8);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runner.remaining(), paused_at);

        runner.resume().unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(runner.remaining(), paused_at - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_the_full_duration() {
        let (mut runner, _rx) = TimerRunner::new(timer(10));
        runner.start().unwrap();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        runner.reset().unwrap();
        assert_eq!(runner.state(), TimerState::Idle);
        assert_eq!(runner.remaining(), 10);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runner.remaining(), 10);
        assert!(runner.resume().is_err());
    }
}
