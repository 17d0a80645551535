use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::answer::AnsweredQuestion;
use crate::model::ids::{ExamId, ObjectiveId, SessionId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("cannot {action} a session that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: SessionStatus,
    },

    #[error("unknown session status: {0}")]
    UnknownStatus(String),

    #[error("unknown session mode: {0}")]
    UnknownMode(String),
}

//
// ─── STATUS / MODE ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }

    /// # Errors
    ///
    /// Returns `SessionStateError::UnknownStatus` for unrecognized names.
    pub fn parse(s: &str) -> Result<Self, SessionStateError> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(SessionStateError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the session is being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Untimed study with immediate feedback.
    #[default]
    Study,
    /// Timed full-length practice test.
    Practice,
    /// Revisit previously missed material.
    Review,
}

impl SessionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Study => "study",
            SessionMode::Practice => "practice",
            SessionMode::Review => "review",
        }
    }

    /// # Errors
    ///
    /// Returns `SessionStateError::UnknownMode` for unrecognized names.
    pub fn parse(s: &str) -> Result<Self, SessionStateError> {
        match s {
            "study" => Ok(Self::Study),
            "practice" => Ok(Self::Practice),
            "review" => Ok(Self::Review),
            other => Err(SessionStateError::UnknownMode(other.to_string())),
        }
    }
}

//
// ─── AGGREGATES ────────────────────────────────────────────────────────────────
//

/// Per-objective accuracy within a session or a progress rollup.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectiveStats {
    pub total: u32,
    pub correct: u32,
    pub accuracy: f64,
}

impl ObjectiveStats {
    fn push(&mut self, is_correct: bool) {
        self.total = self.total.saturating_add(1);
        if is_correct {
            self.correct = self.correct.saturating_add(1);
        }
        self.accuracy = f64::from(self.correct) / f64::from(self.total);
    }
}

/// Summary statistics recomputed from a session's answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total: u32,
    pub correct: u32,
    pub accuracy: f64,
    pub avg_time_seconds: f64,
    pub total_time_seconds: u64,
    pub by_objective: BTreeMap<ObjectiveId, ObjectiveStats>,
}

impl SessionStats {
    /// Aggregate a set of answers. Returns `None` when there are no answers.
    #[must_use]
    pub fn from_answers(answers: &[AnsweredQuestion]) -> Option<Self> {
        if answers.is_empty() {
            return None;
        }

        let mut total = 0_u32;
        let mut correct = 0_u32;
        let mut total_time_seconds = 0_u64;
        let mut by_objective: BTreeMap<ObjectiveId, ObjectiveStats> = BTreeMap::new();

        for answer in answers {
            total = total.saturating_add(1);
            if answer.is_correct {
                correct = correct.saturating_add(1);
            }
            total_time_seconds += u64::from(answer.time_spent_seconds);
            by_objective
                .entry(answer.objective_id)
                .or_default()
                .push(answer.is_correct);
        }

        #[allow(clippy::cast_precision_loss)]
        let avg_time_seconds = total_time_seconds as f64 / f64::from(total);

        Some(Self {
            total,
            correct,
            accuracy: f64::from(correct) / f64::from(total),
            avg_time_seconds,
            total_time_seconds,
            by_objective,
        })
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// A bounded interaction of one user against one exam.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySession {
    pub id: SessionId,
    pub user_id: UserId,
    pub exam_id: ExamId,
    pub mode: SessionMode,
    pub status: SessionStatus,
    /// Number of questions the session aims for.
    pub question_count: u32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub avg_time_seconds: f64,
    pub objective_breakdown: BTreeMap<ObjectiveId, ObjectiveStats>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StudySession {
    /// A fresh active session with zeroed counters.
    #[must_use]
    pub fn start(
        id: SessionId,
        user_id: UserId,
        exam_id: ExamId,
        mode: SessionMode,
        question_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            exam_id,
            mode,
            status: SessionStatus::Active,
            question_count,
            questions_answered: 0,
            correct_answers: 0,
            accuracy: 0.0,
            avg_time_seconds: 0.0,
            objective_breakdown: BTreeMap::new(),
            started_at: now,
            last_activity_at: now,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status != SessionStatus::Completed
    }

    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` unless the session is active.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        self.transition("pause", SessionStatus::Active, SessionStatus::Paused)?;
        self.last_activity_at = now;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` unless the session is paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        self.transition("resume", SessionStatus::Paused, SessionStatus::Active)?;
        self.last_activity_at = now;
        Ok(())
    }

    /// Completes an active or paused session.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` if already completed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        if self.status == SessionStatus::Completed {
            return Err(SessionStateError::InvalidTransition {
                action: "complete",
                status: self.status,
            });
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.last_activity_at = now;
        Ok(())
    }

    /// Overwrite the progress counters with freshly aggregated statistics.
    pub fn apply_stats(&mut self, stats: &SessionStats) {
        self.questions_answered = stats.total;
        self.correct_answers = stats.correct;
        self.accuracy = stats.accuracy;
        self.avg_time_seconds = stats.avg_time_seconds;
        self.objective_breakdown = stats.by_objective.clone();
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<(), SessionStateError> {
        if self.status != from {
            return Err(SessionStateError::InvalidTransition {
                action,
                status: self.status,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;
    use crate::time::fixed_now;

    fn answer(question: u64, objective: u64, is_correct: bool, secs: u32) -> AnsweredQuestion {
        AnsweredQuestion {
            question_id: QuestionId::new(question),
            objective_id: ObjectiveId::new(objective),
            is_correct,
            time_spent_seconds: secs,
            answered_at: fixed_now(),
        }
    }

    #[test]
    fn stats_are_none_without_answers() {
        assert!(SessionStats::from_answers(&[]).is_none());
    }

    #[test]
    fn stats_group_by_objective() {
        let answers = vec![
            answer(1, 10, true, 20),
            answer(2, 10, false, 40),
            answer(3, 11, true, 30),
            answer(4, 11, true, 10),
        ];
        let stats = SessionStats::from_answers(&answers).unwrap();

        assert_eq!(stats.total, 4);
        assert_eq!(stats.correct, 3);
        assert!((stats.accuracy - 0.75).abs() < f64::EPSILON);
        assert!((stats.avg_time_seconds - 25.0).abs() < f64::EPSILON);
        assert_eq!(stats.total_time_seconds, 100);

        let first = stats.by_objective[&ObjectiveId::new(10)];
        assert_eq!((first.total, first.correct), (2, 1));
        assert!((first.accuracy - 0.5).abs() < f64::EPSILON);
        let second = stats.by_objective[&ObjectiveId::new(11)];
        assert!((second.accuracy - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pause_resume_complete_transitions() {
        let now = fixed_now();
        let mut session = StudySession::start(
            SessionId::new(1),
            UserId::new(1),
            ExamId::new(1),
            SessionMode::Study,
            20,
            now,
        );

        assert!(session.resume(now).is_err());
        session.pause(now).unwrap();
        assert_eq!(session.status, SessionStatus::Paused);
        assert!(session.pause(now).is_err());
        session.resume(now).unwrap();
        session.complete(now).unwrap();
        assert_eq!(session.completed_at, Some(now));
        assert!(!session.is_open());

        let err = session.complete(now).unwrap_err();
        assert_eq!(err.to_string(), "cannot complete a session that is completed");
    }

    #[test]
    fn apply_stats_overwrites_counters() {
        let now = fixed_now();
        let mut session = StudySession::start(
            SessionId::new(1),
            UserId::new(1),
            ExamId::new(1),
            SessionMode::Practice,
            90,
            now,
        );
        let stats = SessionStats::from_answers(&[answer(1, 1, true, 5)]).unwrap();
        session.apply_stats(&stats);
        assert_eq!(session.questions_answered, 1);
        assert_eq!(session.correct_answers, 1);
        assert_eq!(session.objective_breakdown.len(), 1);
    }
}
