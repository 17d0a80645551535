use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AnswerId, ObjectiveId, QuestionId, SessionId, UserId};

/// Longest time a single answer may report; anything above is treated as bad input.
pub const MAX_TIME_SPENT_SECONDS: u32 = 4 * 60 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("at least one option must be selected")]
    EmptySelection,

    #[error("confidence must be between 1 and 5, got {0}")]
    InvalidConfidence(u8),

    #[error("time spent {0}s exceeds the allowed maximum")]
    InvalidTimeSpent(u32),
}

/// Self-reported confidence for an answer (1 = guess, 5 = certain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Confidence(u8);

impl Confidence {
    /// # Errors
    ///
    /// Returns `AnswerError::InvalidConfidence` outside `1..=5`.
    pub fn new(value: u8) -> Result<Self, AnswerError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AnswerError::InvalidConfidence(value))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Confidence {
    type Error = AnswerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for u8 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

/// What a client submits for a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub selected_answers: Vec<usize>,
    #[serde(default)]
    pub time_spent_seconds: u32,
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub flagged: bool,
}

impl AnswerSubmission {
    /// Checks the parts of a submission that do not need the question.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` for empty selections, bad confidence or absurd timings.
    pub fn validate(&self) -> Result<Option<Confidence>, AnswerError> {
        if self.selected_answers.is_empty() {
            return Err(AnswerError::EmptySelection);
        }
        if self.time_spent_seconds > MAX_TIME_SPENT_SECONDS {
            return Err(AnswerError::InvalidTimeSpent(self.time_spent_seconds));
        }
        self.confidence.map(Confidence::new).transpose()
    }
}

/// A graded answer ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnswer {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub selected_answers: Vec<usize>,
    pub is_correct: bool,
    pub time_spent_seconds: u32,
    pub confidence: Option<Confidence>,
    pub flagged: bool,
    pub answered_at: DateTime<Utc>,
}

/// A recorded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAnswer {
    pub id: AnswerId,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub selected_answers: Vec<usize>,
    pub is_correct: bool,
    pub time_spent_seconds: u32,
    pub confidence: Option<Confidence>,
    pub flagged: bool,
    pub answered_at: DateTime<Utc>,
}

impl UserAnswer {
    #[must_use]
    pub fn from_new(id: AnswerId, answer: NewAnswer) -> Self {
        Self {
            id,
            session_id: answer.session_id,
            user_id: answer.user_id,
            question_id: answer.question_id,
            selected_answers: answer.selected_answers,
            is_correct: answer.is_correct,
            time_spent_seconds: answer.time_spent_seconds,
            confidence: answer.confidence,
            flagged: answer.flagged,
            answered_at: answer.answered_at,
        }
    }
}

/// An answer joined with the objective of its question; the input to aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnsweredQuestion {
    pub question_id: QuestionId,
    pub objective_id: ObjectiveId,
    pub is_correct: bool,
    pub time_spent_seconds: u32,
    pub answered_at: DateTime<Utc>,
}
