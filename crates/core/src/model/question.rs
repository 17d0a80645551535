use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExamId, ObjectiveId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs at least 2 options, got {0}")]
    TooFewOptions(usize),

    #[error("option {0} is empty")]
    EmptyOption(usize),

    #[error("a question needs at least one correct answer")]
    NoCorrectAnswer,

    #[error("correct answer index {index} is out of range for {options} options")]
    AnswerOutOfRange { index: usize, options: usize },

    #[error("difficulty must be between 1 and 5, got {0}")]
    InvalidDifficulty(u8),

    #[error("unknown question source: {0}")]
    UnknownSource(String),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Question difficulty on a 1 (easiest) to 5 (hardest) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: Difficulty = Difficulty(1);
    pub const MAX: Difficulty = Difficulty(5);

    /// # Errors
    ///
    /// Returns `QuestionError::InvalidDifficulty` outside `1..=5`.
    pub fn new(value: u8) -> Result<Self, QuestionError> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(QuestionError::InvalidDifficulty(value))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = QuestionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Difficulty> for u8 {
    fn from(value: Difficulty) -> Self {
        value.0
    }
}

//
// ─── TYPE / SOURCE ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Single,
    Multiple,
}

impl QuestionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Single => "single",
            QuestionType::Multiple => "multiple",
        }
    }
}

/// Where a question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    #[default]
    Manual,
    Ai,
}

impl QuestionSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionSource::Manual => "manual",
            QuestionSource::Ai => "ai",
        }
    }

    /// # Errors
    ///
    /// Returns `QuestionError::UnknownSource` for unrecognized names.
    pub fn parse(s: &str) -> Result<Self, QuestionError> {
        match s {
            "manual" => Ok(Self::Manual),
            "ai" => Ok(Self::Ai),
            other => Err(QuestionError::UnknownSource(other.to_string())),
        }
    }
}

//
// ─── STATISTICS ────────────────────────────────────────────────────────────────
//

/// Running attempt counters kept on every question.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionStats {
    pub total_attempts: u32,
    pub correct_attempts: u32,
    pub avg_time_seconds: f64,
}

impl QuestionStats {
    /// Returns the counters after one more attempt.
    ///
    /// The average is `(old_avg * old_count + new_time) / (old_count + 1)`; with no prior
    /// attempts it is simply `new_time`.
    #[must_use]
    pub fn record_attempt(self, is_correct: bool, time_spent_seconds: u32) -> Self {
        let new_time = f64::from(time_spent_seconds);
        let avg_time_seconds = if self.total_attempts == 0 {
            new_time
        } else {
            let count = f64::from(self.total_attempts);
            (self.avg_time_seconds * count + new_time) / (count + 1.0)
        };

        Self {
            total_attempts: self.total_attempts.saturating_add(1),
            correct_attempts: if is_correct {
                self.correct_attempts.saturating_add(1)
            } else {
                self.correct_attempts
            },
            avg_time_seconds,
        }
    }

    /// Share of correct attempts, `None` before the first attempt.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        (self.total_attempts > 0)
            .then(|| f64::from(self.correct_attempts) / f64::from(self.total_attempts))
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question input (manual authoring or AI generation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub exam_id: ExamId,
    pub objective_id: ObjectiveId,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answers: Vec<usize>,
    pub explanation: Option<String>,
    pub difficulty: u8,
    #[serde(default)]
    pub source: QuestionSource,
}

impl QuestionDraft {
    /// Validate the draft into a question that can be stored.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when text, options, answers or difficulty are invalid.
    pub fn validate(self) -> Result<NewQuestion, QuestionError> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions(self.options.len()));
        }
        let mut options = Vec::with_capacity(self.options.len());
        for (index, option) in self.options.into_iter().enumerate() {
            let option = option.trim().to_string();
            if option.is_empty() {
                return Err(QuestionError::EmptyOption(index));
            }
            options.push(option);
        }

        let mut correct_answers = self.correct_answers;
        correct_answers.sort_unstable();
        correct_answers.dedup();
        if correct_answers.is_empty() {
            return Err(QuestionError::NoCorrectAnswer);
        }
        if let Some(&index) = correct_answers.iter().find(|&&i| i >= options.len()) {
            return Err(QuestionError::AnswerOutOfRange {
                index,
                options: options.len(),
            });
        }

        let explanation = self
            .explanation
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        Ok(NewQuestion {
            exam_id: self.exam_id,
            objective_id: self.objective_id,
            text,
            options,
            correct_answers,
            explanation,
            difficulty: Difficulty::new(self.difficulty)?,
            source: self.source,
        })
    }
}

/// A validated question that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    exam_id: ExamId,
    objective_id: ObjectiveId,
    text: String,
    options: Vec<String>,
    correct_answers: Vec<usize>,
    explanation: Option<String>,
    difficulty: Difficulty,
    source: QuestionSource,
}

impl NewQuestion {
    #[must_use]
    pub fn exam_id(&self) -> ExamId {
        self.exam_id
    }

    #[must_use]
    pub fn objective_id(&self) -> ObjectiveId {
        self.objective_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answers(&self) -> &[usize] {
        &self.correct_answers
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn source(&self) -> QuestionSource {
        self.source
    }

    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        if self.correct_answers.len() > 1 {
            QuestionType::Multiple
        } else {
            QuestionType::Single
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A stored exam question with its running statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    id: QuestionId,
    exam_id: ExamId,
    objective_id: ObjectiveId,
    text: String,
    options: Vec<String>,
    correct_answers: Vec<usize>,
    question_type: QuestionType,
    explanation: Option<String>,
    difficulty: Difficulty,
    source: QuestionSource,
    is_active: bool,
    stats: QuestionStats,
}

impl Question {
    /// Rehydrate a question from storage.
    #[must_use]
    pub fn from_persisted(
        id: QuestionId,
        question: NewQuestion,
        is_active: bool,
        stats: QuestionStats,
    ) -> Self {
        let question_type = question.question_type();
        Self {
            id,
            exam_id: question.exam_id,
            objective_id: question.objective_id,
            text: question.text,
            options: question.options,
            correct_answers: question.correct_answers,
            question_type,
            explanation: question.explanation,
            difficulty: question.difficulty,
            source: question.source,
            is_active,
            stats,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn exam_id(&self) -> ExamId {
        self.exam_id
    }

    #[must_use]
    pub fn objective_id(&self) -> ObjectiveId {
        self.objective_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answers(&self) -> &[usize] {
        &self.correct_answers
    }

    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn source(&self) -> QuestionSource {
        self.source
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn stats(&self) -> QuestionStats {
        self.stats
    }

    pub fn set_stats(&mut self, stats: QuestionStats) {
        self.stats = stats;
    }

    /// Grades a selection: correct only when it matches the correct set exactly.
    #[must_use]
    pub fn is_correct(&self, selected: &[usize]) -> bool {
        let mut selected = selected.to_vec();
        selected.sort_unstable();
        selected.dedup();
        selected == self.correct_answers
    }

    /// Every selected index refers to an existing option.
    #[must_use]
    pub fn accepts_selection(&self, selected: &[usize]) -> bool {
        !selected.is_empty() && selected.iter().all(|&i| i < self.options.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn draft() -> QuestionDraft {
        QuestionDraft {
            exam_id: ExamId::new(1),
            objective_id: ObjectiveId::new(1),
            text: "Which port does HTTPS use?".into(),
            options: vec!["80".into(), "443".into(), "22".into(), "25".into()],
            correct_answers: vec![1],
            explanation: Some("TLS over TCP 443.".into()),
            difficulty: 2,
            source: QuestionSource::Manual,
        }
    }

    #[test]
    fn running_average_guards_zero_count() {
        let stats = QuestionStats::default().record_attempt(true, 30);
        assert_eq!(stats.total_attempts, 1);
        assert_eq!(stats.correct_attempts, 1);
        assert!((stats.avg_time_seconds - 30.0).abs() < f64::EPSILON);

        let stats = stats.record_attempt(false, 60);
        assert_eq!(stats.total_attempts, 2);
        assert_eq!(stats.correct_attempts, 1);
        assert!((stats.avg_time_seconds - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn incorrect_attempt_only_bumps_total() {
        let before = QuestionStats {
            total_attempts: 4,
            correct_attempts: 3,
            avg_time_seconds: 10.0,
        };
        let after = before.record_attempt(false, 20);
        assert_eq!(after.total_attempts, 5);
        assert_eq!(after.correct_attempts, 3);
        assert!((after.avg_time_seconds - 12.0).abs() < 1e-9);
    }

    #[test]
    fn draft_rejects_out_of_range_answer() {
        let mut d = draft();
        d.correct_answers = vec![4];
        assert_eq!(
            d.validate().unwrap_err(),
            QuestionError::AnswerOutOfRange {
                index: 4,
                options: 4
            }
        );
    }

    #[test]
    fn draft_rejects_bad_difficulty() {
        let mut d = draft();
        d.difficulty = 6;
        assert_eq!(d.validate().unwrap_err(), QuestionError::InvalidDifficulty(6));
    }

    #[test]
    fn multiple_answers_make_multiple_choice() {
        let mut d = draft();
        d.correct_answers = vec![2, 0, 2];
        let q = d.validate().unwrap();
        assert_eq!(q.correct_answers(), &[0, 2]);
        assert_eq!(q.question_type(), QuestionType::Multiple);
    }

    #[test]
    fn grading_uses_set_equality() {
        let mut d = draft();
        d.correct_answers = vec![0, 2];
        let q = Question::from_persisted(
            QuestionId::new(1),
            d.validate().unwrap(),
            true,
            QuestionStats::default(),
        );
        assert!(q.is_correct(&[2, 0]));
        assert!(q.is_correct(&[0, 2, 2]));
        assert!(!q.is_correct(&[0]));
        assert!(!q.is_correct(&[0, 1, 2]));
        assert!(q.accepts_selection(&[3]));
        assert!(!q.accepts_selection(&[4]));
        assert!(!q.accepts_selection(&[]));
    }
}
