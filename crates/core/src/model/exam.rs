use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExamId, ObjectiveId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam code cannot be empty")]
    EmptyCode,

    #[error("exam name cannot be empty")]
    EmptyName,

    #[error("passing score must be between 1 and 100, got {0}")]
    InvalidPassingScore(u32),

    #[error("time limit must be > 0 minutes")]
    InvalidTimeLimit,

    #[error("question count must be > 0")]
    InvalidQuestionCount,

    #[error("objective weight must be > 0")]
    InvalidObjectiveWeight,

    #[error("objective title cannot be empty")]
    EmptyObjectiveTitle,
}

//
// ─── EXAM ──────────────────────────────────────────────────────────────────────
//

/// Certification exam metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    id: ExamId,
    vendor: String,
    code: String,
    name: String,
    passing_score: u32,
    time_limit_minutes: u32,
    question_count: u32,
    is_active: bool,
}

impl Exam {
    /// Creates a validated exam.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` when any field is out of range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ExamId,
        vendor: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
        passing_score: u32,
        time_limit_minutes: u32,
        question_count: u32,
        is_active: bool,
    ) -> Result<Self, ExamError> {
        let code = code.into().trim().to_string();
        if code.is_empty() {
            return Err(ExamError::EmptyCode);
        }
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ExamError::EmptyName);
        }
        if !(1..=100).contains(&passing_score) {
            return Err(ExamError::InvalidPassingScore(passing_score));
        }
        if time_limit_minutes == 0 {
            return Err(ExamError::InvalidTimeLimit);
        }
        if question_count == 0 {
            return Err(ExamError::InvalidQuestionCount);
        }

        Ok(Self {
            id,
            vendor: vendor.into().trim().to_string(),
            code,
            name,
            passing_score,
            time_limit_minutes,
            question_count,
            is_active,
        })
    }

    #[must_use]
    pub fn id(&self) -> ExamId {
        self.id
    }

    #[must_use]
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Percentage required to pass.
    #[must_use]
    pub fn passing_score(&self) -> u32 {
        self.passing_score
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    /// Number of questions in a full practice test.
    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

//
// ─── OBJECTIVE ─────────────────────────────────────────────────────────────────
//

/// Weighted sub-topic of an exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    id: ObjectiveId,
    exam_id: ExamId,
    code: String,
    title: String,
    weight: u32,
}

impl Objective {
    /// Creates a validated objective. `weight` is the share of the exam in percent.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` when the title is empty or the weight is zero.
    pub fn new(
        id: ObjectiveId,
        exam_id: ExamId,
        code: impl Into<String>,
        title: impl Into<String>,
        weight: u32,
    ) -> Result<Self, ExamError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(ExamError::EmptyObjectiveTitle);
        }
        if weight == 0 {
            return Err(ExamError::InvalidObjectiveWeight);
        }
        Ok(Self {
            id,
            exam_id,
            code: code.into().trim().to_string(),
            title,
            weight,
        })
    }

    #[must_use]
    pub fn id(&self) -> ObjectiveId {
        self.id
    }

    #[must_use]
    pub fn exam_id(&self) -> ExamId {
        self.exam_id
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn weight(&self) -> u32 {
        self.weight
    }
}
