//! Study question selection parameters.
//!
//! A `StudyQuestionQuery` describes *which* questions a study session may draw from;
//! storage adapters turn it into a filter and an ordering.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Difficulty, ExamId, ObjectiveId, QuestionError};

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;
pub const DEFAULT_EXCLUDE_RECENT_HOURS: u32 = 24;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error(transparent)]
    Difficulty(#[from] QuestionError),

    #[error("difficulty range is inverted: min {min} > max {max}")]
    InvertedRange { min: u8, max: u8 },

    #[error("unknown selection order: {0}")]
    UnknownOrder(String),
}

/// Row ordering for study question selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOrder {
    /// Uniform random sample of the filtered set.
    #[default]
    Random,
    /// Most attempted questions first.
    WeakAreas,
    /// Easiest questions first.
    SpeedDrill,
}

impl SelectionOrder {
    /// # Errors
    ///
    /// Returns `SelectionError::UnknownOrder` for unrecognized names.
    pub fn parse(s: &str) -> Result<Self, SelectionError> {
        match s {
            "random" => Ok(Self::Random),
            "weak_areas" | "weak-areas" => Ok(Self::WeakAreas),
            "speed_drill" | "speed-drill" => Ok(Self::SpeedDrill),
            other => Err(SelectionError::UnknownOrder(other.to_string())),
        }
    }
}

/// Inclusive difficulty bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyRange {
    min: Difficulty,
    max: Difficulty,
}

impl DifficultyRange {
    /// # Errors
    ///
    /// Returns `SelectionError` if either bound is outside `1..=5` or `min > max`.
    pub fn new(min: u8, max: u8) -> Result<Self, SelectionError> {
        let min_d = Difficulty::new(min)?;
        let max_d = Difficulty::new(max)?;
        if min_d > max_d {
            return Err(SelectionError::InvertedRange { min, max });
        }
        Ok(Self {
            min: min_d,
            max: max_d,
        })
    }

    #[must_use]
    pub fn min(&self) -> Difficulty {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> Difficulty {
        self.max
    }

    #[must_use]
    pub fn contains(&self, difficulty: Difficulty) -> bool {
        (self.min..=self.max).contains(&difficulty)
    }
}

impl Default for DifficultyRange {
    fn default() -> Self {
        Self {
            min: Difficulty::MIN,
            max: Difficulty::MAX,
        }
    }
}

/// Filters and ordering for fetching study questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyQuestionQuery {
    pub exam_id: ExamId,
    /// Empty means every objective of the exam.
    pub objective_ids: Vec<ObjectiveId>,
    pub difficulty: DifficultyRange,
    /// Questions the user answered within this many hours are skipped. 0 disables it.
    pub exclude_recent_hours: u32,
    limit: u32,
    pub order: SelectionOrder,
}

impl StudyQuestionQuery {
    /// Query with the default filters: all objectives, difficulty 1..=5, 24h exclusion,
    /// 20 rows, random order.
    #[must_use]
    pub fn new(exam_id: ExamId) -> Self {
        Self {
            exam_id,
            objective_ids: Vec::new(),
            difficulty: DifficultyRange::default(),
            exclude_recent_hours: DEFAULT_EXCLUDE_RECENT_HOURS,
            limit: DEFAULT_LIMIT,
            order: SelectionOrder::default(),
        }
    }

    #[must_use]
    pub fn with_objectives(mut self, objective_ids: Vec<ObjectiveId>) -> Self {
        let mut ids = objective_ids;
        ids.sort_unstable();
        ids.dedup();
        self.objective_ids = ids;
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: DifficultyRange) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn with_exclude_recent_hours(mut self, hours: u32) -> Self {
        self.exclude_recent_hours = hours;
        self
    }

    /// Sets the row limit, clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: SelectionOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let q = StudyQuestionQuery::new(ExamId::new(1));
        assert_eq!(q.limit(), 20);
        assert_eq!(q.exclude_recent_hours, 24);
        assert_eq!(q.order, SelectionOrder::Random);
        assert_eq!(q.difficulty.min().value(), 1);
        assert_eq!(q.difficulty.max().value(), 5);
        assert!(q.objective_ids.is_empty());
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(StudyQuestionQuery::new(ExamId::new(1)).with_limit(0).limit(), 1);
        assert_eq!(
            StudyQuestionQuery::new(ExamId::new(1)).with_limit(500).limit(),
            MAX_LIMIT
        );
    }

    #[test]
    fn range_rejects_inverted_and_out_of_bounds() {
        assert_eq!(
            DifficultyRange::new(4, 2).unwrap_err(),
            SelectionError::InvertedRange { min: 4, max: 2 }
        );
        assert!(DifficultyRange::new(0, 3).is_err());
        let range = DifficultyRange::new(3, 5).unwrap();
        assert!(range.contains(Difficulty::new(3).unwrap()));
        assert!(!range.contains(Difficulty::new(2).unwrap()));
    }

    #[test]
    fn order_parses_both_spellings() {
        assert_eq!(SelectionOrder::parse("weak-areas").unwrap(), SelectionOrder::WeakAreas);
        assert_eq!(SelectionOrder::parse("speed_drill").unwrap(), SelectionOrder::SpeedDrill);
        assert!(SelectionOrder::parse("alphabetical").is_err());
    }

    #[test]
    fn objectives_are_deduplicated() {
        let q = StudyQuestionQuery::new(ExamId::new(1)).with_objectives(vec![
            ObjectiveId::new(2),
            ObjectiveId::new(1),
            ObjectiveId::new(2),
        ]);
        assert_eq!(q.objective_ids, vec![ObjectiveId::new(1), ObjectiveId::new(2)]);
    }
}
