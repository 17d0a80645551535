use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::answer::AnsweredQuestion;
use crate::model::exam::Objective;
use crate::model::ids::{ExamId, ObjectiveId, UserId};
use crate::model::session::ObjectiveStats;

/// Answers needed before mastery can rise above `Novice`.
pub const MASTERY_MIN_ANSWERS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    #[default]
    Novice,
    Developing,
    Proficient,
    Mastered,
}

impl MasteryLevel {
    #[must_use]
    pub fn from_accuracy(accuracy: f64, total_answers: u32) -> Self {
        if total_answers < MASTERY_MIN_ANSWERS || accuracy < 0.5 {
            Self::Novice
        } else if accuracy < 0.7 {
            Self::Developing
        } else if accuracy < 0.85 {
            Self::Proficient
        } else {
            Self::Mastered
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MasteryLevel::Novice => "novice",
            MasteryLevel::Developing => "developing",
            MasteryLevel::Proficient => "proficient",
            MasteryLevel::Mastered => "mastered",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "novice" => Some(Self::Novice),
            "developing" => Some(Self::Developing),
            "proficient" => Some(Self::Proficient),
            "mastered" => Some(Self::Mastered),
            _ => None,
        }
    }
}

/// Per-user, per-exam rollup of accuracy and mastery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProgress {
    pub user_id: UserId,
    pub exam_id: ExamId,
    pub questions_seen: u32,
    pub total_answers: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub mastery_level: MasteryLevel,
    /// Estimated pass likelihood, 0..=100.
    pub readiness_score: f64,
    pub objective_accuracy: BTreeMap<ObjectiveId, ObjectiveStats>,
    pub last_studied_at: Option<DateTime<Utc>>,
}

impl UserProgress {
    /// Recompute the rollup from every answer the user gave for the exam.
    ///
    /// Readiness is the objective-weight-weighted accuracy; objectives without answers
    /// count as zero. With no objectives defined it falls back to plain accuracy.
    #[must_use]
    pub fn compute(
        user_id: UserId,
        exam_id: ExamId,
        objectives: &[Objective],
        answers: &[AnsweredQuestion],
    ) -> Self {
        let mut seen = HashSet::new();
        let mut correct_answers = 0_u32;
        let mut objective_accuracy: BTreeMap<ObjectiveId, ObjectiveStats> = BTreeMap::new();
        let mut last_studied_at: Option<DateTime<Utc>> = None;

        for answer in answers {
            seen.insert(answer.question_id);
            if answer.is_correct {
                correct_answers = correct_answers.saturating_add(1);
            }
            let entry = objective_accuracy.entry(answer.objective_id).or_default();
            entry.total = entry.total.saturating_add(1);
            if answer.is_correct {
                entry.correct = entry.correct.saturating_add(1);
            }
            entry.accuracy = f64::from(entry.correct) / f64::from(entry.total);
            last_studied_at = Some(last_studied_at.map_or(answer.answered_at, |t| {
                t.max(answer.answered_at)
            }));
        }

        let total_answers = u32::try_from(answers.len()).unwrap_or(u32::MAX);
        let accuracy = if total_answers == 0 {
            0.0
        } else {
            f64::from(correct_answers) / f64::from(total_answers)
        };

        let total_weight: u32 = objectives.iter().map(Objective::weight).sum();
        let readiness_score = if total_weight == 0 {
            accuracy * 100.0
        } else {
            let weighted: f64 = objectives
                .iter()
                .map(|o| {
                    let acc = objective_accuracy.get(&o.id()).map_or(0.0, |s| s.accuracy);
                    f64::from(o.weight()) * acc
                })
                .sum();
            weighted / f64::from(total_weight) * 100.0
        };

        Self {
            user_id,
            exam_id,
            questions_seen: u32::try_from(seen.len()).unwrap_or(u32::MAX),
            total_answers,
            correct_answers,
            accuracy,
            mastery_level: MasteryLevel::from_accuracy(accuracy, total_answers),
            readiness_score,
            objective_accuracy,
            last_studied_at,
        }
    }
}
