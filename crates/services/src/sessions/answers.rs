use serde::Serialize;

use prep_core::model::{Question, StudySession, UserAnswer};

use crate::error::SessionError;

/// What the client gets back after answering a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerOutcome {
    pub answer: UserAnswer,
    pub is_correct: bool,
    pub correct_answers: Vec<usize>,
    pub explanation: Option<String>,
    /// The session with counters re-aggregated after this answer.
    pub session: StudySession,
}

/// Normalizes a selection against the question and grades it.
///
/// Returns the sorted, deduplicated selection and whether it is correct.
pub(crate) fn grade(question: &Question, selected: &[usize]) -> Result<(Vec<usize>, bool), SessionError> {
    if !question.accepts_selection(selected) {
        let index = selected
            .iter()
            .copied()
            .find(|&i| i >= question.options().len())
            .unwrap_or_default();
        return Err(SessionError::SelectionOutOfRange { index });
    }

    let mut normalized = selected.to_vec();
    normalized.sort_unstable();
    normalized.dedup();
    let is_correct = question.is_correct(&normalized);
    Ok((normalized, is_correct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::{
        ExamId, ObjectiveId, QuestionDraft, QuestionId, QuestionSource, QuestionStats,
    };

    fn question(correct: Vec<usize>) -> Question {
        let draft = QuestionDraft {
            exam_id: ExamId::new(1),
            objective_id: ObjectiveId::new(1),
            text: "Pick the secure protocols".into(),
            options: vec!["SSH".into(), "Telnet".into(), "HTTPS".into(), "FTP".into()],
            correct_answers: correct,
            explanation: None,
            difficulty: 2,
            source: QuestionSource::Manual,
        };
        Question::from_persisted(
            QuestionId::new(7),
            draft.validate().unwrap(),
            true,
            QuestionStats::default(),
        )
    }

    #[test]
    fn multi_select_requires_the_exact_set() {
        let q = question(vec![0, 2]);
        assert_eq!(grade(&q, &[2, 0, 2]).unwrap(), (vec![0, 2], true));
        assert!(!grade(&q, &[0]).unwrap().1);
        assert!(!grade(&q, &[0, 1, 2]).unwrap().1);
    }

    #[test]
    fn out_of_range_option_is_reported() {
        let q = question(vec![1]);
        let err = grade(&q, &[1, 9]).unwrap_err();
        assert!(matches!(err, SessionError::SelectionOutOfRange { index: 9 }));
    }
}
