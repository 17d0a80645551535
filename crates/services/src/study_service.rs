use std::sync::Arc;

use prep_core::model::{Question, QuestionId, UserId};
use prep_core::selection::StudyQuestionQuery;
use storage::repository::{AnswerRepository, ExamRepository, QuestionRepository};

use crate::Clock;
use crate::error::StudyError;

/// Picks study questions for a user.
#[derive(Clone)]
pub struct StudyService {
    clock: Clock,
    exams: Arc<dyn ExamRepository>,
    questions: Arc<dyn QuestionRepository>,
    answers: Arc<dyn AnswerRepository>,
}

impl StudyService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exams: Arc<dyn ExamRepository>,
        questions: Arc<dyn QuestionRepository>,
        answers: Arc<dyn AnswerRepository>,
    ) -> Self {
        Self {
            clock,
            exams,
            questions,
            answers,
        }
    }

    /// Up to `query.limit()` active questions matching the query, skipping anything the
    /// user answered inside the exclusion window.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ExamNotFound` for an unknown exam, or storage errors.
    pub async fn study_questions(
        &self,
        user_id: UserId,
        query: &StudyQuestionQuery,
    ) -> Result<Vec<Question>, StudyError> {
        self.study_questions_excluding(user_id, query, Vec::new())
            .await
    }

    /// Like [`Self::study_questions`], with extra ids to skip on top of the recency window.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ExamNotFound` for an unknown exam, or storage errors.
    pub async fn study_questions_excluding(
        &self,
        user_id: UserId,
        query: &StudyQuestionQuery,
        mut excluded: Vec<QuestionId>,
    ) -> Result<Vec<Question>, StudyError> {
        if self.exams.get_exam(query.exam_id).await?.is_none() {
            return Err(StudyError::ExamNotFound);
        }

        if query.exclude_recent_hours > 0 {
            let since = self.clock.hours_ago(query.exclude_recent_hours);
            excluded.extend(
                self.answers
                    .recent_question_ids(user_id, query.exam_id, since)
                    .await?,
            );
        }
        excluded.sort_unstable();
        excluded.dedup();

        let questions = self.questions.study_questions(query, &excluded).await?;
        tracing::debug!(
            exam_id = %query.exam_id,
            excluded = excluded.len(),
            returned = questions.len(),
            order = ?query.order,
            "selected study questions"
        );
        Ok(questions)
    }
}
